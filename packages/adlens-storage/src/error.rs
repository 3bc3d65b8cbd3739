pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read cache document at {path:?}.")]
	Read { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to write cache document at {path:?}.")]
	Write { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to decode cache document: {0}")]
	Decode(serde_json::Error),
	#[error("Failed to encode cache document: {0}")]
	Encode(serde_json::Error),
}
