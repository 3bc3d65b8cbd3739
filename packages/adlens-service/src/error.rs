pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Query must be at least {min} characters long.")]
	QueryTooShort { min: u32 },
	#[error("Page numbers start at 1.")]
	InvalidPage,
	#[error("Search failed: {message}")]
	Search { message: String },
}
