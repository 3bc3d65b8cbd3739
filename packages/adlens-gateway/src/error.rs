pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error("Failed to decode a gateway payload: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("Push channel rejected the subscription with {status}.")]
	Subscribe { status: reqwest::StatusCode },
	#[error("Request was cancelled.")]
	Cancelled,
}
