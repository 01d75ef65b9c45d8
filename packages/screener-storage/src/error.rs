#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Failed to connect to the document store: {message}")]
	Connection { message: String },
	#[error("Timed out after {timeout_ms} ms during {operation}.")]
	Timeout { operation: &'static str, timeout_ms: u64 },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Backend error: {0}")]
	Backend(String),
}
