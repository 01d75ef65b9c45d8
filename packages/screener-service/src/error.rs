pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Connection error: {message}")]
	Connection { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Timeout: {message}")]
	Timeout { message: String },
	#[error("Malformed document: {message}")]
	MalformedDocument { message: String },
}
impl From<screener_storage::Error> for Error {
	fn from(err: screener_storage::Error) -> Self {
		match err {
			screener_storage::Error::Connection { message } => Self::Connection { message },
			err @ screener_storage::Error::Timeout { .. } => Self::Timeout { message: err.to_string() },
			screener_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			screener_storage::Error::InvalidArgument(message)
			| screener_storage::Error::Backend(message) => Self::Storage { message },
		}
	}
}

impl From<screener_domain::Error> for Error {
	fn from(err: screener_domain::Error) -> Self {
		Self::MalformedDocument { message: err.to_string() }
	}
}
