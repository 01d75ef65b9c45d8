pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Malformed document at {path}: {message}")]
	MalformedDocument { path: String, message: String },
}
impl Error {
	pub(crate) fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self::MalformedDocument { path: path.into(), message: message.into() }
	}
}
