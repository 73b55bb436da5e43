pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid chunk {hash}: {message}")]
	InvalidChunk { hash: String, message: String },
	#[error("Duplicate chunk hash {hash}.")]
	DuplicateHash { hash: String },
	#[error("Invalid keyword pattern {pattern}: {message}")]
	InvalidPattern { pattern: String, message: String },
	#[error("Invalid collection payload: {message}")]
	InvalidPayload { message: String },
}
