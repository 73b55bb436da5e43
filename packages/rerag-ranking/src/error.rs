pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid configuration: {message}")]
	InvalidConfiguration { message: String },
	#[error("Retrieval error: {message}")]
	Retrieval { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Encoding error: {message}")]
	Encoding { message: String },
	#[error(transparent)]
	Domain(#[from] rerag_domain::Error),
}
impl From<rerag_providers::Error> for Error {
	fn from(err: rerag_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<rerag_config::Error> for Error {
	fn from(err: rerag_config::Error) -> Self {
		Self::InvalidConfiguration { message: err.to_string() }
	}
}
