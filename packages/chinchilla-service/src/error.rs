pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Category not found: {category}.")]
	CategoryNotFound { category: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Configuration error: {message}")]
	Configuration { message: String },
	#[error("Step ceiling of {ceiling} exceeded.")]
	StepCeilingExceeded { ceiling: u32 },
	#[error("Request deadline exceeded after {elapsed_ms} ms.")]
	DeadlineExceeded { elapsed_ms: u64 },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<chinchilla_providers::Error> for Error {
	fn from(err: chinchilla_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<chinchilla_storage::Error> for Error {
	fn from(err: chinchilla_storage::Error) -> Self {
		match err {
			chinchilla_storage::Error::InvalidArgument(message) => Self::Configuration { message },
			chinchilla_storage::Error::Qdrant(inner) => {
				Self::Storage { message: inner.to_string() }
			},
		}
	}
}

impl From<chinchilla_config::Error> for Error {
	fn from(err: chinchilla_config::Error) -> Self {
		Self::Configuration { message: err.to_string() }
	}
}
