pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Schema violation: {message}")]
	SchemaViolation { message: String },
	#[error("Backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Contract violation: {message}")]
	ContractViolation { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
}
impl From<tenk_providers::Error> for Error {
	fn from(err: tenk_providers::Error) -> Self {
		match err {
			tenk_providers::Error::SchemaViolation { .. } =>
				Self::SchemaViolation { message: err.to_string() },
			other => Self::Provider { message: other.to_string() },
		}
	}
}

impl From<tenk_storage::Error> for Error {
	fn from(err: tenk_storage::Error) -> Self {
		Self::BackendUnavailable { message: err.to_string() }
	}
}
