#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read snapshot at {path:?}.")]
	Io { path: std::path::PathBuf, source: std::io::Error },
	#[error("Snapshot line {line} is not a valid record.")]
	SerdeJson { line: usize, source: serde_json::Error },
	#[error("Invalid snapshot: {0}")]
	InvalidSnapshot(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
