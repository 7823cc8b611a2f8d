pub mod local;
pub mod models;
pub mod qdrant;

mod error;

pub use error::Error;
pub use models::{Candidate, Passage, cosine_similarity};

pub type Result<T, E = Error> = std::result::Result<T, E>;
