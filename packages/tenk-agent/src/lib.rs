pub mod graph;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod researcher;
pub mod retrieval;
pub mod router;
pub mod synthesizer;

mod error;

pub use error::{Error, Result};
pub use graph::{Agent, AgentOutcome};
pub use planner::ResearchPlan;
pub use researcher::ResearchStep;
pub use retrieval::{FailurePolicy, Retriever, SearchParams, SearchType, build_retriever};
pub use router::{RouterDecision, RouterLabel};
pub use tenk_providers::chat::{Message, Role};
pub use tenk_storage::Passage;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use tenk_config::{EmbeddingProviderConfig, LlmProviderConfig};
use tenk_providers::chat::{self, Completion, OutputSchema};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Message],
		schema: Option<&'a OutputSchema>,
	) -> BoxFuture<'a, tenk_providers::Result<Completion>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tenk_providers::Result<Vec<Vec<f32>>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub generation: Arc<dyn GenerationProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(
		generation: Arc<dyn GenerationProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		Self { generation, embedding }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { generation: provider.clone(), embedding: provider }
	}
}

struct DefaultProviders;

impl GenerationProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Message],
		schema: Option<&'a OutputSchema>,
	) -> BoxFuture<'a, tenk_providers::Result<Completion>> {
		Box::pin(chat::complete(cfg, messages, schema))
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tenk_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(tenk_providers::embedding::embed(cfg, texts))
	}
}

pub(crate) async fn generate_text(
	generation: &dyn GenerationProvider,
	cfg: &LlmProviderConfig,
	messages: &[Message],
) -> Result<String> {
	match generation.complete(cfg, messages, None).await? {
		Completion::Text(text) => Ok(text),
		Completion::Structured(value) => Ok(value.to_string()),
	}
}

pub(crate) async fn generate_structured(
	generation: &dyn GenerationProvider,
	cfg: &LlmProviderConfig,
	messages: &[Message],
	schema: &OutputSchema,
) -> Result<Value> {
	match generation.complete(cfg, messages, Some(schema)).await? {
		Completion::Structured(value) => Ok(value),
		Completion::Text(text) => Err(Error::SchemaViolation {
			message: format!("{} expected structured output, got text: {text:?}", schema.name),
		}),
	}
}
