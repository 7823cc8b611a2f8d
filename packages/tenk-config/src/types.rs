use serde::Deserialize;
use serde_json::{Map, Value};

use crate::prompts;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub providers: Providers,
	pub retrieval: Retrieval,
	#[serde(default)]
	pub research: Research,
	#[serde(default)]
	pub synthesis: Synthesis,
	#[serde(default)]
	pub prompts: Prompts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	/// Routing, planning and query generation.
	pub query_llm: LlmProviderConfig,
	/// Clarifying questions, general replies and the cited answer.
	pub response_llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Either a literal key or `env:NAME`.
	pub api_key: String,
	#[serde(default = "default_chat_path")]
	pub path: String,
	pub model: String,
	#[serde(default)]
	pub temperature: f32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Either a literal key or `env:NAME`.
	pub api_key: String,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	/// Retriever selector, one of `qdrant` or `local`.
	pub provider: String,
	#[serde(default = "default_k")]
	pub k: u32,
	#[serde(default = "default_fetch_k")]
	pub fetch_k: u32,
	#[serde(default = "default_search_type")]
	pub search_type: String,
	#[serde(default = "default_mmr_lambda")]
	pub mmr_lambda: f32,
	#[serde(default = "default_on_query_failure")]
	pub on_query_failure: String,
	pub qdrant: Option<QdrantRetrieval>,
	pub local: Option<LocalRetrieval>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QdrantRetrieval {
	pub url: String,
	pub collection: String,
	/// Named dense vector; unnamed collections leave this unset.
	pub vector_name: Option<String>,
	#[serde(default = "default_text_key")]
	pub text_key: String,
	#[serde(default = "default_source_key")]
	pub source_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalRetrieval {
	/// JSON-lines snapshot with one `{"source", "text", "vector"}` object per line.
	pub path: std::path::PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Research {
	pub queries_per_step: u32,
	pub max_steps: u32,
	pub concurrent_steps: bool,
}
impl Default for Research {
	fn default() -> Self {
		Self { queries_per_step: 3, max_steps: 3, concurrent_steps: false }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Synthesis {
	pub strict_citations: bool,
}
impl Default for Synthesis {
	fn default() -> Self {
		Self { strict_citations: true }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Prompts {
	pub router: String,
	pub more_info: String,
	pub general: String,
	pub research_plan: String,
	pub generate_queries: String,
	pub response: String,
}
impl Default for Prompts {
	fn default() -> Self {
		Self {
			router: prompts::ROUTER.to_string(),
			more_info: prompts::MORE_INFO.to_string(),
			general: prompts::GENERAL.to_string(),
			research_plan: prompts::RESEARCH_PLAN.to_string(),
			generate_queries: prompts::GENERATE_QUERIES.to_string(),
			response: prompts::RESPONSE.to_string(),
		}
	}
}

fn default_chat_path() -> String {
	"/chat/completions".to_string()
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}

fn default_timeout_ms() -> u64 {
	60_000
}

fn default_k() -> u32 {
	3
}

fn default_fetch_k() -> u32 {
	10
}

fn default_search_type() -> String {
	"similarity".to_string()
}

fn default_mmr_lambda() -> f32 {
	0.5
}

fn default_on_query_failure() -> String {
	"skip".to_string()
}

fn default_text_key() -> String {
	"page_content".to_string()
}

fn default_source_key() -> String {
	"source".to_string()
}
