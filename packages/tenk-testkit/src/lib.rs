//! Deterministic fakes for exercising the agent without a model or an index.

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;

use tenk_agent::{
	Agent, BoxFuture, Error, GenerationProvider, Message, Passage, Result, Retriever, Role,
	RouterLabel, SearchParams, planner, researcher, router,
};
use tenk_config::{Config, LlmProviderConfig};
use tenk_providers::chat::{Completion, OutputSchema};

pub const CLARIFYING_QUESTION: &str =
	"Which company and fiscal year would you like me to look at?";
pub const GENERAL_REPLY: &str =
	"Hello! I can only help with questions about 10-K and 10-Q filings. What would you like to know?";
pub const CITED_ANSWER: &str =
	"Acme Corp reports supplier concentration as a key risk [1]. It also flags litigation exposure [2].";
pub const UNCERTAIN_ANSWER: &str = "I'm not sure. None of the filings I searched cover this. \
	Could you tell me which company and fiscal year you mean?";

const SAMPLE_CONFIG: &str = r#"
[service]
log_level = "debug"

[providers.query_llm]
provider_id = "openai"
api_base = "http://127.0.0.1:9"
api_key = "test-key"
model = "gpt-4o-mini"

[providers.response_llm]
provider_id = "openai"
api_base = "http://127.0.0.1:9"
api_key = "test-key"
model = "gpt-4o-mini"

[providers.embedding]
provider_id = "openai"
api_base = "http://127.0.0.1:9"
api_key = "test-key"
model = "text-embedding-3-small"
dimensions = 4

[retrieval]
provider = "qdrant"
k = 3
fetch_k = 10

[retrieval.qdrant]
url = "http://127.0.0.1:6334"
collection = "sec_filings"
"#;

/// A valid configuration pointing at unreachable endpoints.
pub fn sample_config() -> tenk_config::Result<Config> {
	tenk_config::parse(SAMPLE_CONFIG)
}

/// Builds an agent over the given fakes using [`sample_config`] adjusted by `tweak`.
pub fn agent(
	generation: Arc<ScriptedGeneration>,
	retriever: Arc<ScriptedRetriever>,
	tweak: impl FnOnce(&mut Config),
) -> Result<Agent> {
	let mut cfg = sample_config()
		.map_err(|err| Error::InvalidRequest { message: format!("Sample config: {err}") })?;

	tweak(&mut cfg);

	Agent::with_retriever(cfg, generation, retriever)
}

pub fn passage(source: &str, text: &str, score: f32) -> Passage {
	Passage { source: source.to_string(), text: text.to_string(), score }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
	pub schema: Option<String>,
	pub system: String,
	pub last_user: String,
}

/// Generation fake answering by schema name; free-text replies are picked by matching a needle
/// against the system prompt.
pub struct ScriptedGeneration {
	router: Value,
	plan: Value,
	queries: HashMap<String, Value>,
	replies: Vec<(String, String)>,
	failing: HashSet<String>,
	calls: Mutex<Vec<GenerationCall>>,
}
impl ScriptedGeneration {
	pub fn routed(label: RouterLabel, justification: &str) -> Self {
		Self {
			router: serde_json::json!({ "logic": justification, "type": label.as_str() }),
			plan: serde_json::json!({ "steps": ["Research the user's question in the filings."] }),
			queries: HashMap::new(),
			replies: vec![
				("more information is needed".to_string(), CLARIFYING_QUESTION.to_string()),
				("general question".to_string(), GENERAL_REPLY.to_string()),
			],
			failing: HashSet::new(),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn with_router_output(mut self, raw: Value) -> Self {
		self.router = raw;

		self
	}

	pub fn with_plan(mut self, steps: &[&str]) -> Self {
		self.plan = serde_json::json!({ "steps": steps });

		self
	}

	pub fn with_plan_output(mut self, raw: Value) -> Self {
		self.plan = raw;

		self
	}

	pub fn with_queries(mut self, step: &str, queries: &[&str]) -> Self {
		self.queries.insert(step.to_string(), serde_json::json!({ "queries": queries }));

		self
	}

	/// Replies with `reply` when the system prompt contains `needle`. Later rules win.
	pub fn with_reply(mut self, needle: &str, reply: &str) -> Self {
		self.replies.insert(0, (needle.to_string(), reply.to_string()));

		self
	}

	/// Makes every call for `schema` fail as a schema violation.
	pub fn failing_schema(mut self, schema: &str) -> Self {
		self.failing.insert(schema.to_string());

		self
	}

	pub fn calls(&self) -> Vec<GenerationCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn count(&self, schema: Option<&str>) -> usize {
		self.calls().iter().filter(|call| call.schema.as_deref() == schema).count()
	}

	fn respond(&self, call: &GenerationCall) -> tenk_providers::Result<Completion> {
		if let Some(schema) = call.schema.as_deref()
			&& self.failing.contains(schema)
		{
			return Err(tenk_providers::Error::SchemaViolation {
				schema: schema.to_string(),
				message: "Model refused: scripted failure".to_string(),
			});
		}

		match call.schema.as_deref() {
			Some(router::SCHEMA_NAME) => Ok(Completion::Structured(self.router.clone())),
			Some(planner::SCHEMA_NAME) => Ok(Completion::Structured(self.plan.clone())),
			Some(researcher::SCHEMA_NAME) => Ok(Completion::Structured(
				self.queries
					.get(&call.last_user)
					.cloned()
					.unwrap_or_else(|| default_queries(&call.last_user)),
			)),
			Some(other) => Err(tenk_providers::Error::SchemaViolation {
				schema: other.to_string(),
				message: "No scripted output.".to_string(),
			}),
			None => self.reply(&call.system).map(Completion::Text),
		}
	}

	fn reply(&self, system: &str) -> tenk_providers::Result<String> {
		if let Some((_, reply)) = self.replies.iter().find(|(needle, _)| system.contains(needle)) {
			return Ok(reply.clone());
		}
		if system.contains("<document index=\"2\"") {
			return Ok(CITED_ANSWER.to_string());
		}
		if system.contains("<document index=\"1\"") {
			return Ok("Acme Corp reports supplier concentration as a key risk [1].".to_string());
		}
		if system.contains("<documents>") {
			return Ok(UNCERTAIN_ANSWER.to_string());
		}

		Err(tenk_providers::Error::InvalidResponse {
			message: "No scripted reply matches the system prompt.".to_string(),
		})
	}
}
impl GenerationProvider for ScriptedGeneration {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Message],
		schema: Option<&'a OutputSchema>,
	) -> BoxFuture<'a, tenk_providers::Result<Completion>> {
		let call = GenerationCall {
			schema: schema.map(|schema| schema.name.clone()),
			system: messages
				.iter()
				.find(|message| message.role == Role::System)
				.map(|message| message.content.clone())
				.unwrap_or_default(),
			last_user: messages
				.iter()
				.rev()
				.find(|message| message.role == Role::User)
				.map(|message| message.content.clone())
				.unwrap_or_default(),
		};
		let result = self.respond(&call);

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(call);

		Box::pin(async move { result })
	}
}

fn default_queries(question: &str) -> Value {
	serde_json::json!({
		"queries": [
			format!("{question} overview"),
			format!("{question} details"),
			format!("{question} discussion"),
		]
	})
}

#[derive(Debug, Clone, Default)]
struct Script {
	passages: Option<Vec<Passage>>,
	delay: Duration,
	fail: bool,
}

/// Retrieval fake with per-query passages, delays and failures.
///
/// Unscripted queries return one passage whose source is `<query>.htm`.
#[derive(Default)]
pub struct ScriptedRetriever {
	scripts: HashMap<String, Script>,
	fail_all: bool,
	calls: AtomicUsize,
	completed: Mutex<Vec<String>>,
}
impl ScriptedRetriever {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_passages(mut self, query: &str, passages: Vec<Passage>) -> Self {
		self.scripts.entry(query.to_string()).or_default().passages = Some(passages);

		self
	}

	pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
		self.scripts.entry(query.to_string()).or_default().delay = delay;

		self
	}

	pub fn failing(mut self, query: &str) -> Self {
		self.scripts.entry(query.to_string()).or_default().fail = true;

		self
	}

	pub fn failing_all(mut self) -> Self {
		self.fail_all = true;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Queries in the order their calls finished.
	pub fn completion_order(&self) -> Vec<String> {
		self.completed.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl Retriever for ScriptedRetriever {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		params: &'a SearchParams,
	) -> BoxFuture<'a, Result<Vec<Passage>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			let script = self.scripts.get(query).cloned().unwrap_or_default();

			if !script.delay.is_zero() {
				tokio::time::sleep(script.delay).await;
			}

			self.completed.lock().unwrap_or_else(|err| err.into_inner()).push(query.to_string());

			if self.fail_all || script.fail {
				return Err(Error::BackendUnavailable {
					message: format!("Index unreachable for {query:?}."),
				});
			}

			let mut passages = script
				.passages
				.unwrap_or_else(|| vec![passage(&format!("{query}.htm"), query, 1.0)]);

			passages.truncate(params.k);

			Ok(passages)
		})
	}
}
