use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, GenerationProvider, Message, Result, prompt};
use tenk_config::Config;
use tenk_providers::chat::OutputSchema;

pub const SCHEMA_NAME: &str = "router";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouterLabel {
	/// The question is missing a detail needed to research it.
	MoreInfo,
	/// Answerable from 10-K and 10-Q filings.
	SecFilings,
	/// Greetings and anything unrelated to filings.
	General,
}
impl RouterLabel {
	pub const ALL: [Self; 3] = [Self::MoreInfo, Self::SecFilings, Self::General];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::MoreInfo => "more-info",
			Self::SecFilings => "sec-filings",
			Self::General => "general",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|label| label.as_str() == raw.trim())
	}
}

impl fmt::Display for RouterLabel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterDecision {
	pub label: RouterLabel,
	pub justification: String,
}

#[derive(Deserialize)]
struct RawDecision {
	logic: String,
	#[serde(rename = "type")]
	kind: String,
}

pub fn schema() -> OutputSchema {
	let labels: Vec<&str> = RouterLabel::ALL.iter().map(|label| label.as_str()).collect();

	OutputSchema::new(
		SCHEMA_NAME,
		serde_json::json!({
			"type": "object",
			"properties": {
				"logic": { "type": "string" },
				"type": { "type": "string", "enum": labels },
			},
			"required": ["logic", "type"],
			"additionalProperties": false,
		}),
	)
}

pub async fn classify(
	generation: &dyn GenerationProvider,
	cfg: &Config,
	conversation: &[Message],
) -> Result<RouterDecision> {
	let messages = prompt::with_system(cfg.prompts.router.clone(), conversation);
	let raw =
		crate::generate_structured(generation, &cfg.providers.query_llm, &messages, &schema())
			.await?;
	let decision = parse_decision(raw)?;

	tracing::debug!(label = %decision.label, justification = %decision.justification, "Question routed.");

	Ok(decision)
}

fn parse_decision(raw: Value) -> Result<RouterDecision> {
	let decision: RawDecision = serde_json::from_value(raw).map_err(|err| {
		Error::SchemaViolation { message: format!("Router output does not match schema: {err}") }
	})?;
	let Some(label) = RouterLabel::parse(&decision.kind) else {
		return Err(Error::ContractViolation {
			message: format!("Router returned unknown label {:?}.", decision.kind),
		});
	};

	Ok(RouterDecision { label, justification: decision.logic })
}
