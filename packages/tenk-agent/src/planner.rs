use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, GenerationProvider, Message, Result, prompt};
use tenk_config::Config;
use tenk_providers::chat::OutputSchema;

pub const SCHEMA_NAME: &str = "research_plan";

/// Ordered research steps, fixed once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchPlan {
	pub steps: Vec<String>,
}

#[derive(Deserialize)]
struct RawPlan {
	steps: Vec<String>,
}

pub fn schema() -> OutputSchema {
	OutputSchema::new(
		SCHEMA_NAME,
		serde_json::json!({
			"type": "object",
			"properties": {
				"steps": { "type": "array", "items": { "type": "string" } },
			},
			"required": ["steps"],
			"additionalProperties": false,
		}),
	)
}

pub async fn plan(
	generation: &dyn GenerationProvider,
	cfg: &Config,
	conversation: &[Message],
	justification: &str,
) -> Result<ResearchPlan> {
	let system = prompt::render(&cfg.prompts.research_plan, &[("logic", justification)]);
	let messages = prompt::with_system(system, conversation);
	let raw =
		crate::generate_structured(generation, &cfg.providers.query_llm, &messages, &schema())
			.await?;
	let plan = build_plan(raw, cfg.research.max_steps as usize)?;

	tracing::debug!(steps = ?plan.steps, "Research plan created.");

	Ok(plan)
}

fn build_plan(raw: Value, max_steps: usize) -> Result<ResearchPlan> {
	let raw: RawPlan = serde_json::from_value(raw).map_err(|err| Error::SchemaViolation {
		message: format!("Research plan does not match schema: {err}"),
	})?;
	let mut steps: Vec<String> = raw
		.steps
		.into_iter()
		.map(|step| step.trim().to_string())
		.filter(|step| !step.is_empty())
		.collect();

	if steps.is_empty() {
		return Err(Error::ContractViolation {
			message: "Planner returned zero research steps.".to_string(),
		});
	}
	if steps.len() > max_steps {
		tracing::warn!(
			returned = steps.len(),
			max_steps,
			"Research plan exceeds max_steps. Extra steps are dropped."
		);

		steps.truncate(max_steps);
	}

	Ok(ResearchPlan { steps })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn trims_blank_steps_and_truncates_to_max() {
		let plan = build_plan(
			serde_json::json!({ "steps": [" Find risk factors ", "", "Compare to 2022", "Extra", "More"] }),
			3,
		)
		.expect("plan failed");

		assert_eq!(plan.steps, vec!["Find risk factors", "Compare to 2022", "Extra"]);
	}

	#[test]
	fn empty_plan_is_a_contract_violation() {
		let err = build_plan(serde_json::json!({ "steps": ["  "] }), 3).expect_err("expected error");

		assert!(matches!(err, Error::ContractViolation { .. }), "Unexpected error: {err}");
	}

	#[test]
	fn wrong_shape_is_a_schema_violation() {
		let err =
			build_plan(serde_json::json!({ "steps": "one" }), 3).expect_err("expected error");

		assert!(matches!(err, Error::SchemaViolation { .. }), "Unexpected error: {err}");
	}
}
