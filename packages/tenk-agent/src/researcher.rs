//! Research for a single plan step: expand the step into search queries, retrieve every query
//! concurrently, then merge the results in query order.

use std::collections::HashSet;

use futures::future;
use serde::Deserialize;

use crate::{
	Error, FailurePolicy, GenerationProvider, Message, Passage, Result, Retriever, SearchParams,
	prompt,
};
use tenk_config::Config;
use tenk_providers::chat::OutputSchema;

pub const SCHEMA_NAME: &str = "generate_queries";

/// Working state of one plan step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchStep {
	pub question: String,
	pub queries: Vec<String>,
	pub documents: Vec<Passage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
	pub step: ResearchStep,
	pub failed_queries: usize,
}

#[derive(Deserialize)]
struct RawQueries {
	queries: Vec<String>,
}

pub fn schema() -> OutputSchema {
	OutputSchema::new(
		SCHEMA_NAME,
		serde_json::json!({
			"type": "object",
			"properties": {
				"queries": { "type": "array", "items": { "type": "string" } },
			},
			"required": ["queries"],
			"additionalProperties": false,
		}),
	)
}

pub struct Researcher<'a> {
	pub cfg: &'a Config,
	pub generation: &'a dyn GenerationProvider,
	pub retriever: &'a dyn Retriever,
	pub params: &'a SearchParams,
	pub policy: FailurePolicy,
}
impl Researcher<'_> {
	pub async fn research(&self, step_index: usize, question: &str) -> Result<StepOutcome> {
		let queries = self.expand(step_index, question).await?;
		let (documents, failed_queries) = self.retrieve(step_index, &queries).await?;

		Ok(StepOutcome {
			step: ResearchStep { question: question.to_string(), queries, documents },
			failed_queries,
		})
	}

	/// Asks the query model for search queries covering `question`.
	pub async fn expand(&self, step_index: usize, question: &str) -> Result<Vec<String>> {
		let wanted = self.cfg.research.queries_per_step as usize;
		let count = wanted.to_string();
		let system = prompt::render(&self.cfg.prompts.generate_queries, &[("count", count.as_str())]);
		let messages = [Message::system(system), Message::user(question)];
		let raw = crate::generate_structured(
			self.generation,
			&self.cfg.providers.query_llm,
			&messages,
			&schema(),
		)
		.await?;
		let raw: RawQueries = serde_json::from_value(raw).map_err(|err| Error::SchemaViolation {
			message: format!("Generated queries do not match schema: {err}"),
		})?;
		let queries = normalize_queries(raw.queries, wanted);

		if queries.is_empty() {
			return Err(Error::SchemaViolation {
				message: format!("No usable search queries were generated for step {step_index}."),
			});
		}
		if queries.len() < wanted {
			tracing::warn!(
				step = step_index,
				generated = queries.len(),
				wanted,
				"Fewer distinct search queries than requested."
			);
		}

		tracing::info!(step = step_index, queries = ?queries, "Generated search queries.");

		Ok(queries)
	}

	/// Runs every query concurrently and merges results by query index, returning the merged
	/// passages and the number of failed queries.
	pub async fn retrieve(
		&self,
		step_index: usize,
		queries: &[String],
	) -> Result<(Vec<Passage>, usize)> {
		let results = future::join_all(
			queries.iter().map(|query| self.retriever.retrieve(query, self.params)),
		)
		.await;
		let mut documents = Vec::new();
		let mut failed = 0;

		for (query_index, result) in results.into_iter().enumerate() {
			match result {
				Ok(passages) => documents.extend(passages),
				Err(err) => {
					if self.policy == FailurePolicy::Abort {
						return Err(Error::BackendUnavailable {
							message: format!(
								"Retrieval failed for step {step_index} query {query_index}: {err}"
							),
						});
					}

					tracing::warn!(
						step = step_index,
						query_index,
						query = %queries[query_index],
						error = %err,
						"Retrieval query failed. Skipping it."
					);

					failed += 1;
				},
			}
		}

		Ok((documents, failed))
	}
}

/// Trims, drops blanks and case-insensitive duplicates, and keeps at most `max` queries.
pub fn normalize_queries(queries: Vec<String>, max: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for query in queries {
		if out.len() >= max {
			break;
		}

		let trimmed = query.trim();

		if trimmed.is_empty() {
			continue;
		}
		if seen.insert(trimmed.to_lowercase()) {
			out.push(trimmed.to_string());
		}
	}

	out
}
