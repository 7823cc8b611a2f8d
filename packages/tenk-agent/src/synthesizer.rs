use std::fmt::Write;

use regex::Regex;

use crate::{Error, GenerationProvider, Message, Passage, Result, prompt};
use tenk_config::Config;

const CITATION_PATTERN: &str = r"\[(\d+(?:\s*,\s*\d+)*)\]";

pub async fn synthesize(
	generation: &dyn GenerationProvider,
	cfg: &Config,
	conversation: &[Message],
	documents: &[Passage],
) -> Result<String> {
	let context = render_context(documents);
	let system = prompt::render(&cfg.prompts.response, &[("context", context.as_str())]);
	let messages = prompt::with_system(system, conversation);
	let answer =
		crate::generate_text(generation, &cfg.providers.response_llm, &messages).await?;
	let citations = extract_citations(&answer);

	check_citations(&citations, documents.len(), cfg.synthesis.strict_citations)?;

	tracing::debug!(documents = documents.len(), citations = ?citations, "Answer synthesized.");

	Ok(answer)
}

/// Renders passages as a `<documents>` block numbered from 1 in accumulation order.
pub fn render_context(documents: &[Passage]) -> String {
	let mut out = String::from("<documents>\n");

	for (idx, passage) in documents.iter().enumerate() {
		let _ = writeln!(
			out,
			"<document index=\"{}\" source=\"{}\">{}</document>",
			idx + 1,
			escape(&passage.source),
			escape(passage.text.trim())
		);
	}

	out.push_str("</documents>");

	out
}

/// Returns the distinct `[n]` citation indices in order of first appearance.
pub fn extract_citations(answer: &str) -> Vec<usize> {
	let Ok(pattern) = Regex::new(CITATION_PATTERN) else {
		return Vec::new();
	};
	let mut out = Vec::new();

	for caps in pattern.captures_iter(answer) {
		for raw in caps[1].split(',') {
			// Digits that overflow `usize` can never name a document.
			let idx = raw.trim().parse::<usize>().unwrap_or(usize::MAX);

			if !out.contains(&idx) {
				out.push(idx);
			}
		}
	}

	out
}

pub fn check_citations(citations: &[usize], document_count: usize, strict: bool) -> Result<()> {
	let invalid: Vec<usize> =
		citations.iter().copied().filter(|idx| *idx == 0 || *idx > document_count).collect();

	if invalid.is_empty() {
		return Ok(());
	}
	if strict {
		return Err(Error::ContractViolation {
			message: format!(
				"Answer cites {invalid:?} but only {document_count} documents were retrieved."
			),
		});
	}

	tracing::warn!(invalid = ?invalid, document_count, "Answer cites documents that do not exist.");

	Ok(())
}

fn escape(raw: &str) -> String {
	raw.replace('&', "&amp;").replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}
