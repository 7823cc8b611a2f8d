use futures::future;

use crate::{
	Error, FailurePolicy, Passage, ResearchPlan, Result, ResearchStep, researcher::Researcher,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchReport {
	pub steps: Vec<ResearchStep>,
	/// Passages in citation order: plan step first, then query index, then backend rank.
	pub documents: Vec<Passage>,
	pub attempted_queries: usize,
	pub failed_queries: usize,
}
impl ResearchReport {
	fn push(&mut self, step: ResearchStep, failed_queries: usize) {
		self.attempted_queries += step.queries.len();
		self.failed_queries += failed_queries;
		self.documents.extend(step.documents.iter().cloned());
		self.steps.push(step);
	}
}

/// Researches every plan step and accumulates documents in plan order.
///
/// With `concurrent` the steps run together; the report order is the same either way.
pub async fn execute(
	researcher: &Researcher<'_>,
	plan: &ResearchPlan,
	concurrent: bool,
) -> Result<ResearchReport> {
	let mut report = ResearchReport::default();

	if concurrent {
		let outcomes = future::join_all(
			plan.steps.iter().enumerate().map(|(idx, step)| researcher.research(idx, step)),
		)
		.await;

		for outcome in outcomes {
			let outcome = outcome?;

			report.push(outcome.step, outcome.failed_queries);
		}
	} else {
		for (idx, step) in plan.steps.iter().enumerate() {
			let outcome = researcher.research(idx, step).await?;

			report.push(outcome.step, outcome.failed_queries);
		}
	}

	if researcher.policy == FailurePolicy::Skip
		&& report.attempted_queries > 0
		&& report.failed_queries == report.attempted_queries
	{
		return Err(Error::BackendUnavailable {
			message: format!("All {} retrieval queries failed.", report.attempted_queries),
		});
	}

	Ok(report)
}
