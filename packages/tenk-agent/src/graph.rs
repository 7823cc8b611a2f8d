//! Top-level control flow for one question.
//!
//! Routing decides between three paths: a clarifying question, a general reply, or research.
//! Research runs Planning, Researching and Synthesizing in order. Each state is entered at most
//! once and the machine never returns to Routing.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
	Error, FailurePolicy, GenerationProvider, Message, Passage, Providers, ResearchPlan, Result,
	Retriever, Role, RouterDecision, RouterLabel, SearchParams,
	orchestrator::{self, ResearchReport},
	planner, prompt,
	researcher::Researcher,
	retrieval, router, synthesizer,
};
use tenk_config::Config;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
	pub route: RouterDecision,
	pub plan: Option<ResearchPlan>,
	pub documents: Vec<Passage>,
	pub failed_queries: usize,
	/// Final assistant message.
	pub message: String,
	/// Input conversation with the final assistant message appended.
	pub conversation: Vec<Message>,
}

pub struct Agent {
	cfg: Config,
	generation: Arc<dyn GenerationProvider>,
	retriever: Arc<dyn Retriever>,
	params: SearchParams,
	policy: FailurePolicy,
}
impl Agent {
	/// Builds the configured retriever once; selector and snapshot errors surface here.
	pub fn new(cfg: Config, providers: Providers) -> Result<Self> {
		let retriever = retrieval::build_retriever(&cfg, providers.embedding.clone())?;

		Self::with_retriever(cfg, providers.generation, retriever)
	}

	pub fn with_retriever(
		cfg: Config,
		generation: Arc<dyn GenerationProvider>,
		retriever: Arc<dyn Retriever>,
	) -> Result<Self> {
		let params = SearchParams::from_config(&cfg.retrieval)?;
		let policy = FailurePolicy::from_config(&cfg.retrieval)?;

		Ok(Self { cfg, generation, retriever, params, policy })
	}

	/// Answers a single question with no prior conversation.
	pub async fn ask(&self, question: &str) -> Result<String> {
		let outcome = self.answer(vec![Message::user(question)]).await?;

		Ok(outcome.message)
	}

	/// Runs the state machine once over `conversation`, whose last turn must be the user's.
	///
	/// Dropping the returned future abandons every outstanding model and retrieval call.
	pub async fn answer(&self, conversation: Vec<Message>) -> Result<AgentOutcome> {
		let invocation_id = Uuid::new_v4();
		let span = tracing::info_span!("answer", %invocation_id);

		self.run(conversation).instrument(span).await
	}

	async fn run(&self, conversation: Vec<Message>) -> Result<AgentOutcome> {
		validate_conversation(&conversation)?;

		let mut state = State::Routing;

		loop {
			tracing::debug!(state = state.name(), "Entering state.");

			state = match state {
				State::Routing => {
					let decision =
						router::classify(self.generation.as_ref(), &self.cfg, &conversation)
							.await?;

					match decision.label {
						RouterLabel::MoreInfo => State::AskMoreInfo(decision),
						RouterLabel::General => State::RespondGeneral(decision),
						RouterLabel::SecFilings => State::Planning(decision),
					}
				},
				State::AskMoreInfo(decision) => {
					let message =
						self.reply_with(&self.cfg.prompts.more_info, &decision, &conversation).await?;

					State::Done(Box::new(finish(&conversation, decision, None, None, message)))
				},
				State::RespondGeneral(decision) => {
					let message =
						self.reply_with(&self.cfg.prompts.general, &decision, &conversation).await?;

					State::Done(Box::new(finish(&conversation, decision, None, None, message)))
				},
				State::Planning(decision) => {
					let plan = planner::plan(
						self.generation.as_ref(),
						&self.cfg,
						&conversation,
						&decision.justification,
					)
					.await?;

					State::Researching(decision, plan)
				},
				State::Researching(decision, plan) => {
					let researcher = Researcher {
						cfg: &self.cfg,
						generation: self.generation.as_ref(),
						retriever: self.retriever.as_ref(),
						params: &self.params,
						policy: self.policy,
					};
					let report = orchestrator::execute(
						&researcher,
						&plan,
						self.cfg.research.concurrent_steps,
					)
					.await?;

					State::Synthesizing(decision, plan, report)
				},
				State::Synthesizing(decision, plan, report) => {
					let message = synthesizer::synthesize(
						self.generation.as_ref(),
						&self.cfg,
						&conversation,
						&report.documents,
					)
					.await?;

					State::Done(Box::new(finish(
						&conversation,
						decision,
						Some(plan),
						Some(report),
						message,
					)))
				},
				State::Done(outcome) => {
					tracing::info!(
						route = %outcome.route.label,
						documents = outcome.documents.len(),
						failed_queries = outcome.failed_queries,
						"Invocation completed."
					);

					return Ok(*outcome);
				},
			};
		}
	}

	async fn reply_with(
		&self,
		template: &str,
		decision: &RouterDecision,
		conversation: &[Message],
	) -> Result<String> {
		let system = prompt::render(template, &[("logic", decision.justification.as_str())]);
		let messages = prompt::with_system(system, conversation);
		let message =
			crate::generate_text(self.generation.as_ref(), &self.cfg.providers.response_llm, &messages)
				.await?;

		// No documents back these replies, so any `[n]` marker is out of range.
		synthesizer::check_citations(
			&synthesizer::extract_citations(&message),
			0,
			self.cfg.synthesis.strict_citations,
		)?;

		Ok(message)
	}
}

enum State {
	Routing,
	AskMoreInfo(RouterDecision),
	RespondGeneral(RouterDecision),
	Planning(RouterDecision),
	Researching(RouterDecision, ResearchPlan),
	Synthesizing(RouterDecision, ResearchPlan, ResearchReport),
	Done(Box<AgentOutcome>),
}
impl State {
	fn name(&self) -> &'static str {
		match self {
			Self::Routing => "routing",
			Self::AskMoreInfo(_) => "ask_more_info",
			Self::RespondGeneral(_) => "respond_general",
			Self::Planning(_) => "planning",
			Self::Researching(..) => "researching",
			Self::Synthesizing(..) => "synthesizing",
			Self::Done(_) => "done",
		}
	}
}

fn validate_conversation(conversation: &[Message]) -> Result<()> {
	let Some(last) = conversation.last() else {
		return Err(Error::InvalidRequest { message: "Conversation is empty.".to_string() });
	};

	if last.role != Role::User {
		return Err(Error::InvalidRequest {
			message: format!("Last turn must come from the user, got {}.", last.role.as_str()),
		});
	}
	if last.content.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "Question is empty.".to_string() });
	}

	Ok(())
}

fn finish(
	conversation: &[Message],
	route: RouterDecision,
	plan: Option<ResearchPlan>,
	report: Option<ResearchReport>,
	message: String,
) -> AgentOutcome {
	let (documents, failed_queries) =
		report.map(|report| (report.documents, report.failed_queries)).unwrap_or_default();
	let mut conversation = conversation.to_vec();

	conversation.push(Message::assistant(message.clone()));

	AgentOutcome { route, plan, documents, failed_queries, message, conversation }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conversation_must_end_with_a_user_question() {
		assert!(matches!(validate_conversation(&[]), Err(Error::InvalidRequest { .. })));
		assert!(matches!(
			validate_conversation(&[Message::user("hi"), Message::assistant("hello")]),
			Err(Error::InvalidRequest { .. })
		));
		assert!(matches!(
			validate_conversation(&[Message::user("   ")]),
			Err(Error::InvalidRequest { .. })
		));
		assert!(validate_conversation(&[Message::user("What were Acme's 2023 revenues?")]).is_ok());
	}

	#[test]
	fn finish_appends_the_assistant_turn() {
		let outcome = finish(
			&[Message::user("Hello!")],
			RouterDecision { label: RouterLabel::General, justification: "greeting".to_string() },
			None,
			None,
			"Hi there.".to_string(),
		);

		assert_eq!(outcome.conversation.last(), Some(&Message::assistant("Hi there.")));
		assert!(outcome.documents.is_empty());
		assert_eq!(outcome.failed_queries, 0);
	}
}
