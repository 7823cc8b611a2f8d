use std::path::PathBuf;

use clap::{
	Parser,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tracing_subscriber::EnvFilter;

use tenk_agent::{Agent, Providers};

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const EXIT_COMMANDS: [&str; 3] = ["exit", "bye", "quit"];
const PROMPT: &str = "Enter your question (or 'exit' to quit): ";

#[derive(Debug, Parser)]
#[command(
	version = VERSION,
	rename_all = "kebab",
	styles = styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Answer one question and exit instead of starting an interactive session.
	#[arg(long, short = 'q', value_name = "TEXT")]
	pub question: Option<String>,
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default() | Effects::BOLD)
		.usage(AnsiColor::Red.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = tenk_config::load(&args.config)?;

	init_tracing(&config)?;

	let agent = Agent::new(config, Providers::default())?;

	match args.question {
		Some(question) => answer_once(&agent, &question).await,
		None => interactive(&agent).await,
	}
}

pub fn is_exit_command(line: &str) -> bool {
	let line = line.trim();

	EXIT_COMMANDS.iter().any(|command| command.eq_ignore_ascii_case(line))
}

async fn answer_once(agent: &Agent, question: &str) -> color_eyre::Result<()> {
	tokio::select! {
		answer = agent.ask(question) => {
			println!("{}", answer?);
		},
		_ = tokio::signal::ctrl_c() => {
			tracing::warn!("Interrupted. Question abandoned.");
		},
	}

	Ok(())
}

async fn interactive(agent: &Agent) -> color_eyre::Result<()> {
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdout = tokio::io::stdout();

	loop {
		stdout.write_all(PROMPT.as_bytes()).await?;
		stdout.flush().await?;

		// Polling `ctrl_c` replaces the default SIGINT handler, so the idle prompt listens too.
		let Some(line) = next_line_or_interrupt(&mut lines, tokio::signal::ctrl_c()).await? else {
			break;
		};
		let question = line.trim();

		if question.is_empty() {
			continue;
		}
		if is_exit_command(question) {
			println!("Exiting...");

			break;
		}

		// Dropping the unfinished answer future abandons its in-flight calls.
		tokio::select! {
			result = agent.ask(question) => match result {
				Ok(answer) => println!("\nQuestion: {question}\n\nResponse: {answer}\n"),
				Err(err) => {
					tracing::error!(error = %err, "Question failed.");
					eprintln!("Error: {err}");
				},
			},
			_ = tokio::signal::ctrl_c() => {
				println!();
				tracing::warn!("Interrupted. Question abandoned.");
			},
		}
	}

	Ok(())
}

/// Reads the next line, or `None` at end of input or once `interrupt` resolves.
async fn next_line_or_interrupt<R, F>(
	lines: &mut Lines<R>,
	interrupt: F,
) -> std::io::Result<Option<String>>
where
	R: AsyncBufRead + Unpin,
	F: Future,
{
	tokio::select! {
		line = lines.next_line() => line,
		_ = interrupt => {
			println!("\nExiting...");

			Ok(None)
		},
	}
}

fn init_tracing(config: &tenk_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}
