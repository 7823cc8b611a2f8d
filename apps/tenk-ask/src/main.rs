use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = tenk_ask::Args::parse();

	tenk_ask::run(args).await
}
