use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = screener_monitor::Args::parse();

	screener_monitor::run(args).await
}
