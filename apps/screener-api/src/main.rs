use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = screener_api::Args::parse();

	screener_api::run(args).await
}
