pub mod routes;
pub mod state;

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;

use screener_cli::ConfigArgs;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = screener_cli::VERSION,
	rename_all = "kebab",
	styles = screener_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub config: ConfigArgs,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = screener_config::load(&args.config.config)?;

	screener_cli::init_tracing(&config.service.log_level);

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let app = routes::router(AppState::new(config));
	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	axum::serve(listener, app).await?;

	Ok(())
}
