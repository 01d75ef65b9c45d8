//! One-shot ongoing monitoring jobs, meant to be driven by a scheduler.

use clap::{Parser, ValueEnum};
use time::OffsetDateTime;

use screener_cli::ConfigArgs;
use screener_service::{ApplyReport, ScreenerService, SweepReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Job {
	/// Screen monitored subjects again and record pending changes.
	Sweep,
	/// Apply recorded changes to history results.
	Apply,
	/// Sweep, then apply.
	All,
}

#[derive(Debug, Parser)]
#[command(
	version = screener_cli::VERSION,
	rename_all = "kebab",
	styles = screener_cli::styles(),
)]
pub struct Args {
	#[command(flatten)]
	pub config: ConfigArgs,
	#[arg(long, value_enum, default_value_t = Job::Sweep)]
	pub job: Job,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = screener_config::load(&args.config.config)?;

	screener_cli::init_tracing(&config.service.log_level);

	let service = ScreenerService::new(config);
	let result = run_job(&service, args.job).await;

	service.connections.invalidate().await;

	result
}

async fn run_job(service: &ScreenerService, job: Job) -> color_eyre::Result<()> {
	if matches!(job, Job::Sweep | Job::All) {
		let SweepReport { subjects, records, changelogs } =
			service.run_monitoring_sweep(OffsetDateTime::now_utc()).await?;

		tracing::info!(subjects, records, changelogs, "Sweep complete.");
	}
	if matches!(job, Job::Apply | Job::All) {
		let ApplyReport { records, updated, inserted } =
			service.apply_monitoring_records(OffsetDateTime::now_utc()).await?;

		tracing::info!(records, updated, inserted, "Apply complete.");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::{Args, Job};

	#[test]
	fn requires_a_config_path() {
		assert!(Args::try_parse_from(["screener-monitor"]).is_err());

		let args = Args::try_parse_from(["screener-monitor", "-c", "screener.toml"])
			.expect("Failed to parse args.");

		assert_eq!(args.config.config.to_str(), Some("screener.toml"));
		assert_eq!(args.job, Job::Sweep);
	}

	#[test]
	fn selects_a_job() {
		let args = Args::try_parse_from(["screener-monitor", "-c", "s.toml", "--job", "apply"])
			.expect("Failed to parse args.");

		assert_eq!(args.job, Job::Apply);
		assert!(Args::try_parse_from(["screener-monitor", "-c", "s.toml", "--job", "purge"]).is_err());
	}
}
