//! Command line plumbing shared by the screener binaries.

use std::path::PathBuf;

use clap::{
	Args,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const FALLBACK_LOG_FILTER: &str = "info";

/// Flags every binary accepts.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
	/// Path to the TOML configuration file.
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

/// Log filter for `directive`, falling back to `info` when it does not parse.
pub fn log_filter(directive: &str) -> EnvFilter {
	EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_FILTER))
}

/// Installs the global fmt subscriber. A second call is ignored.
pub fn init_tracing(log_level: &str) {
	let _ = tracing_subscriber::fmt().with_env_filter(log_filter(log_level)).try_init();
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[derive(Debug, Parser)]
	struct Cli {
		#[command(flatten)]
		config: ConfigArgs,
	}

	#[test]
	fn version_starts_with_package_version() {
		assert!(VERSION.starts_with(env!("CARGO_PKG_VERSION")));
	}

	#[test]
	fn config_flag_has_short_form() {
		let cli = Cli::try_parse_from(["screener", "-c", "screener.toml"]).expect("parse");

		assert_eq!(cli.config.config, PathBuf::from("screener.toml"));
	}

	#[test]
	fn bad_directives_fall_back_to_info() {
		assert_eq!(log_filter("screener=loudest").to_string(), FALLBACK_LOG_FILTER);
		assert_eq!(log_filter("debug").to_string(), "debug");
	}
}
