mod error;
mod types;

pub use error::{Error, Result};
pub use types::{AdverseMediaOutput, Collections, Config, Postgres, Search, Service, Storage};

use std::{env, fs, path::Path};

use regex::Regex;

pub const ENV_STORE_DSN: &str = "SCREENER_STORE_DSN";
pub const ENV_STORE_DATABASE: &str = "SCREENER_STORE_DATABASE";

const COLLECTION_NAME_PATTERN: &str = r"^[a-z_][a-z0-9_]*$";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg = parse(path, &raw)?;

	apply_env_overrides(&mut cfg, |key| env::var(key).ok());
	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn parse(path: &Path, raw: &str) -> Result<Config> {
	toml::from_str(raw).map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })
}

/// Replaces connection settings with values from the environment when they are set and
/// non-empty.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

	if let Some(dsn) = non_empty(ENV_STORE_DSN) {
		cfg.storage.postgres.dsn = dsn;
	}
	if let Some(database) = non_empty(ENV_STORE_DATABASE) {
		cfg.storage.postgres.database = database;
	}
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}

	let postgres = &cfg.storage.postgres;

	if postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("storage.postgres.dsn must be non-empty (or set {ENV_STORE_DSN})."),
		});
	}
	if postgres.database.trim().is_empty() {
		return Err(Error::Validation {
			message: format!(
				"storage.postgres.database must be non-empty (or set {ENV_STORE_DATABASE})."
			),
		});
	}
	if postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if postgres.connect_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.connect_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if postgres.query_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.query_timeout_ms must be greater than zero.".to_string(),
		});
	}

	let collections = &cfg.storage.collections;

	for (label, name) in [
		("adverse_media", &collections.adverse_media),
		("judgment", &collections.judgment),
		("changelogs", &collections.changelogs),
		("history", &collections.history),
		("ongoing_monitoring", &collections.ongoing_monitoring),
		("history_result", &collections.history_result),
	] {
		if !Regex::new(COLLECTION_NAME_PATTERN).map(|re| re.is_match(name)).unwrap_or(false) {
			return Err(Error::Validation {
				message: format!(
					"storage.collections.{label} must match ^[a-z_][a-z0-9_]*$, got {name:?}."
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.postgres.dsn = cfg.storage.postgres.dsn.trim().to_string();
	cfg.storage.postgres.database = cfg.storage.postgres.database.trim().to_string();
}
