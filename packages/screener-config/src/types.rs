use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub search: Search,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	#[serde(default)]
	pub collections: Collections,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	/// Database to use on the server behind `dsn`. Overrides any database named in the dsn.
	pub database: String,
	pub pool_max_conns: u32,
	#[serde(default = "default_connect_timeout_ms")]
	pub connect_timeout_ms: u64,
	/// Upper bound for every store call, including the liveness ping.
	#[serde(default = "default_query_timeout_ms")]
	pub query_timeout_ms: u64,
	/// Create missing collection tables on connect.
	#[serde(default = "default_ensure_schema")]
	pub ensure_schema: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collections {
	pub adverse_media: String,
	pub judgment: String,
	pub changelogs: String,
	pub history: String,
	pub ongoing_monitoring: String,
	#[serde(default = "default_history_result_collection")]
	pub history_result: String,
}
impl Default for Collections {
	fn default() -> Self {
		Self {
			adverse_media: "adverse_media".to_string(),
			judgment: "judgment".to_string(),
			changelogs: "sourcedata_changelogs".to_string(),
			history: "aml_history".to_string(),
			ongoing_monitoring: "aml_ongoing_monitoring".to_string(),
			history_result: default_history_result_collection(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	#[serde(default)]
	pub adverse_media_output: AdverseMediaOutput,
	/// Also score `name_zh` / `zh[].ceName` next to the English names of the matching variant.
	#[serde(default)]
	pub score_chinese_names: bool,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			adverse_media_output: AdverseMediaOutput::default(),
			score_chinese_names: false,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdverseMediaOutput {
	#[default]
	Projected,
	Raw,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_connect_timeout_ms() -> u64 {
	5_000
}

fn default_query_timeout_ms() -> u64 {
	10_000
}

fn default_history_result_collection() -> String {
	"aml_history_result".to_string()
}

fn default_ensure_schema() -> bool {
	true
}
