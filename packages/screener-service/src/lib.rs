pub mod envelope;
pub mod monitor;
pub mod search;

mod error;

pub use envelope::{Envelope, MISSING_NAMES_MESSAGE};
pub use error::{Error, Result};
pub use monitor::{ApplyReport, SweepReport};

use std::{sync::Arc, time::Duration};

use screener_config::{Collections, Config};
use screener_storage::{ConnectionCache, Connector, PgConnector};

/// A searchable reference dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
	AdverseMedia,
	Judgment,
}
impl Dataset {
	pub const ALL: [Self; 2] = [Self::AdverseMedia, Self::Judgment];

	/// Human readable name used in failure messages.
	pub fn label(self) -> &'static str {
		match self {
			Self::AdverseMedia => "Adverse media",
			Self::Judgment => "Judgment",
		}
	}

	/// URL path segment.
	pub fn slug(self) -> &'static str {
		match self {
			Self::AdverseMedia => "adverse-media",
			Self::Judgment => "judgments",
		}
	}

	pub fn from_slug(slug: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|dataset| dataset.slug() == slug)
	}

	pub fn collection(self, collections: &Collections) -> &str {
		match self {
			Self::AdverseMedia => &collections.adverse_media,
			Self::Judgment => &collections.judgment,
		}
	}
}

pub struct ScreenerService {
	pub cfg: Config,
	pub connections: ConnectionCache,
}
impl ScreenerService {
	/// Connects to Postgres lazily, on the first request.
	pub fn new(cfg: Config) -> Self {
		let connector = Arc::new(PgConnector::from_config(&cfg.storage));

		Self::with_connector(cfg, connector)
	}

	pub fn with_connector(cfg: Config, connector: Arc<dyn Connector>) -> Self {
		let ping_timeout = Duration::from_millis(cfg.storage.postgres.query_timeout_ms);

		Self { cfg, connections: ConnectionCache::new(connector, ping_timeout) }
	}

	pub(crate) fn query_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.storage.postgres.query_timeout_ms)
	}
}
