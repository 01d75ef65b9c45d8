//! Process-wide store handle reuse.
//!
//! [`ConnectionCache`] keeps at most one live handle. A cached handle is pinged before every
//! reuse; a failed ping discards it and a fresh handle is created in the same critical section,
//! so concurrent callers never race to replace it.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, time};

use crate::{
	Error, Result,
	memory::MemoryStore,
	pg::PgStore,
	store::{BoxFuture, DocumentStore},
};

/// Creates new store handles for a [`ConnectionCache`].
pub trait Connector
where
	Self: Send + Sync,
{
	fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn DocumentStore>>>;
}

pub struct PgConnector {
	cfg: screener_config::Postgres,
	collections: Vec<String>,
}
impl PgConnector {
	pub fn new(cfg: screener_config::Postgres, collections: Vec<String>) -> Self {
		Self { cfg, collections }
	}

	pub fn from_config(cfg: &screener_config::Storage) -> Self {
		let collections = &cfg.collections;

		Self::new(
			cfg.postgres.clone(),
			vec![
				collections.adverse_media.clone(),
				collections.judgment.clone(),
				collections.changelogs.clone(),
				collections.history.clone(),
				collections.ongoing_monitoring.clone(),
				collections.history_result.clone(),
			],
		)
	}
}

impl Connector for PgConnector {
	fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn DocumentStore>>> {
		Box::pin(async move {
			let store = PgStore::connect(&self.cfg).await?;

			if self.cfg.ensure_schema {
				store.ensure_schema(self.collections.iter().map(String::as_str)).await?;
			}

			Ok(Arc::new(store) as Arc<dyn DocumentStore>)
		})
	}
}

/// Always hands out the same store. Used for embedded runs over a [`MemoryStore`].
pub struct FixedConnector(pub Arc<dyn DocumentStore>);
impl FixedConnector {
	pub fn memory(store: MemoryStore) -> Self {
		Self(Arc::new(store))
	}
}

impl Connector for FixedConnector {
	fn connect(&self) -> BoxFuture<'_, Result<Arc<dyn DocumentStore>>> {
		let store = self.0.clone();

		Box::pin(async move { Ok(store) })
	}
}

pub struct ConnectionCache {
	connector: Arc<dyn Connector>,
	ping_timeout: Duration,
	slot: Mutex<Option<Arc<dyn DocumentStore>>>,
}
impl ConnectionCache {
	pub fn new(connector: Arc<dyn Connector>, ping_timeout: Duration) -> Self {
		Self { connector, ping_timeout, slot: Mutex::new(None) }
	}

	/// Returns a live handle, reusing the cached one when its ping succeeds.
	///
	/// A failure to create a new handle is reported as [`Error::Connection`] and is not retried.
	pub async fn acquire(&self) -> Result<Arc<dyn DocumentStore>> {
		let mut slot = self.slot.lock().await;

		if let Some(store) = slot.as_ref().cloned() {
			match time::timeout(self.ping_timeout, store.ping()).await {
				Ok(Ok(())) => return Ok(store),
				Ok(Err(err)) => {
					tracing::warn!(error = %err, "Cached store handle failed its ping. Reconnecting.");
				},
				Err(_) => {
					tracing::warn!(
						timeout_ms = self.ping_timeout.as_millis() as u64,
						"Cached store handle ping timed out. Reconnecting."
					);
				},
			}

			*slot = None;

			store.close().await;
		}

		let store = self
			.connector
			.connect()
			.await
			.map_err(|err| Error::Connection { message: err.to_string() })?;

		tracing::info!("Store handle created.");

		*slot = Some(store.clone());

		Ok(store)
	}

	/// Drops the cached handle so the next [`ConnectionCache::acquire`] reconnects.
	pub async fn invalidate(&self) {
		if let Some(stale) = self.slot.lock().await.take() {
			stale.close().await;
		}
	}

	pub async fn is_cached(&self) -> bool {
		self.slot.lock().await.is_some()
	}
}
