use std::{future::Future, pin::Pin, time::Duration};

use serde_json::{Map, Value};

use crate::{
	Error, Result,
	pipeline::{Filter, Pipeline},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A document store addressed by collection name.
///
/// Documents are JSON objects identified by their `_id` field.
pub trait DocumentStore
where
	Self: Send + Sync,
{
	/// Cheap liveness check.
	fn ping(&self) -> BoxFuture<'_, Result<()>>;

	fn aggregate<'a>(
		&'a self,
		collection: &'a str,
		pipeline: &'a Pipeline,
	) -> BoxFuture<'a, Result<Vec<Value>>>;

	fn find<'a>(&'a self, collection: &'a str, filter: &'a Filter)
	-> BoxFuture<'a, Result<Vec<Value>>>;

	/// Inserts `doc`, assigning a fresh `_id` when it has none, and returns the `_id`.
	fn insert<'a>(&'a self, collection: &'a str, doc: Value) -> BoxFuture<'a, Result<Value>>;

	/// Merges `fields` into the top level of every matching document. Returns the number of
	/// documents updated.
	fn set_fields<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Filter,
		fields: Map<String, Value>,
	) -> BoxFuture<'a, Result<u64>>;

	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(async {})
	}
}

/// Runs a store call, failing with [`Error::Timeout`] once `timeout` elapses.
pub async fn bounded<T, F>(operation: &'static str, timeout: Duration, call: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	tokio::time::timeout(timeout, call)
		.await
		.map_err(|_| Error::Timeout { operation, timeout_ms: timeout.as_millis() as u64 })?
}
