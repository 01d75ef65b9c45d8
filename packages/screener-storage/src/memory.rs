//! In-memory backend.
//!
//! Thread-safe and evaluates pipelines with the same semantics as the Postgres backend. Intended
//! for embedded runs and tests.

use std::{
	collections::{HashMap, HashSet},
	sync::RwLock,
};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
	Error, Result,
	pipeline::{self, Emit, Filter, Pipeline, Stage},
	store::{BoxFuture, DocumentStore},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
	collections: RwLock<HashMap<String, Vec<Value>>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds `collection` with `docs`, appending to anything already there.
	pub fn with_documents(self, collection: &str, docs: impl IntoIterator<Item = Value>) -> Self {
		if let Ok(mut collections) = self.collections.write() {
			collections.entry(collection.to_string()).or_default().extend(docs);
		}

		self
	}

	pub fn documents(&self, collection: &str) -> Result<Vec<Value>> {
		let collections = self.collections.read().map_err(|_| lock_err("documents"))?;

		Ok(collections.get(collection).cloned().unwrap_or_default())
	}

	fn run_pipeline(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Value>> {
		let sources = self.documents(collection)?;
		// Every row remembers the index of the stored document it came from.
		let mut rows: Vec<(usize, Value)> = sources.iter().cloned().enumerate().collect();

		for stage in &pipeline.stages {
			rows = match stage {
				Stage::Unwind { path, preserve_empty } => unwind(rows, path, *preserve_empty),
				Stage::Match(filter) => rows.into_iter().filter(|(_, row)| matches(row, filter)).collect(),
				Stage::GroupFirst { key, emit } => {
					let firsts = group_first(rows, key);

					match emit {
						Emit::Row => firsts,
						Emit::Source => firsts
							.into_iter()
							.map(|(source, row)| {
								(source, sources.get(source).cloned().unwrap_or(row))
							})
							.collect(),
					}
				},
			};
		}

		Ok(rows.into_iter().map(|(_, row)| row).collect())
	}
}

impl DocumentStore for MemoryStore {
	fn ping(&self) -> BoxFuture<'_, Result<()>> {
		let result = self.collections.read().map(|_| ()).map_err(|_| lock_err("ping"));

		Box::pin(async move { result })
	}

	fn aggregate<'a>(
		&'a self,
		collection: &'a str,
		pipeline: &'a Pipeline,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move { self.run_pipeline(collection, pipeline) })
	}

	fn find<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Filter,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move {
			Ok(self.documents(collection)?.into_iter().filter(|doc| matches(doc, filter)).collect())
		})
	}

	fn insert<'a>(&'a self, collection: &'a str, doc: Value) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			let Value::Object(mut map) = doc else {
				return Err(Error::InvalidArgument("Documents must be JSON objects.".to_string()));
			};
			let id = map
				.entry("_id")
				.or_insert_with(|| Value::String(Uuid::new_v4().to_string()))
				.clone();
			let mut collections = self.collections.write().map_err(|_| lock_err("insert"))?;
			let docs = collections.entry(collection.to_string()).or_default();

			if docs.iter().any(|existing| existing.get("_id") == Some(&id)) {
				return Err(Error::InvalidArgument(format!("Duplicate _id {id} in {collection}.")));
			}

			docs.push(Value::Object(map));

			Ok(id)
		})
	}

	fn set_fields<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Filter,
		fields: Map<String, Value>,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move {
			let mut collections = self.collections.write().map_err(|_| lock_err("set_fields"))?;
			let mut updated = 0;

			for doc in collections.get_mut(collection).into_iter().flatten() {
				if !matches(doc, filter) {
					continue;
				}
				if let Value::Object(map) = doc {
					map.extend(fields.clone());

					updated += 1;
				}
			}

			Ok(updated)
		})
	}
}

fn lock_err(context: &'static str) -> Error {
	Error::Backend(format!("Poisoned lock during {context}."))
}

pub(crate) fn matches(doc: &Value, filter: &Filter) -> bool {
	match filter {
		Filter::Contains { path, needle } => {
			let needle = needle.to_lowercase();

			pipeline::values_at(doc, path)
				.into_iter()
				.filter_map(Value::as_str)
				.any(|text| text.to_lowercase().contains(&needle))
		},
		Filter::Eq { path, value } => equals(doc, path, value),
		Filter::In { path, values } => values.iter().any(|value| equals(doc, path, value)),
		Filter::AnyOf(filters) => filters.iter().any(|filter| matches(doc, filter)),
		Filter::AllOf(filters) => filters.iter().all(|filter| matches(doc, filter)),
	}
}

fn equals(doc: &Value, path: &str, value: &Value) -> bool {
	if pipeline::is_structured(value) {
		return pipeline::field_at(doc, path) == Some(value);
	}

	pipeline::values_at(doc, path).into_iter().any(|found| found == value)
}

fn unwind(rows: Vec<(usize, Value)>, path: &str, preserve_empty: bool) -> Vec<(usize, Value)> {
	let mut out = Vec::with_capacity(rows.len());

	for (source, row) in rows {
		match pipeline::field_at(&row, path).cloned() {
			Some(Value::Array(items)) if !items.is_empty() =>
				for item in items {
					let mut expanded = row.clone();

					replace_field(&mut expanded, path, Some(item));
					out.push((source, expanded));
				},
			Some(Value::Array(_)) =>
				if preserve_empty {
					let mut kept = row;

					replace_field(&mut kept, path, None);
					out.push((source, kept));
				},
			None | Some(Value::Null) =>
				if preserve_empty {
					out.push((source, row));
				},
			Some(_) => out.push((source, row)),
		}
	}

	out
}

fn replace_field(doc: &mut Value, path: &str, value: Option<Value>) {
	let segments = pipeline::segments(path);
	let Some((last, parents)) = segments.split_last() else {
		return;
	};
	let mut current = doc;

	for segment in parents {
		match current.get_mut(*segment) {
			Some(next) => current = next,
			None => return,
		}
	}

	if let Value::Object(map) = current {
		match value {
			Some(value) => {
				map.insert((*last).to_string(), value);
			},
			None => {
				map.remove(*last);
			},
		}
	}
}

fn group_first(rows: Vec<(usize, Value)>, key: &str) -> Vec<(usize, Value)> {
	let mut seen = HashSet::new();

	rows.into_iter()
		.filter(|(_, row)| {
			let group = pipeline::field_at(row, key).cloned().unwrap_or(Value::Null).to_string();

			seen.insert(group)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn media() -> MemoryStore {
		MemoryStore::new().with_documents(
			"adverse_media",
			[
				json!({
					"_id": "a",
					"target": [{ "name_en": "Wong Siu Ming" }, { "name_en": "Wong Tai Sin" }]
				}),
				json!({ "_id": "b", "target": { "en": [{ "ceName": "Lee Ka Shing" }] } }),
				json!({ "_id": "c" }),
				json!({ "_id": "d", "target": [] }),
			],
		)
	}

	#[tokio::test]
	async fn unwind_then_group_keeps_first_match() {
		let store = media();
		let pipeline = Pipeline::new()
			.unwind("target", true)
			.matching(Filter::contains("target.name_en", "WONG"))
			.group_first("_id");
		let rows = store.aggregate("adverse_media", &pipeline).await.expect("aggregate");

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["_id"], json!("a"));
		assert_eq!(rows[0]["target"], json!({ "name_en": "Wong Siu Ming" }));
	}

	#[tokio::test]
	async fn group_can_yield_the_stored_document() {
		let store = media();
		let pipeline = Pipeline::new()
			.unwind("target", true)
			.matching(Filter::contains("target.name_en", "tai sin"))
			.group_first_source("_id");
		let rows = store.aggregate("adverse_media", &pipeline).await.expect("aggregate");

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["target"][0], json!({ "name_en": "Wong Siu Ming" }));
		assert_eq!(rows[0]["target"].as_array().map(Vec::len), Some(2));
	}

	#[tokio::test]
	async fn unwind_preserves_missing_and_empty_targets() {
		let store = media();
		let preserved = store
			.aggregate("adverse_media", &Pipeline::new().unwind("target", true))
			.await
			.expect("aggregate");
		let dropped = store
			.aggregate("adverse_media", &Pipeline::new().unwind("target", false))
			.await
			.expect("aggregate");

		// a twice, b once (object passes through), c and d kept only when preserving.
		assert_eq!(preserved.len(), 5);
		assert_eq!(dropped.len(), 3);
		assert!(preserved.iter().any(|row| row["_id"] == json!("d") && row.get("target").is_none()));
	}

	#[tokio::test]
	async fn contains_crosses_nested_lists() {
		let store = media();
		let filter = Filter::contains("target.en.ceName", "ka sh");
		let rows = store.find("adverse_media", &filter).await.expect("find");

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["_id"], json!("b"));
	}

	#[tokio::test]
	async fn structured_equality_compares_whole_values() {
		let store = MemoryStore::new().with_documents(
			"changelogs",
			[
				json!({ "_id": 1, "new_data": { "title": "A", "year": 2024 } }),
				json!({ "_id": 2, "new_data": { "title": "A", "year": 2024, "extra": true } }),
				json!({ "_id": 3, "new_data": [{ "title": "A", "year": 2024 }] }),
			],
		);
		let filter = Filter::eq("new_data", json!({ "year": 2024, "title": "A" }));
		let rows = store.find("changelogs", &filter).await.expect("find");

		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["_id"], json!(1));
	}

	#[tokio::test]
	async fn insert_assigns_ids_and_rejects_duplicates() {
		let store = MemoryStore::new();
		let id = store.insert("notes", json!({ "text": "x" })).await.expect("insert");

		assert!(id.is_string());
		assert!(store.insert("notes", json!({ "_id": id, "text": "y" })).await.is_err());
		assert!(store.insert("notes", json!("not an object")).await.is_err());
	}

	#[tokio::test]
	async fn set_fields_updates_matching_documents() {
		let store = MemoryStore::new().with_documents(
			"changelogs",
			[
				json!({ "_id": 1, "status": "pending" }),
				json!({ "_id": 2, "status": "pending" }),
				json!({ "_id": 3, "status": "completed" }),
			],
		);
		let filter = Filter::AllOf(vec![
			Filter::is_in("_id", vec![json!(1), json!(3)]),
			Filter::eq("status", "pending"),
		]);
		let mut fields = Map::new();

		fields.insert("status".to_string(), json!("completed"));

		let updated = store.set_fields("changelogs", &filter, fields).await.expect("update");
		let pending = store
			.find("changelogs", &Filter::eq("status", "pending"))
			.await
			.expect("find");

		assert_eq!(updated, 1);
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0]["_id"], json!(2));
	}
}
