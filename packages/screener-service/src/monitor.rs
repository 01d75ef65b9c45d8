//! Ongoing monitoring.
//!
//! A sweep screens subjects flagged for ongoing monitoring again by their English and Chinese
//! names. Pending changelog entries that touch any matched record are bundled into one
//! monitoring record per subject, and those entries are marked completed as soon as the record
//! is stored. Applying folds `todo` monitoring records into the subject's history results and
//! marks each record done once its entries are written.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::{Map, Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use screener_storage::{DocumentStore, Filter};

use crate::{Dataset, Error, Result, ScreenerService, search::Retriever};

const NAME_FIELDS: [&str; 2] = ["nameEN", "nameZH"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Subjects flagged for monitoring.
	pub subjects: usize,
	/// Monitoring records written.
	pub records: usize,
	/// Changelog entries marked completed.
	pub changelogs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
	/// Monitoring records marked done.
	pub records: usize,
	/// History results replaced by a modification.
	pub updated: u64,
	/// History results created by an addition.
	pub inserted: usize,
}

struct SubjectOutcome {
	record: Value,
	changelog_ids: Vec<Value>,
}

#[derive(Clone)]
struct Sweep {
	store: Arc<dyn DocumentStore>,
	retrievers: Arc<[Retriever]>,
	changelogs: String,
	timeout: Duration,
	timestamp: String,
}
impl Sweep {
	async fn subject(&self, subject: &Value) -> Result<Option<SubjectOutcome>> {
		let names = NAME_FIELDS
			.into_iter()
			.filter_map(|field| subject.get(field).and_then(Value::as_str))
			.filter(|name| !name.trim().is_empty())
			.collect::<Vec<_>>();
		let mut matched: Vec<Value> = Vec::new();

		for retriever in self.retrievers.iter() {
			for name in &names {
				for found in retriever.matches(self.store.as_ref(), name).await? {
					let fresh = found.get("_id").is_some_and(|id| {
						!matched.iter().any(|seen| seen.get("_id") == Some(id))
					});

					if fresh {
						matched.push(found);
					}
				}
			}
		}

		if matched.is_empty() {
			return Ok(None);
		}

		let ids = matched.iter().filter_map(|doc| doc.get("_id").cloned()).collect();
		// Additions recorded before the source row had an id carry the row itself as `new_data`.
		let contents = matched.iter().map(without_id).collect();
		let filter = Filter::AllOf(vec![
			Filter::AnyOf(vec![
				Filter::is_in("original_data_id", ids),
				Filter::is_in("new_data", contents),
			]),
			Filter::eq("status", "pending"),
		]);
		let logs = screener_storage::bounded(
			"find",
			self.timeout,
			self.store.find(&self.changelogs, &filter),
		)
		.await?;

		if logs.is_empty() {
			return Ok(None);
		}

		let changelog_ids = logs.iter().filter_map(|log| log.get("_id").cloned()).collect();
		let data = logs.iter().map(changelog_entry).collect::<Vec<_>>();
		let record = json!({
			"aml_history_id": field(subject, "_id"),
			"searchBy": field(subject, "searchBy"),
			"status": "todo",
			"createdAt": self.timestamp,
			"updatedAt": self.timestamp,
			"data": data,
		});

		Ok(Some(SubjectOutcome { record, changelog_ids }))
	}
}

struct Applier {
	store: Arc<dyn DocumentStore>,
	history_results: String,
	timeout: Duration,
	timestamp: String,
}
impl Applier {
	/// Writes the entries of one monitoring record. `known` holds the subject's history results
	/// and receives the ones created here.
	async fn record(&self, record: &Value, known: &mut Vec<Value>) -> Result<(u64, usize)> {
		let subject = field(record, "aml_history_id");
		let mut entries = record.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
		let mut updated = 0;
		let mut inserted = 0;

		entries.sort_by(|left, right| created_at(left).cmp(&created_at(right)));

		for entry in &entries {
			let data_id = data_id_text(entry.get("data_id"));
			let position = data_id.as_ref().and_then(|id| {
				known.iter().position(|result| data_id_text(result.get("data_id")).as_ref() == Some(id))
			});
			let new_data = entry.get("new_data").filter(|value| !value.is_null());

			match (position, entry.get("type").and_then(Value::as_str), new_data) {
				(Some(position), Some("MOD"), Some(new_data)) => {
					let mut fields = Map::new();

					fields.insert("result".to_string(), new_data.clone());
					fields.insert("updatedAt".to_string(), Value::from(self.timestamp.as_str()));

					let filter = Filter::eq("_id", field(&known[position], "_id"));

					updated += screener_storage::bounded(
						"set_fields",
						self.timeout,
						self.store.set_fields(&self.history_results, &filter, fields),
					)
					.await?;

					if let Some(result) = known[position].as_object_mut() {
						result.insert("result".to_string(), new_data.clone());
					}
				},
				(None, Some("ADD"), _) => {
					let mut result = json!({
						"aml_history_id": subject,
						"type": field(entry, "category"),
						"category": field(entry, "category"),
						"data_id": data_id.map(Value::String).unwrap_or(Value::Null),
						"result": field(entry, "new_data"),
						"createdAt": self.timestamp,
						"updatedAt": self.timestamp,
					});
					let id = screener_storage::bounded(
						"insert",
						self.timeout,
						self.store.insert(&self.history_results, result.clone()),
					)
					.await?;

					if let Some(map) = result.as_object_mut() {
						map.insert("_id".to_string(), id);
					}

					known.push(result);

					inserted += 1;
				},
				(_, kind, _) => {
					tracing::debug!(
						subject = %subject,
						kind = kind.unwrap_or("unknown"),
						"Monitoring entry has nothing to apply."
					);
				},
			}
		}

		Ok((updated, inserted))
	}
}

impl ScreenerService {
	/// Runs one monitoring sweep stamped with `now`.
	///
	/// A subject that fails, including a failed write of its record, is logged and skipped. Its
	/// changelog entries stay pending. Other store failures abort the sweep.
	pub async fn run_monitoring_sweep(&self, now: OffsetDateTime) -> Result<SweepReport> {
		let timestamp = rfc3339(now)?;
		let collections = &self.cfg.storage.collections;
		let timeout = self.query_timeout();
		let store = self.connections.acquire().await?;
		let subjects = screener_storage::bounded(
			"find",
			timeout,
			store.find(&collections.history, &Filter::eq("ongoing_monitoring", true)),
		)
		.await?;
		let sweep = Sweep {
			store: store.clone(),
			retrievers: Dataset::ALL
				.into_iter()
				.map(|dataset| Retriever::new(self, dataset).raw())
				.collect(),
			changelogs: collections.changelogs.clone(),
			timeout,
			timestamp,
		};
		let tasks = subjects
			.iter()
			.map(|subject| {
				let sweep = sweep.clone();
				let subject = subject.clone();

				tokio::spawn(async move { sweep.subject(&subject).await })
			})
			.collect::<Vec<_>>();
		let mut report = SweepReport { subjects: subjects.len(), ..Default::default() };

		for (subject, task) in subjects.iter().zip(tasks) {
			let outcome = match task.await {
				Ok(Ok(outcome)) => outcome,
				Ok(Err(err)) => {
					tracing::warn!(
						error = %err,
						subject = %field(subject, "_id"),
						"Monitoring subject failed. Skipping it."
					);

					continue;
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						subject = %field(subject, "_id"),
						"Monitoring subject task did not complete. Skipping it."
					);

					continue;
				},
			};
			let Some(SubjectOutcome { record, changelog_ids }) = outcome else {
				continue;
			};

			if let Err(err) = screener_storage::bounded(
				"insert",
				timeout,
				store.insert(&collections.ongoing_monitoring, record),
			)
			.await
			{
				tracing::warn!(
					error = %err,
					subject = %field(subject, "_id"),
					"Monitoring record was not stored. Skipping the subject."
				);

				continue;
			}

			report.records += 1;
			report.changelogs += screener_storage::bounded(
				"set_fields",
				timeout,
				store.set_fields(
					&collections.changelogs,
					&Filter::is_in("_id", changelog_ids),
					status_fields("completed"),
				),
			)
			.await?;
		}

		tracing::info!(
			subjects = report.subjects,
			records = report.records,
			changelogs = report.changelogs,
			"Monitoring sweep finished."
		);

		Ok(report)
	}

	/// Applies every `todo` monitoring record to the history results of its subject.
	///
	/// Modifications replace the `result` of the history result with the same `data_id`;
	/// additions without one create it. A record that fails to apply is logged and stays `todo`.
	pub async fn apply_monitoring_records(&self, now: OffsetDateTime) -> Result<ApplyReport> {
		let timestamp = rfc3339(now)?;
		let collections = &self.cfg.storage.collections;
		let timeout = self.query_timeout();
		let store = self.connections.acquire().await?;
		let records = screener_storage::bounded(
			"find",
			timeout,
			store.find(&collections.ongoing_monitoring, &Filter::eq("status", "todo")),
		)
		.await?;
		let mut subjects = Vec::new();

		for record in &records {
			let subject = field(record, "aml_history_id");

			if !subjects.contains(&subject) {
				subjects.push(subject);
			}
		}

		let existing = screener_storage::bounded(
			"find",
			timeout,
			store.find(&collections.history_result, &Filter::is_in("aml_history_id", subjects)),
		)
		.await?;
		let mut known: HashMap<String, Vec<Value>> = HashMap::new();

		for result in existing {
			known.entry(field(&result, "aml_history_id").to_string()).or_default().push(result);
		}

		let applier = Applier {
			store: store.clone(),
			history_results: collections.history_result.clone(),
			timeout,
			timestamp,
		};
		let mut report = ApplyReport::default();

		for record in &records {
			let subject_results =
				known.entry(field(record, "aml_history_id").to_string()).or_default();

			match applier.record(record, subject_results).await {
				Ok((updated, inserted)) => {
					report.updated += updated;
					report.inserted += inserted;
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						record = %field(record, "_id"),
						"Monitoring record could not be applied. Leaving it to do."
					);

					continue;
				},
			}

			screener_storage::bounded(
				"set_fields",
				timeout,
				store.set_fields(
					&collections.ongoing_monitoring,
					&Filter::eq("_id", field(record, "_id")),
					status_fields("done"),
				),
			)
			.await?;

			report.records += 1;
		}

		tracing::info!(
			records = report.records,
			updated = report.updated,
			inserted = report.inserted,
			"Monitoring records applied."
		);

		Ok(report)
	}
}

fn rfc3339(now: OffsetDateTime) -> Result<String> {
	now.format(&Rfc3339).map_err(|err| Error::InvalidRequest {
		message: format!("Timestamp cannot be formatted: {err}."),
	})
}

fn status_fields(status: &str) -> Map<String, Value> {
	let mut fields = Map::new();

	fields.insert("status".to_string(), Value::from(status));

	fields
}

fn field(doc: &Value, name: &str) -> Value {
	doc.get(name).cloned().unwrap_or(Value::Null)
}

fn created_at(entry: &Value) -> Option<&str> {
	entry.get("createdAt").and_then(Value::as_str)
}

fn without_id(doc: &Value) -> Value {
	let mut doc = doc.clone();

	if let Some(map) = doc.as_object_mut() {
		map.remove("_id");
	}

	doc
}

/// Text form of a `data_id`; history results store it as a string.
fn data_id_text(value: Option<&Value>) -> Option<String> {
	match value? {
		Value::Null => None,
		Value::String(text) if text.is_empty() => None,
		Value::String(text) => Some(text.clone()),
		other => Some(other.to_string()),
	}
}

/// Monitoring entry for one changelog. Modifications carry their `changes`, additions their
/// `new_data`; a modification also keeps `new_data` when the changelog has one.
fn changelog_entry(log: &Value) -> Value {
	let mut entry = Map::new();

	entry.insert("sourcedata_changelogs_id".to_string(), field(log, "_id"));
	entry.insert("data_id".to_string(), field(log, "original_data_id"));
	entry.insert("category".to_string(), field(log, "category"));
	entry.insert("type".to_string(), field(log, "action"));

	match log.get("action").and_then(Value::as_str) {
		Some("MOD") => {
			entry.insert("changes".to_string(), field(log, "changes"));

			if let Some(new_data) = log.get("new_data") {
				entry.insert("new_data".to_string(), new_data.clone());
			}
		},
		Some("ADD") => {
			entry.insert("new_data".to_string(), field(log, "new_data"));
		},
		_ => {},
	}

	Value::Object(entry)
}

#[cfg(test)]
mod tests {
	use serde_json::{Value, json};

	use super::{changelog_entry, data_id_text, without_id};

	#[test]
	fn entries_carry_action_specific_payloads() {
		let modified = changelog_entry(&json!({
			"_id": "log-1",
			"original_data_id": "j-1",
			"category": "judgment",
			"action": "MOD",
			"changes": { "title": "new" }
		}));
		let replaced = changelog_entry(&json!({
			"_id": "log-4",
			"action": "MOD",
			"changes": {},
			"new_data": { "title": "x" }
		}));
		let added = changelog_entry(&json!({
			"_id": "log-2",
			"original_data_id": "j-2",
			"category": "judgment",
			"action": "ADD",
			"new_data": { "title": "x" }
		}));
		let removed = changelog_entry(&json!({ "_id": "log-3", "action": "DEL" }));

		assert_eq!(modified["changes"], json!({ "title": "new" }));
		assert!(modified.get("new_data").is_none());
		assert_eq!(replaced["new_data"], json!({ "title": "x" }));
		assert_eq!(added["new_data"], json!({ "title": "x" }));
		assert_eq!(added["type"], json!("ADD"));
		assert_eq!(removed["data_id"], Value::Null);
		assert!(removed.get("changes").is_none() && removed.get("new_data").is_none());
	}

	#[test]
	fn data_ids_compare_as_text() {
		assert_eq!(data_id_text(Some(&json!("j-1"))), Some("j-1".to_string()));
		assert_eq!(data_id_text(Some(&json!(7))), Some("7".to_string()));
		assert_eq!(data_id_text(Some(&json!(""))), None);
		assert_eq!(data_id_text(Some(&Value::Null)), None);
		assert_eq!(data_id_text(None), None);
	}

	#[test]
	fn ids_are_stripped_for_content_lookups() {
		assert_eq!(without_id(&json!({ "_id": "j-1", "title": "t" })), json!({ "title": "t" }));
	}
}
