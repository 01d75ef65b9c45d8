//! Batch name search.
//!
//! Every name runs through its own task: normalize, retrieve loosely from the store, extract the
//! candidate names of each document and keep the documents that clear the similarity threshold.
//! A failing name contributes nothing; it never fails the batch.

use std::{sync::Arc, time::Duration};

use serde_json::Value;

use screener_config::AdverseMediaOutput;
use screener_domain::{
	NameScope, NormalizedKey, extract_candidate_names, normalize, project_adverse_media,
	similarity,
};
use screener_storage::{DocumentStore, Filter, Pipeline};

use crate::{Dataset, Error, MISSING_NAMES_MESSAGE, Result, ScreenerService};

/// Adverse-media name fields consulted during retrieval.
const TARGET_NAME_PATHS: [&str; 4] =
	["target.name_en", "target.name_zh", "target.en.ceName", "target.zh.ceName"];

/// Per-name pipeline for one dataset. Owns everything it needs so it can move into a task.
#[derive(Debug, Clone)]
pub struct Retriever {
	dataset: Dataset,
	collection: String,
	scope: NameScope,
	output: AdverseMediaOutput,
	timeout: Duration,
}
impl Retriever {
	pub fn new(service: &ScreenerService, dataset: Dataset) -> Self {
		let search = &service.cfg.search;

		Self {
			dataset,
			collection: dataset.collection(&service.cfg.storage.collections).to_string(),
			scope: if search.score_chinese_names {
				NameScope::EnglishAndChinese
			} else {
				NameScope::English
			},
			output: search.adverse_media_output,
			timeout: service.query_timeout(),
		}
	}

	/// Same pipeline, but matches are always the stored documents.
	pub fn raw(mut self) -> Self {
		self.output = AdverseMediaOutput::Raw;

		self
	}

	/// Loose retrieval query for `key`.
	pub fn pipeline(&self, key: &NormalizedKey) -> Pipeline {
		match self.dataset {
			Dataset::Judgment => Pipeline::new().matching(Filter::contains("title", key.as_str())),
			Dataset::AdverseMedia => Pipeline::new()
				.unwind("target", true)
				.matching(Filter::AnyOf(
					TARGET_NAME_PATHS
						.into_iter()
						.map(|path| Filter::contains(path, key.as_str()))
						.collect(),
				))
				.group_first_source("_id"),
		}
	}

	/// Matches for one raw name, in retrieval order.
	pub async fn matches(&self, store: &dyn DocumentStore, name: &str) -> Result<Vec<Value>> {
		let key = normalize(name);

		// An empty key scores 0 against everything, so nothing could pass.
		if key.is_empty() {
			return Ok(Vec::new());
		}

		let pipeline = self.pipeline(&key);
		let candidates = screener_storage::bounded(
			"aggregate",
			self.timeout,
			store.aggregate(&self.collection, &pipeline),
		)
		.await?;
		let candidate_count = candidates.len();
		let mut matched = Vec::new();

		for doc in candidates {
			let names = match self.dataset {
				Dataset::Judgment => match doc.get("title").and_then(Value::as_str) {
					Some(title) => vec![title.to_string()],
					None => continue,
				},
				Dataset::AdverseMedia => extract_candidate_names(&doc, self.scope)?,
			};
			let found = similarity::similarities(key.as_str(), names.iter().map(String::as_str));

			if let Some(best) = found.first() {
				tracing::debug!(
					dataset = self.dataset.label(),
					key = %key,
					candidate = %best.candidate,
					score = best.score,
					"Candidate matched."
				);

				matched.push(self.present(doc)?);
			}
		}

		tracing::debug!(
			dataset = self.dataset.label(),
			key = %key,
			candidate_count,
			match_count = matched.len(),
			"Name screened."
		);

		Ok(matched)
	}

	fn present(&self, doc: Value) -> Result<Value> {
		if self.dataset == Dataset::Judgment {
			return Ok(doc);
		}

		match self.output {
			AdverseMediaOutput::Raw => Ok(doc),
			AdverseMediaOutput::Projected => serde_json::to_value(project_adverse_media(&doc))
				.map_err(|err| Error::MalformedDocument { message: err.to_string() }),
		}
	}
}

impl ScreenerService {
	/// Screens every name against `dataset` and returns the flattened matches in input order.
	///
	/// Fails only when `names` is absent or no store handle can be obtained.
	pub async fn search(&self, dataset: Dataset, names: Option<Vec<String>>) -> Result<Vec<Value>> {
		let Some(names) = names else {
			return Err(Error::InvalidRequest { message: MISSING_NAMES_MESSAGE.to_string() });
		};
		let store = self.connections.acquire().await?;
		let retriever = Arc::new(Retriever::new(self, dataset));
		let name_count = names.len();
		let tasks = names
			.into_iter()
			.map(|name| {
				let store = store.clone();
				let retriever = retriever.clone();
				let task_name = name.clone();
				let handle =
					tokio::spawn(async move { retriever.matches(store.as_ref(), &task_name).await });

				(name, handle)
			})
			.collect::<Vec<_>>();
		let mut data = Vec::new();

		for (name, handle) in tasks {
			match handle.await {
				Ok(Ok(found)) => data.extend(found),
				Ok(Err(err)) => {
					tracing::warn!(
						error = %err,
						dataset = dataset.label(),
						name = %name,
						"Name search failed. Treating it as no matches."
					);
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						dataset = dataset.label(),
						name = %name,
						"Name search task did not complete. Treating it as no matches."
					);
				},
			}
		}

		tracing::info!(
			dataset = dataset.label(),
			name_count,
			match_count = data.len(),
			"Batch search finished."
		);

		Ok(data)
	}
}
