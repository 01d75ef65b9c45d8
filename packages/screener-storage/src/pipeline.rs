//! Declarative queries understood by every [`DocumentStore`](crate::DocumentStore).
//!
//! Paths are dotted field names (`target.en.ceName`). When a path crosses an array, every element
//! is visited, so a filter holds if any reachable value satisfies it. Missing fields never match.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
	/// Case-insensitive literal substring match on a string field.
	Contains { path: String, needle: String },
	/// Scalars follow the array-crossing rule. Objects and arrays are compared whole against the
	/// field at the exact path.
	Eq { path: String, value: Value },
	In { path: String, values: Vec<Value> },
	AnyOf(Vec<Filter>),
	AllOf(Vec<Filter>),
}
impl Filter {
	pub fn contains(path: impl Into<String>, needle: impl Into<String>) -> Self {
		Self::Contains { path: path.into(), needle: needle.into() }
	}

	pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::Eq { path: path.into(), value: value.into() }
	}

	pub fn is_in(path: impl Into<String>, values: Vec<Value>) -> Self {
		Self::In { path: path.into(), values }
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
	/// Emits one row per element of the array at `path`, with the array replaced by the element.
	/// Non-array values pass through as a single row. With `preserve_empty`, documents where the
	/// field is missing, null or an empty array are kept instead of dropped.
	Unwind { path: String, preserve_empty: bool },
	Match(Filter),
	/// Keeps the first row seen for each distinct value at `key`.
	GroupFirst { key: String, emit: Emit },
}

/// What a [`Stage::GroupFirst`] yields for each group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Emit {
	/// The surviving row as it left the previous stage, with any unwound field narrowed.
	#[default]
	Row,
	/// The stored document the surviving row was derived from.
	Source,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
}
impl Pipeline {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn unwind(mut self, path: impl Into<String>, preserve_empty: bool) -> Self {
		self.stages.push(Stage::Unwind { path: path.into(), preserve_empty });

		self
	}

	pub fn matching(mut self, filter: Filter) -> Self {
		self.stages.push(Stage::Match(filter));

		self
	}

	pub fn group_first(mut self, key: impl Into<String>) -> Self {
		self.stages.push(Stage::GroupFirst { key: key.into(), emit: Emit::Row });

		self
	}

	/// Like [`Pipeline::group_first`], but yields the whole stored document of each group's first
	/// row instead of the row itself.
	pub fn group_first_source(mut self, key: impl Into<String>) -> Self {
		self.stages.push(Stage::GroupFirst { key: key.into(), emit: Emit::Source });

		self
	}
}

pub(crate) fn segments(path: &str) -> Vec<&str> {
	path.split('.').filter(|segment| !segment.is_empty()).collect()
}

/// Values reachable at `path`, crossing arrays at every step. A terminal array contributes both
/// itself and its elements.
pub(crate) fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
	let mut current = vec![doc];

	for segment in segments(path) {
		let mut next = Vec::new();

		for value in current {
			match value {
				Value::Object(map) =>
					if let Some(found) = map.get(segment) {
						next.push(found);
					},
				Value::Array(items) =>
					for item in items {
						if let Some(found) = item.as_object().and_then(|map| map.get(segment)) {
							next.push(found);
						}
					},
				_ => {},
			}
		}

		current = next;
	}

	let mut out = Vec::with_capacity(current.len());

	for value in current {
		out.push(value);

		if let Value::Array(items) = value {
			out.extend(items.iter());
		}
	}

	out
}

pub(crate) fn is_structured(value: &Value) -> bool {
	value.is_object() || value.is_array()
}

/// Field at the exact `path`, without crossing arrays.
pub(crate) fn field_at<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
	segments(path).into_iter().try_fold(doc, |value, segment| value.get(segment))
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn values_cross_arrays() {
		let doc = json!({
			"target": { "en": [{ "ceName": "A" }, { "ceName": "B" }, { "other": 1 }] }
		});
		let found = values_at(&doc, "target.en.ceName");

		assert_eq!(found, vec![&json!("A"), &json!("B")]);
	}

	#[test]
	fn terminal_arrays_expose_elements() {
		let doc = json!({ "tags": ["x", "y"] });

		assert_eq!(values_at(&doc, "tags").len(), 3);
	}

	#[test]
	fn missing_paths_are_empty() {
		assert!(values_at(&json!({ "a": 1 }), "a.b.c").is_empty());
		assert_eq!(field_at(&json!({ "a": { "b": 2 } }), "a.b"), Some(&json!(2)));
	}

	#[test]
	fn builder_keeps_stage_order() {
		let pipeline = Pipeline::new()
			.unwind("target", true)
			.matching(Filter::contains("target.name_en", "wong"))
			.group_first("_id");

		assert!(matches!(pipeline.stages[0], Stage::Unwind { .. }));
		assert!(matches!(pipeline.stages[1], Stage::Match(_)));
		assert!(matches!(pipeline.stages[2], Stage::GroupFirst { emit: Emit::Row, .. }));
	}
}
