//! Candidate names held by an adverse-media document's `target`.
//!
//! Two shapes exist on disk:
//!
//! - flat: `{ "name_en": "...", "name_zh": "..." }`
//! - structured: `{ "en": [{ "ceName": "..." }], "zh": [{ "ceName": "..." }] }`
//!
//! A retrieved candidate carries its matching target as an object. A raw document may still carry
//! the full `target` list, in which case the first-listed entry is inspected.

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Which language fields contribute candidate names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameScope {
	/// Only `name_en` and `en[].ceName`.
	#[default]
	English,
	/// Also `name_zh` and `zh[].ceName`.
	EnglishAndChinese,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetNames {
	Flat { names: Vec<String> },
	Structured { names: Vec<String> },
}
impl TargetNames {
	/// Resolves the schema variant of `doc.target`. The flat variant wins when present; the two
	/// are never merged. `Ok(None)` means the document has no name to score.
	pub fn resolve(doc: &Value, scope: NameScope) -> Result<Option<Self>> {
		let Some(target) = primary_target(doc) else {
			return Ok(None);
		};
		let mut flat = Vec::new();

		if let Some(name) = non_empty_string(target, "name_en")? {
			flat.push(name);
		}
		if scope == NameScope::EnglishAndChinese
			&& let Some(name) = non_empty_string(target, "name_zh")?
		{
			flat.push(name);
		}

		if !flat.is_empty() {
			return Ok(Some(Self::Flat { names: flat }));
		}

		let mut lists = vec!["en"];

		if scope == NameScope::EnglishAndChinese {
			lists.push("zh");
		}

		let mut structured = None;

		for field in lists {
			if let Some(names) = ce_names(target, field)? {
				structured.get_or_insert_with(Vec::new).extend(names);
			}
		}

		Ok(structured.map(|names| Self::Structured { names }))
	}

	pub fn names(&self) -> &[String] {
		match self {
			Self::Flat { names } | Self::Structured { names } => names,
		}
	}

	pub fn into_names(self) -> Vec<String> {
		match self {
			Self::Flat { names } | Self::Structured { names } => names,
		}
	}
}

/// Candidate names for `doc`, empty when no variant applies.
pub fn extract_candidate_names(doc: &Value, scope: NameScope) -> Result<Vec<String>> {
	Ok(TargetNames::resolve(doc, scope)?.map(TargetNames::into_names).unwrap_or_default())
}

fn primary_target(doc: &Value) -> Option<&Map<String, Value>> {
	match doc.get("target")? {
		Value::Object(target) => Some(target),
		Value::Array(targets) => targets.first()?.as_object(),
		_ => None,
	}
}

fn non_empty_string(target: &Map<String, Value>, field: &str) -> Result<Option<String>> {
	match target.get(field) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(name)) if name.is_empty() => Ok(None),
		Some(Value::String(name)) => Ok(Some(name.clone())),
		Some(other) => Err(Error::malformed(
			format!("target.{field}"),
			format!("expected a string, found {}", type_name(other)),
		)),
	}
}

fn ce_names(target: &Map<String, Value>, field: &str) -> Result<Option<Vec<String>>> {
	let entries = match target.get(field) {
		None | Some(Value::Null) => return Ok(None),
		Some(Value::Array(entries)) => entries,
		Some(other) => {
			return Err(Error::malformed(
				format!("target.{field}"),
				format!("expected a list, found {}", type_name(other)),
			));
		},
	};
	let mut names = Vec::with_capacity(entries.len());

	for (index, entry) in entries.iter().enumerate() {
		match entry.get("ceName") {
			Some(Value::String(name)) => names.push(name.clone()),
			Some(other) => {
				return Err(Error::malformed(
					format!("target.{field}[{index}].ceName"),
					format!("expected a string, found {}", type_name(other)),
				));
			},
			None => {
				return Err(Error::malformed(
					format!("target.{field}[{index}].ceName"),
					"field is missing",
				));
			},
		}
	}

	Ok(Some(names))
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "a list",
		Value::Object(_) => "an object",
	}
}
