use serde::Serialize;
use serde_json::Value;

/// Display shape of a matched adverse-media report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdverseMediaSummary {
	#[serde(rename = "_id")]
	pub id: Value,
	pub title: Option<String>,
	pub link: Option<String>,
	pub subtitle: Option<String>,
	pub description: Option<String>,
}

/// Projects a matched adverse-media document. Missing or empty fields become `None`.
pub fn project_adverse_media(doc: &Value) -> AdverseMediaSummary {
	let text = |pointer: &str| doc.pointer(pointer).and_then(Value::as_str).map(str::to_string);
	let source_title = text("/source/title");
	let published = doc.get("published").and_then(display_value);
	let subtitle = match (source_title, published) {
		(Some(title), Some(published)) => Some(format!("{title} - {published}")),
		(Some(title), None) => Some(title),
		(None, published) => published,
	};

	AdverseMediaSummary {
		id: doc.get("_id").cloned().unwrap_or(Value::Null),
		title: text("/headline/en"),
		link: doc.pointer("/urls/0").and_then(display_value),
		subtitle,
		description: text("/content/en"),
	}
}

/// Text for a display field. Falsy values (null, false, zero, empty strings and containers)
/// show nothing.
fn display_value(value: &Value) -> Option<String> {
	match value {
		Value::Null | Value::Bool(false) => None,
		Value::Number(number) if number.as_f64() == Some(0.0) => None,
		Value::String(text) if text.is_empty() => None,
		Value::Array(items) if items.is_empty() => None,
		Value::Object(map) if map.is_empty() => None,
		Value::String(text) => Some(text.clone()),
		other => Some(other.to_string()),
	}
}
