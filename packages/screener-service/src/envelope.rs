//! Event-style invocation: `{"nameToSearchArr": [...]}` in, `{statusCode, body}` out, where
//! `body` is a JSON document encoded as a string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Dataset, Error, ScreenerService};

pub const MISSING_NAMES_MESSAGE: &str =
	"Missing required fields or invalid format: nameToSearchArr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
	pub status_code: u16,
	pub body: String,
}
impl Envelope {
	pub fn success(data: &[Value]) -> Self {
		Self::encode(200, &SuccessBody { status: 200, message: "Success", data })
	}

	pub fn bad_request() -> Self {
		Self::encode(400, &MessageBody { message: MISSING_NAMES_MESSAGE })
	}

	pub fn failure(dataset: Dataset, err: &Error) -> Self {
		let message = format!("{} search failed", dataset.label());

		Self::encode(500, &FailureBody { message: &message, error: err.to_string() })
	}

	/// Parses `body` back into JSON.
	pub fn body_json(&self) -> serde_json::Result<Value> {
		serde_json::from_str(&self.body)
	}

	fn encode<T>(status_code: u16, body: &T) -> Self
	where
		T: Serialize,
	{
		match serde_json::to_string(body) {
			Ok(body) => Self { status_code, body },
			Err(err) => Self {
				status_code: 500,
				body: serde_json::json!({
					"message": "Failed to encode response body",
					"error": err.to_string(),
				})
				.to_string(),
			},
		}
	}
}

#[derive(Serialize)]
struct SuccessBody<'a> {
	status: u16,
	message: &'a str,
	data: &'a [Value],
}

#[derive(Serialize)]
struct MessageBody<'a> {
	message: &'a str,
}

#[derive(Serialize)]
struct FailureBody<'a> {
	message: &'a str,
	error: String,
}

/// Names carried by an event. `None` when the field is missing, is not a list, or holds anything
/// other than strings.
pub fn parse_names(event: &Value) -> Option<Vec<String>> {
	event
		.get("nameToSearchArr")?
		.as_array()?
		.iter()
		.map(|name| name.as_str().map(str::to_string))
		.collect()
}

impl ScreenerService {
	/// Screens the names of one event against `dataset`.
	pub async fn handle_event(&self, dataset: Dataset, event: &Value) -> Envelope {
		let Some(names) = parse_names(event) else {
			return Envelope::bad_request();
		};

		match self.search(dataset, Some(names)).await {
			Ok(data) => Envelope::success(&data),
			Err(Error::InvalidRequest { .. }) => Envelope::bad_request(),
			Err(err) => {
				tracing::error!(error = %err, dataset = dataset.label(), "Batch search failed.");

				Envelope::failure(dataset, &err)
			},
		}
	}
}
