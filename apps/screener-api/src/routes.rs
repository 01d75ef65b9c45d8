use axum::{
	Json, Router,
	body::Bytes,
	extract::{Path, State},
	http::{StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use screener_service::{Dataset, Envelope};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/adverse-media/search", post(search_adverse_media))
		.route("/v1/judgments/search", post(search_judgments))
		.route("/v1/events/{dataset}", post(handle_event))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search_adverse_media(State(state): State<AppState>, body: Bytes) -> Response {
	search(&state, Dataset::AdverseMedia, &body).await
}

async fn search_judgments(State(state): State<AppState>, body: Bytes) -> Response {
	search(&state, Dataset::Judgment, &body).await
}

/// Unwraps the envelope onto HTTP: its status code becomes the response status and its body the
/// response body.
async fn search(state: &AppState, dataset: Dataset, body: &[u8]) -> Response {
	let envelope = state.service.handle_event(dataset, &parse_event(body)).await;
	let status = StatusCode::from_u16(envelope.status_code)
		.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

	(status, [(header::CONTENT_TYPE, "application/json")], envelope.body).into_response()
}

/// Returns the envelope itself, for callers that speak the event protocol.
async fn handle_event(
	State(state): State<AppState>,
	Path(dataset): Path<String>,
	body: Bytes,
) -> Result<Json<Envelope>, ApiError> {
	let dataset = Dataset::from_slug(&dataset).ok_or_else(|| {
		ApiError::new(StatusCode::NOT_FOUND, "unknown_dataset", format!("Unknown dataset {dataset:?}."))
	})?;
	let envelope = state.service.handle_event(dataset, &parse_event(&body)).await;

	Ok(Json(envelope))
}

/// A body that is not JSON is treated like an event without names.
fn parse_event(body: &[u8]) -> Value {
	serde_json::from_slice(body).unwrap_or(Value::Null)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
