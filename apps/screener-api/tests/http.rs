use std::sync::Arc;

use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use screener_api::{routes, state::AppState};
use screener_config::{Collections, Config, Postgres, Search, Service, Storage};
use screener_storage::{FixedConnector, MemoryStore};

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://unused:5432".to_string(),
				database: "screening".to_string(),
				pool_max_conns: 1,
				connect_timeout_ms: 1_000,
				query_timeout_ms: 1_000,
				ensure_schema: false,
			},
			collections: Collections::default(),
		},
		search: Search::default(),
	}
}

fn test_state() -> AppState {
	let collections = Collections::default();
	let store = MemoryStore::new()
		.with_documents(
			&collections.judgment,
			[
				json!({ "_id": "j-1", "title": "HKSAR v John Smith" }),
				json!({ "_id": "j-2", "title": "Re Jane Doe (Deceased)" }),
			],
		)
		.with_documents(
			&collections.adverse_media,
			[json!({
				"_id": "am-1",
				"target": [{ "name_en": "Wong Siu Ming" }],
				"source": { "title": "Daily Herald" },
				"published": "2024-03-01",
				"headline": { "en": "Director charged" }
			})],
		);

	AppState::with_connector(test_config(), Arc::new(FixedConnector::memory(store)))
}

fn post(uri: &str, body: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.expect("Failed to build request.")
}

async fn read_json(response: axum::response::Response) -> Value {
	let bytes = body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");

	serde_json::from_slice(&bytes).expect("Body is not JSON.")
}

#[tokio::test]
async fn health_ok() {
	let app = routes::router(test_state());
	let response = app
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn judgment_search_returns_matches() {
	let app = routes::router(test_state());
	let response = app
		.oneshot(post("/v1/judgments/search", r#"{"nameToSearchArr":["John Smith"]}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = read_json(response).await;

	assert_eq!(body["status"], json!(200));
	assert_eq!(body["message"], json!("Success"));
	assert_eq!(body["data"], json!([{ "_id": "j-1", "title": "HKSAR v John Smith" }]));
}

#[tokio::test]
async fn adverse_media_search_returns_projected_documents() {
	let app = routes::router(test_state());
	let response = app
		.oneshot(post("/v1/adverse-media/search", r#"{"nameToSearchArr":["wong siu"]}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::OK);

	let body = read_json(response).await;
	let data = body["data"].as_array().expect("data");

	assert_eq!(data.len(), 1);
	assert_eq!(data[0]["_id"], json!("am-1"));
}

#[tokio::test]
async fn missing_names_are_rejected() {
	for payload in ["{}", "not json", r#"{"nameToSearchArr":"John"}"#] {
		let app = routes::router(test_state());
		let response = app
			.oneshot(post("/v1/judgments/search", payload))
			.await
			.expect("Failed to call search.");

		assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
		assert_eq!(
			read_json(response).await,
			json!({ "message": "Missing required fields or invalid format: nameToSearchArr" })
		);
	}
}

#[tokio::test]
async fn event_route_returns_the_envelope() {
	let app = routes::router(test_state());
	let response = app
		.oneshot(post("/v1/events/judgments", r#"{"nameToSearchArr":["jane doe"]}"#))
		.await
		.expect("Failed to call event route.");

	assert_eq!(response.status(), StatusCode::OK);

	let envelope = read_json(response).await;

	assert_eq!(envelope["statusCode"], json!(200));

	let body: Value =
		serde_json::from_str(envelope["body"].as_str().expect("body string")).expect("body json");

	assert_eq!(body["data"][0]["_id"], json!("j-2"));
}

#[tokio::test]
async fn event_route_rejects_unknown_datasets() {
	let app = routes::router(test_state());
	let response = app
		.oneshot(post("/v1/events/sanctions", r#"{"nameToSearchArr":[]}"#))
		.await
		.expect("Failed to call event route.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(read_json(response).await["error_code"], json!("unknown_dataset"));
}
