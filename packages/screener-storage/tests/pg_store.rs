use serde_json::{Map, Value, json};

use screener_storage::{DocumentStore, Filter, PgStore, Pipeline};
use screener_testkit::TestDatabase;

const MEDIA: &str = "adverse_media";
const CHANGELOGS: &str = "sourcedata_changelogs";

async fn seeded_store(db: &TestDatabase) -> PgStore {
	let store = PgStore::connect(&db.postgres_config()).await.expect("Failed to connect to Postgres.");

	store.ensure_schema([MEDIA, CHANGELOGS]).await.expect("Failed to ensure schema.");

	for doc in [
		json!({
			"_id": "a",
			"target": [{ "name_en": "Wong Siu Ming" }, { "name_en": "Wong Tai Sin" }]
		}),
		json!({ "_id": "b", "target": { "en": [{ "ceName": "Lee Ka Shing" }] } }),
		json!({ "_id": "c" }),
		json!({ "_id": "d", "target": [] }),
	] {
		store.insert(MEDIA, doc).await.expect("Failed to insert document.");
	}

	store
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCREENER_PG_DSN to run."]
async fn aggregate_unwinds_and_groups_like_memory() {
	let Some(base_dsn) = screener_testkit::env_dsn() else {
		eprintln!("Skipping aggregate_unwinds_and_groups_like_memory; set SCREENER_PG_DSN to run this test.");

		return;
	};
	let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = seeded_store(&db).await;
	let narrowed = Pipeline::new()
		.unwind("target", true)
		.matching(Filter::contains("target.name_en", "WONG"))
		.group_first("_id");
	let rows = store.aggregate(MEDIA, &narrowed).await.expect("Failed to aggregate.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0]["target"], json!({ "name_en": "Wong Siu Ming" }));

	let whole = Pipeline::new()
		.unwind("target", true)
		.matching(Filter::AnyOf(vec![
			Filter::contains("target.name_en", "tai sin"),
			Filter::contains("target.en.ceName", "ka sh"),
		]))
		.group_first_source("_id");
	let rows = store.aggregate(MEDIA, &whole).await.expect("Failed to aggregate.");
	let ids = rows.iter().map(|row| row["_id"].clone()).collect::<Vec<_>>();

	assert_eq!(ids, vec![json!("a"), json!("b")]);
	assert_eq!(rows[0]["target"].as_array().map(Vec::len), Some(2));

	let preserved = store
		.aggregate(MEDIA, &Pipeline::new().unwind("target", true))
		.await
		.expect("Failed to aggregate.");
	let dropped = store
		.aggregate(MEDIA, &Pipeline::new().unwind("target", false))
		.await
		.expect("Failed to aggregate.");

	assert_eq!(preserved.len(), 5);
	assert_eq!(dropped.len(), 3);

	store.close().await;
	db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCREENER_PG_DSN to run."]
async fn substring_needles_are_literal() {
	let Some(base_dsn) = screener_testkit::env_dsn() else {
		eprintln!("Skipping substring_needles_are_literal; set SCREENER_PG_DSN to run this test.");

		return;
	};
	let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = seeded_store(&db).await;

	store
		.insert(MEDIA, json!({ "_id": "e", "target": { "name_en": "A.B. (Holdings) \"Ltd\"" } }))
		.await
		.expect("Failed to insert document.");

	let hits = store
		.find(MEDIA, &Filter::contains("target.name_en", "(holdings) \"l"))
		.await
		.expect("Failed to find.");
	let misses = store.find(MEDIA, &Filter::contains("target.name_en", "w.ng")).await.expect("Failed to find.");

	assert_eq!(hits.len(), 1);
	assert!(misses.is_empty());

	store.close().await;
	db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCREENER_PG_DSN to run."]
async fn set_fields_and_duplicate_ids() {
	let Some(base_dsn) = screener_testkit::env_dsn() else {
		eprintln!("Skipping set_fields_and_duplicate_ids; set SCREENER_PG_DSN to run this test.");

		return;
	};
	let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = seeded_store(&db).await;

	for (id, status) in [(1, "pending"), (2, "pending"), (3, "completed")] {
		store
			.insert(CHANGELOGS, json!({ "_id": id, "status": status }))
			.await
			.expect("Failed to insert changelog.");
	}

	assert!(store.insert(CHANGELOGS, json!({ "_id": 1 })).await.is_err());

	let filter = Filter::AllOf(vec![
		Filter::is_in("_id", vec![json!(1), json!(3)]),
		Filter::eq("status", "pending"),
	]);
	let mut fields = Map::new();

	fields.insert("status".to_string(), Value::from("completed"));

	let updated = store.set_fields(CHANGELOGS, &filter, fields).await.expect("Failed to update.");

	assert_eq!(updated, 1);

	let pending =
		store.find(CHANGELOGS, &Filter::eq("status", "pending")).await.expect("Failed to find.");

	assert_eq!(pending.len(), 1);
	assert_eq!(pending[0]["_id"], json!(2));

	store.close().await;
	db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set SCREENER_PG_DSN to run."]
async fn structured_equality_matches_whole_documents() {
	let Some(base_dsn) = screener_testkit::env_dsn() else {
		eprintln!(
			"Skipping structured_equality_matches_whole_documents; set SCREENER_PG_DSN to run this test."
		);

		return;
	};
	let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = seeded_store(&db).await;

	for doc in [
		json!({ "_id": 1, "original_data_id": "j-1", "status": "pending" }),
		json!({ "_id": 2, "new_data": { "title": "A", "year": 2024 }, "status": "pending" }),
		json!({ "_id": 3, "new_data": { "title": "A", "year": 2024, "extra": true } }),
	] {
		store.insert(CHANGELOGS, doc).await.expect("Failed to insert changelog.");
	}

	let filter = Filter::AllOf(vec![
		Filter::AnyOf(vec![
			Filter::is_in("original_data_id", vec![json!("j-1")]),
			Filter::eq("new_data", json!({ "year": 2024, "title": "A" })),
		]),
		Filter::eq("status", "pending"),
	]);
	let rows = store.find(CHANGELOGS, &filter).await.expect("Failed to find.");
	let ids = rows.iter().map(|row| row["_id"].clone()).collect::<Vec<_>>();

	assert_eq!(ids, vec![json!(1), json!(2)]);

	store.close().await;
	db.cleanup().await.expect("Failed to cleanup test database.");
}
