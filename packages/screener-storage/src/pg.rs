//! Postgres backend. Each collection is a table of JSONB documents; filters compile to SQL/JSON
//! path predicates evaluated in lax mode, so path steps cross arrays the same way the in-memory
//! backend does.

use std::{str::FromStr, time::Duration};

use serde_json::{Map, Value};
use sqlx::{
	PgPool, Postgres, Row,
	postgres::{PgArguments, PgConnectOptions, PgPoolOptions},
	query::Query,
};
use uuid::Uuid;

use crate::{
	Error, Result,
	pipeline::{self, Emit, Filter, Pipeline, Stage},
	schema,
	store::{BoxFuture, DocumentStore},
};

const SCHEMA_LOCK_ID: i64 = 5_318_008;

pub struct PgStore {
	pub pool: PgPool,
}
impl PgStore {
	pub async fn connect(cfg: &screener_config::Postgres) -> Result<Self> {
		let options = PgConnectOptions::from_str(&cfg.dsn)?.database(&cfg.database);
		let pool = PgPoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.acquire_timeout(Duration::from_millis(cfg.connect_timeout_ms))
			.connect_with(options)
			.await?;

		Ok(Self { pool })
	}

	/// Creates the tables backing `collections` when missing.
	pub async fn ensure_schema<'a>(
		&self,
		collections: impl IntoIterator<Item = &'a str>,
	) -> Result<()> {
		let sql = schema::render_schema(collections);
		// The advisory lock is scoped to this transaction's connection and released on commit.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}

impl DocumentStore for PgStore {
	fn ping(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			sqlx::query("SELECT 1").execute(&self.pool).await?;

			Ok(())
		})
	}

	fn aggregate<'a>(
		&'a self,
		collection: &'a str,
		pipeline: &'a Pipeline,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move {
			let (sql, binds) = compile_pipeline(collection, pipeline)?;

			fetch_docs(&self.pool, &sql, binds).await
		})
	}

	fn find<'a>(
		&'a self,
		collection: &'a str,
		filter: &'a Filter,
	) -> BoxFuture<'a, Result<Vec<Value>>> {
		Box::pin(async move {
			let mut sql = SqlBuilder::default();
			let condition = sql.condition("doc", filter)?;
			let text = format!(
				"SELECT doc FROM {} WHERE {condition} ORDER BY seq",
				schema::quote_ident(collection)
			);

			fetch_docs(&self.pool, &text, sql.binds).await
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
			let text = format!("INSERT INTO {} (doc) VALUES ($1)", schema::quote_ident(collection));

			sqlx::query(&text).bind(Value::Object(map)).execute(&self.pool).await.map_err(
				|err| {
					if err.as_database_error().is_some_and(|db_err| db_err.is_unique_violation()) {
						Error::InvalidArgument(format!("Duplicate _id {id} in {collection}."))
					} else {
						Error::Sqlx(err)
					}
				},
			)?;

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
			let mut sql = SqlBuilder::default();
			let patch = sql.push(Bind::Json(Value::Object(fields)));
			let condition = sql.condition("doc", filter)?;
			let text = format!(
				"UPDATE {} SET doc = doc || {patch}::jsonb WHERE {condition}",
				schema::quote_ident(collection)
			);
			let result = bind_all(sqlx::query(&text), sql.binds).execute(&self.pool).await?;

			Ok(result.rows_affected())
		})
	}

	fn close(&self) -> BoxFuture<'_, ()> {
		Box::pin(async move { self.pool.close().await })
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Bind {
	Text(String),
	Path(Vec<String>),
	Json(Value),
}

#[derive(Debug, Default)]
struct SqlBuilder {
	binds: Vec<Bind>,
}
impl SqlBuilder {
	fn push(&mut self, bind: Bind) -> String {
		self.binds.push(bind);

		format!("${}", self.binds.len())
	}

	/// SQL condition for `filter` evaluated against the JSONB expression `doc`.
	///
	/// Filters made only of scalar comparisons become one path predicate. Structured equality has
	/// no path form, so any branch holding one is combined in SQL instead.
	fn condition(&mut self, doc: &str, filter: &Filter) -> Result<String> {
		match filter {
			Filter::Eq { path, value } if pipeline::is_structured(value) => {
				let path = self.push(Bind::Path(path_array(path)?));
				let value = self.push(Bind::Json(value.clone()));

				return Ok(format!("({doc} #> {path}::text[]) = {value}::jsonb"));
			},
			Filter::In { path, values } if values.iter().any(pipeline::is_structured) => {
				let any = Filter::AnyOf(
					values.iter().map(|value| Filter::eq(path.clone(), value.clone())).collect(),
				);

				return self.condition(doc, &any);
			},
			Filter::AnyOf(filters) if filters.iter().any(has_structured_eq) =>
				return self.combine(doc, filters, " OR "),
			Filter::AllOf(filters) if filters.iter().any(has_structured_eq) =>
				return self.combine(doc, filters, " AND "),
			_ => {},
		}

		let mut vars = Map::new();

		match compile_filter(filter, &mut vars)? {
			Predicate::Always => Ok("TRUE".to_string()),
			Predicate::Never => Ok("FALSE".to_string()),
			Predicate::Expr(expr) => {
				let path = self.push(Bind::Text(format!("$ ? ({expr})")));
				let vars = self.push(Bind::Json(Value::Object(vars)));

				Ok(format!("jsonb_path_exists({doc}, {path}::jsonpath, {vars}::jsonb)"))
			},
		}
	}

	fn combine(&mut self, doc: &str, filters: &[Filter], op: &str) -> Result<String> {
		let mut parts = Vec::with_capacity(filters.len());

		for filter in filters {
			parts.push(self.condition(doc, filter)?);
		}

		Ok(format!("({})", parts.join(op)))
	}
}

fn has_structured_eq(filter: &Filter) -> bool {
	match filter {
		Filter::Contains { .. } => false,
		Filter::Eq { value, .. } => pipeline::is_structured(value),
		Filter::In { values, .. } => values.iter().any(pipeline::is_structured),
		Filter::AnyOf(filters) | Filter::AllOf(filters) => filters.iter().any(has_structured_eq),
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
	Always,
	Never,
	Expr(String),
}

fn compile_filter(filter: &Filter, vars: &mut Map<String, Value>) -> Result<Predicate> {
	match filter {
		Filter::Contains { path, needle } => Ok(Predicate::Expr(format!(
			"{}[*] like_regex \"{}\" flag \"iq\"",
			path_expr(path)?,
			escape_jsonpath_string(needle)
		))),
		Filter::Eq { path, value } => {
			if value.is_array() || value.is_object() {
				return Err(Error::InvalidArgument(format!(
					"Equality on {path} needs a scalar value."
				)));
			}

			let name = format!("v{}", vars.len());
			let expr = format!("{} == ${name}", path_expr(path)?);

			vars.insert(name, value.clone());

			Ok(Predicate::Expr(expr))
		},
		Filter::In { path, values } => {
			let any = Filter::AnyOf(
				values.iter().map(|value| Filter::eq(path.clone(), value.clone())).collect(),
			);

			compile_filter(&any, vars)
		},
		Filter::AnyOf(filters) => {
			let mut parts = Vec::with_capacity(filters.len());

			for filter in filters {
				match compile_filter(filter, vars)? {
					Predicate::Always => return Ok(Predicate::Always),
					Predicate::Never => {},
					Predicate::Expr(expr) => parts.push(expr),
				}
			}

			Ok(join(parts, " || ", Predicate::Never))
		},
		Filter::AllOf(filters) => {
			let mut parts = Vec::with_capacity(filters.len());

			for filter in filters {
				match compile_filter(filter, vars)? {
					Predicate::Always => {},
					Predicate::Never => return Ok(Predicate::Never),
					Predicate::Expr(expr) => parts.push(expr),
				}
			}

			Ok(join(parts, " && ", Predicate::Always))
		},
	}
}

fn join(parts: Vec<String>, op: &str, empty: Predicate) -> Predicate {
	match parts.len() {
		0 => empty,
		1 => parts.into_iter().next().map(Predicate::Expr).unwrap_or(empty),
		_ => Predicate::Expr(format!("({})", parts.join(op))),
	}
}

fn path_expr(path: &str) -> Result<String> {
	let segments = pipeline::segments(path);

	if segments.is_empty() {
		return Err(Error::InvalidArgument("Filter paths must not be empty.".to_string()));
	}

	Ok(segments.iter().fold("@".to_string(), |mut expr, segment| {
		expr.push_str(".\"");
		expr.push_str(&escape_jsonpath_string(segment));
		expr.push('"');

		expr
	}))
}

fn escape_jsonpath_string(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());

	for ch in raw.chars() {
		match ch {
			'\\' => out.push_str("\\\\"),
			'"' => out.push_str("\\\""),
			ch if ch.is_control() => out.push_str(&format!("\\u{:04x}", ch as u32)),
			ch => out.push(ch),
		}
	}

	out
}

fn path_array(path: &str) -> Result<Vec<String>> {
	let segments = pipeline::segments(path);

	if segments.is_empty() {
		return Err(Error::InvalidArgument("Stage paths must not be empty.".to_string()));
	}

	Ok(segments.into_iter().map(str::to_string).collect())
}

/// Accepts an optional leading unwind, any number of matches, and an optional trailing group.
fn compile_pipeline(collection: &str, pipeline: &Pipeline) -> Result<(String, Vec<Bind>)> {
	let mut stages = pipeline.stages.as_slice();
	let mut unwind = None;
	let mut group = None;

	if let [Stage::Unwind { path, preserve_empty }, rest @ ..] = stages {
		unwind = Some((path.as_str(), *preserve_empty));
		stages = rest;
	}
	if let [rest @ .., Stage::GroupFirst { key, emit }] = stages {
		group = Some((key.as_str(), *emit));
		stages = rest;
	}

	let mut filters = Vec::with_capacity(stages.len());

	for stage in stages {
		match stage {
			Stage::Match(filter) => filters.push(filter.clone()),
			other => {
				return Err(Error::InvalidArgument(format!(
					"Unsupported stage position for {other:?}."
				)));
			},
		}
	}

	let mut sql = SqlBuilder::default();
	let table = schema::quote_ident(collection);
	let rows = match unwind {
		Some((path, preserve_empty)) => {
			let path = sql.push(Bind::Path(path_array(path)?));
			let keep = if preserve_empty {
				String::new()
			} else {
				format!(
					"
WHERE u.elem IS NOT NULL OR jsonb_typeof(c.doc #> {path}::text[]) NOT IN ('array', 'null')"
				)
			};

			format!(
				"\
SELECT
	c.seq,
	COALESCE(u.ord, 0) AS ord,
	c.doc AS source,
	CASE
		WHEN u.elem IS NOT NULL THEN jsonb_set(c.doc, {path}::text[], u.elem)
		WHEN jsonb_typeof(c.doc #> {path}::text[]) = 'array' THEN c.doc #- {path}::text[]
		ELSE c.doc
	END AS doc
FROM {table} c
LEFT JOIN LATERAL jsonb_array_elements(
	CASE
		WHEN jsonb_typeof(c.doc #> {path}::text[]) = 'array' THEN c.doc #> {path}::text[]
		ELSE NULL
	END
) WITH ORDINALITY AS u(elem, ord) ON TRUE{keep}"
			)
		},
		None => format!("SELECT c.seq, 0::bigint AS ord, c.doc AS source, c.doc FROM {table} c"),
	};
	let condition = sql.condition("r.doc", &Filter::AllOf(filters))?;
	let text = match group {
		Some((key, emit)) => {
			let key = sql.push(Bind::Path(path_array(key)?));
			let column = match emit {
				Emit::Row => "doc",
				Emit::Source => "source",
			};

			format!(
				"\
WITH r AS ({rows})
SELECT g.{column} AS doc
FROM (
	SELECT DISTINCT ON (r.doc #> {key}::text[]) r.doc, r.source, r.seq, r.ord
	FROM r
	WHERE {condition}
	ORDER BY r.doc #> {key}::text[], r.seq, r.ord
) g
ORDER BY g.seq, g.ord"
			)
		},
		None => format!(
			"\
WITH r AS ({rows})
SELECT r.doc
FROM r
WHERE {condition}
ORDER BY r.seq, r.ord"
		),
	};

	Ok((text, sql.binds))
}

fn bind_all<'q>(
	mut query: Query<'q, Postgres, PgArguments>,
	binds: Vec<Bind>,
) -> Query<'q, Postgres, PgArguments> {
	for bind in binds {
		query = match bind {
			Bind::Text(text) => query.bind(text),
			Bind::Path(path) => query.bind(path),
			Bind::Json(value) => query.bind(value),
		};
	}

	query
}

async fn fetch_docs(pool: &PgPool, sql: &str, binds: Vec<Bind>) -> Result<Vec<Value>> {
	let rows = bind_all(sqlx::query(sql), binds).fetch_all(pool).await?;
	let mut docs = Vec::with_capacity(rows.len());

	for row in rows {
		docs.push(row.try_get("doc")?);
	}

	Ok(docs)
}
