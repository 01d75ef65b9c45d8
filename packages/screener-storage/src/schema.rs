/// DDL for one collection table. Rows keep their insertion order in `seq`; the document key lives
/// inside `doc` and is kept unique through an expression index.
pub fn render_collection(table: &str) -> String {
	let quoted = quote_ident(table);
	let index = quote_ident(&format!("{table}_id_key"));

	format!(
		"\
CREATE TABLE IF NOT EXISTS {quoted} (
	seq BIGSERIAL PRIMARY KEY,
	doc JSONB NOT NULL CHECK (jsonb_typeof(doc) = 'object' AND doc ? '_id')
);
CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {quoted} ((doc -> '_id'))"
	)
}

pub fn render_schema<'a>(tables: impl IntoIterator<Item = &'a str>) -> String {
	tables.into_iter().map(render_collection).collect::<Vec<_>>().join(";\n")
}

pub(crate) fn quote_ident(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
	#[test]
	fn renders_one_table_and_index_per_collection() {
		let sql = super::render_schema(["judgment", "adverse_media"]);

		assert_eq!(sql.matches("CREATE TABLE IF NOT EXISTS").count(), 2);
		assert!(sql.contains("\"adverse_media_id_key\" ON \"adverse_media\""));
		assert_eq!(sql.split(';').filter(|part| !part.trim().is_empty()).count(), 4);
	}

	#[test]
	fn quotes_embedded_quotes() {
		assert_eq!(super::quote_ident("a\"b"), "\"a\"\"b\"");
	}
}
