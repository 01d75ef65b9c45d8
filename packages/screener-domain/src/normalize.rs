use std::fmt;

/// Canonical search key: the lower-cased, trimmed form of a user supplied name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedKey(String);
impl NormalizedKey {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn into_string(self) -> String {
		self.0
	}
}
impl fmt::Display for NormalizedKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}
impl AsRef<str> for NormalizedKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

pub fn normalize(raw: &str) -> NormalizedKey {
	NormalizedKey(raw.to_lowercase().trim().to_string())
}

#[cfg(test)]
mod tests {
	use super::normalize;

	#[test]
	fn lowercases_and_trims() {
		assert_eq!(normalize("  John SMITH \t").as_str(), "john smith");
	}

	#[test]
	fn keeps_inner_whitespace() {
		assert_eq!(normalize("Chan  Tai Man").as_str(), "chan  tai man");
	}

	#[test]
	fn whitespace_only_is_empty() {
		assert!(normalize(" \n\t ").is_empty());
		assert!(normalize("").is_empty());
	}

	#[test]
	fn is_idempotent() {
		for raw in ["", "  ", "John Smith", " ÉLODIE Dupont ", "陳大文", "\u{3000}Wong\u{3000}", "İstanbul"] {
			let once = normalize(raw);
			let twice = normalize(once.as_str());

			assert_eq!(once, twice, "normalize is not idempotent for {raw:?}");
		}
	}
}
