//! Case-insensitive, word-order-insensitive string similarity on a 0-100 scale.
//!
//! Both sides are lower-cased and split on whitespace; tokens are sorted and re-joined with a
//! single space before comparing. The score is the normalized Indel similarity (insertions and
//! deletions only), `100 * (len_a + len_b - distance) / (len_a + len_b)` counted in characters.
//! A name contained in a longer title therefore scores `200 * len_name / (len_name + len_title)`,
//! so titles up to nine times the name's length still reach the threshold.

use rapidfuzz::distance::indel;

use crate::normalize::NormalizedKey;

/// Inclusive lower bound a candidate must reach to count as a match.
pub const SIMILARITY_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Similarity {
	pub candidate: String,
	pub score: f64,
}

pub fn score(reference: &str, candidate: &str) -> f64 {
	let left = sorted_tokens(reference);
	let right = sorted_tokens(candidate);

	// An empty side carries no name to compare against.
	if left.is_empty() || right.is_empty() {
		return 0.0;
	}

	let total = left.chars().count() + right.chars().count();
	let distance = indel::distance(left.chars(), right.chars()).min(total);

	(total - distance) as f64 * 100.0 / total as f64
}

pub fn meets_threshold(score: f64) -> bool {
	score >= SIMILARITY_THRESHOLD
}

/// Scores every candidate against `reference` and keeps those reaching the threshold, in input
/// order.
pub fn similarities<'a, I>(reference: &str, candidates: I) -> Vec<Similarity>
where
	I: IntoIterator<Item = &'a str>,
{
	candidates
		.into_iter()
		.filter_map(|candidate| {
			let score = score(reference, candidate);

			meets_threshold(score).then(|| Similarity { candidate: candidate.to_string(), score })
		})
		.collect()
}

/// True when any candidate name reaches the threshold against the key.
pub fn passes<'a, I>(key: &NormalizedKey, candidates: I) -> bool
where
	I: IntoIterator<Item = &'a str>,
{
	!similarities(key.as_str(), candidates).is_empty()
}

fn sorted_tokens(input: &str) -> String {
	let lowered = input.to_lowercase();
	let mut tokens: Vec<&str> = lowered.split_whitespace().collect();

	tokens.sort_unstable();

	tokens.join(" ")
}
