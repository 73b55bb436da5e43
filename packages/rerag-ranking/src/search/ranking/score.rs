use std::cmp::Ordering;

use crate::search::ScoredChunk;
use rerag_domain::{ChunkEntry, QueryTerms};

/// Upper bound for a keyword score so keyword spam cannot outrank vector relevance.
pub const KEYWORD_SCORE_CEILING: f32 = 1.0;
/// Share of `(weight - 1)` a weighted keyword adds on top of the base keyword score.
pub const KEYWORD_WEIGHT_BONUS_SCALE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
	pub vector_weight: f32,
	pub keyword_weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordScore {
	pub score: f32,
	/// Chunk keywords as written that matched the query.
	pub matched: Vec<String>,
}

pub fn combine(vector_score: f32, keyword_score: f32, weights: ScoreWeights) -> f32 {
	vector_score * weights.vector_weight + keyword_score * weights.keyword_weight
}

/// Returns 0.0 for empty, zero-norm, or mismatched vectors.
///
/// Accumulates in `f64` so tiny and very large components keep `cos(v, v) == 1`.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> f32 {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return 0.0;
	}

	let mut dot = 0.0_f64;
	let mut lhs_norm = 0.0_f64;
	let mut rhs_norm = 0.0_f64;

	for (&l, &r) in lhs.iter().zip(rhs.iter()) {
		let (l, r) = (f64::from(l), f64::from(r));

		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm == 0.0 || rhs_norm == 0.0 {
		return 0.0;
	}

	let cosine = dot / (lhs_norm.sqrt() * rhs_norm.sqrt());

	if !cosine.is_finite() {
		return 0.0;
	}

	cosine.clamp(-1.0, 1.0) as f32
}

/// `base = 1 - 0.5^matched` plus a bonus for every matched keyword with a custom weight.
pub fn keyword_score(entry: &ChunkEntry, query: &QueryTerms) -> KeywordScore {
	let mut matched = Vec::new();
	let mut bonus = 0.0_f32;

	for keyword in &entry.keywords {
		if !keyword.matcher.matches(query) {
			continue;
		}
		if let Some(weight) = keyword.weight {
			bonus += KEYWORD_WEIGHT_BONUS_SCALE * (weight - 1.0);
		}

		matched.push(keyword.source.clone());
	}

	if matched.is_empty() {
		return KeywordScore::default();
	}

	let base = 1.0 - 0.5_f32.powi(matched.len() as i32);
	let score = (base + bonus).clamp(0.0, KEYWORD_SCORE_CEILING);

	KeywordScore { score, matched }
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Stable descending sort: equal scores keep their candidate order.
pub fn rerank(items: &mut [ScoredChunk]) {
	items.sort_by(|a, b| cmp_f32_desc(a.score, b.score));
}
