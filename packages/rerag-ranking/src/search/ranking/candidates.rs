use std::collections::HashSet;

use tracing::warn;

use crate::{
	options::{PipelineOptions, SearchMode},
	retrieval::CandidateHit,
	search::{
		ScoredChunk,
		ranking::score::{self, KeywordScore},
	},
	stats::Warning,
	trace::{DropReason, Dropped},
};
use rerag_domain::{ChunkCollection, ChunkEntry, QueryTerms};

/// Scored candidates in retrieval order, before any filter runs.
#[derive(Debug, Default)]
pub struct CandidateSet {
	pub items: Vec<ScoredChunk>,
	pub dropped: Vec<Dropped>,
	pub warnings: Vec<Warning>,
}

/// Turns retrieval hits into scored candidates according to the search mode.
///
/// Keyword mode scores the whole collection locally. Hybrid mode appends keyword-only matches the
/// vector search missed, with a vector score of zero.
pub fn build_candidates(
	hits: &[CandidateHit],
	collection: &ChunkCollection,
	query: &QueryTerms,
	options: &PipelineOptions,
) -> CandidateSet {
	let mut out = CandidateSet::default();
	let mut seen = HashSet::new();

	if options.search_mode.uses_vectors() {
		for hit in hits {
			let Some(entry) = collection.get(&hit.hash) else {
				warn!(hash = %hit.hash, "Retrieval returned a hash outside the collection.");

				out.warnings.push(Warning::UnknownHash { hash: hit.hash.clone() });

				continue;
			};

			if !seen.insert(entry.chunk.hash.as_str()) || entry.chunk.disabled {
				continue;
			}

			let keyword = score::keyword_score(entry, query);

			push_candidate(&mut out, collection, entry, hit.score, keyword, options);
		}
	}
	if options.search_mode == SearchMode::Vector {
		return out;
	}

	let mut keyword_only = Vec::new();

	for entry in collection.entries() {
		if entry.chunk.disabled || seen.contains(entry.chunk.hash.as_str()) {
			continue;
		}

		let keyword = score::keyword_score(entry, query);

		if keyword.score > 0.0 {
			keyword_only.push((entry, keyword));
		}
	}

	if options.search_mode == SearchMode::Keyword {
		keyword_only.sort_by(|a, b| score::cmp_f32_desc(a.1.score, b.1.score));
		keyword_only.truncate(options.candidate_k as usize);
	}

	for (entry, keyword) in keyword_only {
		push_candidate(&mut out, collection, entry, 0.0, keyword, options);
	}

	out
}

fn push_candidate(
	out: &mut CandidateSet,
	collection: &ChunkCollection,
	entry: &ChunkEntry,
	vector_score: f32,
	keyword: KeywordScore,
	options: &PipelineOptions,
) {
	let (combined, keyword_boost) = match options.search_mode {
		SearchMode::Vector => (vector_score, 0.0),
		SearchMode::Keyword => (keyword.score, keyword.score),
		SearchMode::Hybrid => (
			score::combine(vector_score, keyword.score, options.weights()),
			keyword.score * options.keyword_weight,
		),
	};
	let mut item = ScoredChunk::new(entry.chunk.clone(), combined);

	item.vector_score = vector_score;
	item.keyword_score = keyword.score;
	item.keyword_boost = keyword_boost;
	item.matched_keywords = keyword.matched;

	if collection.is_orphaned_summary(entry) {
		warn!(
			hash = %entry.chunk.hash,
			parent_hash = ?entry.chunk.parent_hash,
			"Summary chunk has no live parent. Excluding it."
		);

		out.warnings.push(Warning::OrphanedSummary {
			hash: entry.chunk.hash.clone(),
			parent_hash: entry.chunk.parent_hash.clone(),
		});
		out.dropped.push(Dropped::new(&item, DropReason::OrphanedSummary));

		return;
	}

	out.items.push(item);
}
