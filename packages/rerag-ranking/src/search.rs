pub mod ranking;

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
	CandidateSource, Error, Result,
	options::{PipelineOptions, hash_options_snapshot},
	retrieval::Retrieval,
	stats::{EmptyReason, SearchStats},
	trace::{Dropped, Stage, Trace, TraceBuilder},
};
use rerag_domain::{Chunk, ChunkCollection, QueryTerms, SearchContext};

/// Why a chunk is in the result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inclusion {
	/// Earned its place through retrieval and ranking.
	Ranked,
	GroupMember {
		group: String,
	},
	SummaryParent {
		summary: String,
	},
	ForceLink {
		source: String,
	},
	SoftLink {
		source: String,
	},
}

/// A pipeline-local copy of a chunk with its score provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
	pub chunk: Chunk,
	pub score: f32,
	/// Combined relevance before any booster ran.
	pub original_score: f32,
	pub vector_score: f32,
	pub keyword_score: f32,
	pub keyword_boost: f32,
	pub importance_multiplier: f32,
	pub group_multiplier: f32,
	pub decay_applied: bool,
	pub decay_multiplier: f32,
	pub matched_keywords: Vec<String>,
	pub inclusion: Inclusion,
}
impl ScoredChunk {
	pub fn new(chunk: Chunk, score: f32) -> Self {
		Self {
			chunk,
			score,
			original_score: score,
			vector_score: 0.0,
			keyword_score: 0.0,
			keyword_boost: 0.0,
			importance_multiplier: 1.0,
			group_multiplier: 1.0,
			decay_applied: false,
			decay_multiplier: 1.0,
			matched_keywords: Vec::new(),
			inclusion: Inclusion::Ranked,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub results: Vec<ScoredChunk>,
	pub stats: SearchStats,
	pub trace: Trace,
}

/// Runs the full ranking pipeline for one query.
///
/// Only invalid options are returned as `Err`. Retrieval failures and empty outcomes come back as
/// an empty result list with the reason recorded in the stats.
pub async fn search(
	query: &str,
	collection: &ChunkCollection,
	options: &PipelineOptions,
	ctx: &SearchContext,
	source: &dyn CandidateSource,
) -> Result<SearchResponse> {
	options.validate()?;

	let snapshot = options.snapshot()?;
	let options_hash = hash_options_snapshot(&snapshot)?;
	let mut trace = TraceBuilder::new(query, snapshot, options_hash);
	let mut stats = SearchStats::default();
	let terms = QueryTerms::new(query);
	let context_window = options.context_window as usize;
	let hits = if options.search_mode.uses_vectors() {
		match retrieve(query, collection, options, source).await {
			Ok(retrieval) => {
				stats.extend_warnings(retrieval.warnings);

				retrieval.hits
			},
			Err(err) => {
				warn!(
					error = %err,
					collection = collection.id(),
					"Candidate retrieval failed. Returning no results."
				);

				stats.retrieval_failure = Some(err.to_string());

				return Ok(finish(
					collection,
					Vec::new(),
					stats,
					trace,
					Some(EmptyReason::RetrievalFailed),
				));
			},
		}
	} else {
		Vec::new()
	};
	let candidates = ranking::build_candidates(&hits, collection, &terms, options);

	stats.extend_warnings(candidates.warnings);
	stats.retrieved = candidates.items.len() as u32;

	record_stage(&mut trace, Stage::Retrieval, &candidates.items, &candidates.dropped);

	if candidates.items.is_empty() {
		return Ok(finish(collection, Vec::new(), stats, trace, Some(EmptyReason::NoCandidates)));
	}

	let pool: HashMap<String, ScoredChunk> = candidates
		.items
		.iter()
		.map(|item| (item.chunk.hash.clone(), item.clone()))
		.collect();
	let threshold = ranking::apply_threshold(candidates.items, options.threshold);

	stats.below_threshold = threshold.dropped.len() as u32;

	record_stage(&mut trace, Stage::Threshold, &threshold.kept, &threshold.dropped);

	if threshold.kept.is_empty() {
		return Ok(finish(
			collection,
			Vec::new(),
			stats,
			trace,
			Some(EmptyReason::AllBelowThreshold),
		));
	}

	let mut items = threshold.kept;

	if options.apply_conditions {
		let outcome = ranking::apply_conditions(items, collection, ctx, context_window);

		stats.failed_conditions = outcome.dropped.len() as u32;
		stats.extend_warnings(outcome.warnings);

		record_stage(&mut trace, Stage::Conditions, &outcome.kept, &outcome.dropped);

		if outcome.kept.is_empty() {
			return Ok(finish(
				collection,
				Vec::new(),
				stats,
				trace,
				Some(EmptyReason::AllFailedConditions),
			));
		}

		items = outcome.kept;
	}
	if options.apply_groups {
		let triggered = ranking::triggered_groups(collection, &terms);

		stats.group_boosted =
			ranking::apply_group_boost(&mut items, &triggered, options.group_boost_multiplier);

		record_stage(&mut trace, Stage::GroupBoost, &items, &[]);
	}
	if options.apply_importance {
		ranking::apply_importance(&mut items);
		record_stage(&mut trace, Stage::Importance, &items, &[]);
	}
	if options.decay_active() {
		stats.decay_applied = ranking::apply_decay(&mut items, ctx, &options.decay);

		record_stage(&mut trace, Stage::Decay, &items, &[]);
	}

	ranking::rerank(&mut items);
	record_stage(&mut trace, Stage::Rerank, &items, &[]);

	if options.apply_groups && options.max_forced_group_members > 0 {
		let (enforced, forced) = ranking::enforce_required_groups(
			items,
			collection,
			&pool,
			options.max_forced_group_members,
		);

		stats.forced_group_members = forced;
		items = enforced;

		record_stage(&mut trace, Stage::GroupEnforcement, &items, &[]);
	}

	let links = ranking::resolve_links(items, collection, &pool, options.summary_mode);

	stats.parents_inserted = links.parents_inserted;
	stats.links_inserted = links.links_inserted;
	stats.extend_warnings(links.warnings);

	record_stage(&mut trace, Stage::LinkResolution, &links.items, &links.dropped);

	let selection = ranking::select_top_k(
		links.items,
		ctx,
		options.top_k as usize,
		context_window,
		options.dedupe_context_text,
	);

	stats.skipped_duplicates = selection.skipped_duplicates;
	stats.truncated = selection.truncated;

	record_stage(&mut trace, Stage::Selection, &selection.items, &selection.dropped);

	let empty_reason = if !selection.items.is_empty() {
		None
	} else if selection.skipped_duplicates > 0 {
		Some(EmptyReason::AllInContext)
	} else {
		Some(EmptyReason::NoCandidates)
	};

	Ok(finish(collection, selection.items, stats, trace, empty_reason))
}

async fn retrieve(
	query: &str,
	collection: &ChunkCollection,
	options: &PipelineOptions,
	source: &dyn CandidateSource,
) -> Result<Retrieval> {
	let pending = source.retrieve(query, collection, options.candidate_k);

	if options.retrieval_timeout_ms == 0 {
		return pending.await;
	}

	tokio::time::timeout(Duration::from_millis(options.retrieval_timeout_ms), pending)
		.await
		.map_err(|_| Error::Retrieval {
			message: format!(
				"Candidate retrieval timed out after {} ms.",
				options.retrieval_timeout_ms
			),
		})?
}

fn record_stage(
	trace: &mut TraceBuilder,
	stage: Stage,
	items: &[ScoredChunk],
	dropped: &[Dropped],
) {
	debug!(
		stage = stage.as_str(),
		surviving = items.len(),
		dropped = dropped.len(),
		"Ranking stage finished."
	);

	trace.record(stage, items, dropped);
}

fn finish(
	collection: &ChunkCollection,
	results: Vec<ScoredChunk>,
	mut stats: SearchStats,
	trace: TraceBuilder,
	empty_reason: Option<EmptyReason>,
) -> SearchResponse {
	stats.returned = results.len() as u32;
	stats.empty_reason = empty_reason;

	info!(
		collection = collection.id(),
		returned = stats.returned,
		empty_reason = empty_reason.map(EmptyReason::as_str),
		warnings = stats.warnings.len(),
		"Search finished."
	);

	SearchResponse { results, stats, trace: trace.finish() }
}
