use tracing::warn;

use crate::{
	search::ScoredChunk,
	stats::Warning,
	trace::{DropReason, Dropped},
};
use rerag_domain::{ChunkCollection, SearchContext};

pub struct FilterOutcome {
	pub kept: Vec<ScoredChunk>,
	pub dropped: Vec<Dropped>,
	pub warnings: Vec<Warning>,
}

/// Keeps candidates with `score >= threshold`.
pub fn apply_threshold(items: Vec<ScoredChunk>, threshold: f32) -> FilterOutcome {
	let (kept, below): (Vec<_>, Vec<_>) =
		items.into_iter().partition(|item| item.score >= threshold);
	let dropped = below.iter().map(|item| Dropped::new(item, DropReason::BelowThreshold)).collect();

	FilterOutcome { kept, dropped, warnings: Vec::new() }
}

/// Evaluates each chunk's compiled activation rules against the context. Malformed rules fail
/// closed and are reported as warnings.
pub fn apply_conditions(
	items: Vec<ScoredChunk>,
	collection: &ChunkCollection,
	ctx: &SearchContext,
	context_window: usize,
) -> FilterOutcome {
	let mut kept = Vec::with_capacity(items.len());
	let mut dropped = Vec::new();
	let mut warnings = Vec::new();

	for item in items {
		let Some(conditions) =
			collection.get(&item.chunk.hash).and_then(|entry| entry.conditions.as_ref())
		else {
			kept.push(item);

			continue;
		};
		let evaluation = conditions.evaluate(ctx, context_window);

		for reason in evaluation.malformed {
			warn!(
				hash = %item.chunk.hash,
				reason = %reason,
				"Malformed activation rule evaluates to false."
			);

			warnings.push(Warning::MalformedRule { hash: item.chunk.hash.clone(), reason });
		}

		if evaluation.passed {
			kept.push(item);
		} else {
			dropped.push(Dropped::new(&item, DropReason::ConditionsFailed));
		}
	}

	FilterOutcome { kept, dropped, warnings }
}
