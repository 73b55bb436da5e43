use std::collections::HashSet;

use crate::{
	search::ScoredChunk,
	trace::{DropReason, Dropped},
};
use rerag_domain::SearchContext;

#[derive(Debug, Default)]
pub struct Selection {
	pub items: Vec<ScoredChunk>,
	pub skipped_duplicates: u32,
	pub truncated: u32,
	pub dropped: Vec<Dropped>,
}

/// Whether the chunk is already present in the live context, either by hash or, when
/// `match_text` is set, verbatim in one of the recent messages.
pub fn is_in_context(
	item: &ScoredChunk,
	ctx: &SearchContext,
	context_window: usize,
	match_text: bool,
) -> bool {
	if ctx.injected_hashes.contains(&item.chunk.hash) {
		return true;
	}
	if !match_text {
		return false;
	}

	let text = item.chunk.text.trim();

	!text.is_empty()
		&& ctx.recent_messages(context_window).iter().any(|message| message.text.contains(text))
}

/// Removes chunks already in context and truncates to `top_k` in list order.
///
/// A summary only survives together with its parent. When one slot is left the parent is taken
/// alone. A summary whose parent is already in context is skipped as a duplicate.
pub fn select_top_k(
	items: Vec<ScoredChunk>,
	ctx: &SearchContext,
	top_k: usize,
	context_window: usize,
	dedupe_context_text: bool,
) -> Selection {
	let duplicates: HashSet<String> = items
		.iter()
		.filter(|item| is_in_context(item, ctx, context_window, dedupe_context_text))
		.map(|item| item.chunk.hash.clone())
		.collect();
	let mut out = Selection::default();
	let mut selected = HashSet::new();
	let mut pending: Vec<Option<ScoredChunk>> = items.into_iter().map(Some).collect();

	for idx in 0..pending.len() {
		let Some(item) = pending[idx].take() else { continue };

		if item.chunk.disabled || selected.contains(&item.chunk.hash) {
			continue;
		}
		if duplicates.contains(&item.chunk.hash) {
			out.skipped_duplicates += 1;
			out.dropped.push(Dropped::new(&item, DropReason::AlreadyInContext));

			continue;
		}

		let remaining = top_k.saturating_sub(out.items.len());
		let parent_hash = item.chunk.parent_hash.clone().filter(|_| item.chunk.is_summary_chunk);

		let Some(parent_hash) = parent_hash else {
			if remaining == 0 {
				out.truncated += 1;
				out.dropped.push(Dropped::new(&item, DropReason::TopK));
			} else {
				selected.insert(item.chunk.hash.clone());
				out.items.push(item);
			}

			continue;
		};

		if duplicates.contains(&parent_hash) {
			out.skipped_duplicates += 1;
			out.dropped.push(Dropped::new(&item, DropReason::AlreadyInContext));

			continue;
		}
		if selected.contains(&parent_hash) {
			if remaining == 0 {
				out.truncated += 1;
				out.dropped.push(Dropped::new(&item, DropReason::TopK));
			} else {
				selected.insert(item.chunk.hash.clone());
				out.items.push(item);
			}

			continue;
		}

		let parent_pos = pending.iter().position(|slot| {
			slot.as_ref().map(|candidate| candidate.chunk.hash == parent_hash).unwrap_or(false)
		});
		let Some(parent_pos) = parent_pos else {
			out.dropped.push(Dropped::new(&item, DropReason::ParentUnavailable));

			continue;
		};

		if remaining >= 2 {
			let Some(parent) = pending[parent_pos].take() else { continue };

			selected.insert(item.chunk.hash.clone());
			selected.insert(parent.chunk.hash.clone());
			out.items.push(item);
			out.items.push(parent);
		} else if remaining == 1 {
			let Some(mut parent) = pending[parent_pos].take() else { continue };

			parent.score = parent.score.max(item.score);

			selected.insert(parent.chunk.hash.clone());
			out.truncated += 1;
			out.dropped.push(Dropped::new(&item, DropReason::ParentUnavailable));
			out.items.push(parent);
		} else {
			out.truncated += 1;
			out.dropped.push(Dropped::new(&item, DropReason::TopK));
		}
	}

	out
}
