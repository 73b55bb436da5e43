use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::{
	options::SummaryMode,
	search::{Inclusion, ScoredChunk},
	stats::Warning,
	trace::{DropReason, Dropped},
};
use rerag_domain::{ChunkCollection, LinkMode};

#[derive(Debug, Default)]
pub struct LinkOutcome {
	pub items: Vec<ScoredChunk>,
	pub parents_inserted: u32,
	pub links_inserted: u32,
	pub dropped: Vec<Dropped>,
	pub warnings: Vec<Warning>,
}

/// Pairs summaries with their parents and follows chunk links.
///
/// Parents are looked up in the whole collection and carry the summary's score. Link targets
/// follow their source and are resolved in turn; a hash is never inserted twice.
pub fn resolve_links(
	items: Vec<ScoredChunk>,
	collection: &ChunkCollection,
	pool: &HashMap<String, ScoredChunk>,
	summary_mode: SummaryMode,
) -> LinkOutcome {
	let mut visited: HashSet<String> = items.iter().map(|item| item.chunk.hash.clone()).collect();
	let mut out = LinkOutcome { items, ..LinkOutcome::default() };
	let mut idx = 0;

	while idx < out.items.len() {
		// Link targets land after the item and after a parent appended for it.
		let mut cursor = idx + 1;

		if out.items[idx].chunk.is_summary_chunk
			&& let Some(parent_hash) = out.items[idx].chunk.parent_hash.clone()
		{
			let summary_score = out.items[idx].score;
			let summary_hash = out.items[idx].chunk.hash.clone();
			let parent_present = visited.contains(&parent_hash);
			let parent = collection.get(&parent_hash).filter(|entry| !entry.chunk.disabled);

			match (summary_mode, parent_present, parent) {
				(SummaryMode::Replace, true, _) => {
					let summary = out.items.remove(idx);

					out.dropped.push(Dropped::new(&summary, DropReason::SummaryReplaced));

					continue;
				},
				(SummaryMode::Replace, false, Some(parent)) => {
					let summary = out.items.remove(idx);
					let mut replacement = pooled(pool, &parent.chunk, summary_score);

					replacement.inclusion = Inclusion::SummaryParent { summary: summary_hash };
					visited.insert(parent_hash);
					out.dropped.push(Dropped::new(&summary, DropReason::SummaryReplaced));
					out.items.insert(idx, replacement);
					out.parents_inserted += 1;

					continue;
				},
				(SummaryMode::Append, false, Some(parent)) => {
					let mut appended = pooled(pool, &parent.chunk, summary_score);

					appended.inclusion = Inclusion::SummaryParent { summary: summary_hash };
					visited.insert(parent_hash);
					out.items.insert(idx + 1, appended);
					out.parents_inserted += 1;
					cursor += 1;
				},
				_ => {},
			}
		}

		let source = out.items[idx].chunk.hash.clone();
		let links = out.items[idx].chunk.chunk_links.clone();

		for link in links {
			if visited.contains(&link.target_hash) {
				continue;
			}

			let Some(target) = collection.get(&link.target_hash) else {
				warn!(source = %source, target = %link.target_hash, "Chunk link points at a missing chunk.");

				out.warnings.push(Warning::DanglingLink {
					source: source.clone(),
					target: link.target_hash.clone(),
				});

				continue;
			};

			if target.chunk.disabled || collection.is_orphaned_summary(target) {
				continue;
			}

			let candidate_score = pool.get(&link.target_hash).map(|item| item.score).unwrap_or(0.0);
			let inclusion = match link.mode {
				LinkMode::Force => Inclusion::ForceLink { source: source.clone() },
				LinkMode::Soft if candidate_score != 0.0 =>
					Inclusion::SoftLink { source: source.clone() },
				LinkMode::Soft => continue,
			};
			let mut linked = pooled(pool, &target.chunk, candidate_score);

			linked.inclusion = inclusion;
			visited.insert(link.target_hash.clone());
			out.items.insert(cursor, linked);
			out.links_inserted += 1;
			cursor += 1;
		}

		idx += 1;
	}

	out
}

fn pooled(
	pool: &HashMap<String, ScoredChunk>,
	chunk: &rerag_domain::Chunk,
	score: f32,
) -> ScoredChunk {
	let mut item =
		pool.get(&chunk.hash).cloned().unwrap_or_else(|| ScoredChunk::new(chunk.clone(), score));

	item.score = score;

	item
}

#[cfg(test)]
mod tests {
	use super::*;
	use rerag_domain::{Chunk, ChunkLink};

	fn summary(hash: &str, parent: &str) -> Chunk {
		let mut chunk = Chunk::new(hash, format!("summary of {parent}"));

		chunk.is_summary_chunk = true;
		chunk.parent_hash = Some(parent.to_string());

		chunk
	}

	fn linked(hash: &str, target: &str, mode: LinkMode) -> Chunk {
		let mut chunk = Chunk::new(hash, hash);

		chunk.chunk_links = vec![ChunkLink { target_hash: target.to_string(), mode }];

		chunk
	}

	fn hashes(items: &[ScoredChunk]) -> Vec<&str> {
		items.iter().map(|item| item.chunk.hash.as_str()).collect()
	}

	#[test]
	fn append_mode_inserts_parent_after_summary() {
		let collection = ChunkCollection::new(
			"lore",
			vec![summary("s", "p"), Chunk::new("p", "full text"), Chunk::new("x", "x")],
		)
		.expect("collection");
		let items = vec![
			ScoredChunk::new(summary("s", "p"), 0.8),
			ScoredChunk::new(Chunk::new("x", "x"), 0.6),
		];
		let out = resolve_links(items, &collection, &HashMap::new(), SummaryMode::Append);

		assert_eq!(hashes(&out.items), vec!["s", "p", "x"]);
		assert_eq!(out.items[1].score, 0.8);
		assert_eq!(out.items[1].inclusion, Inclusion::SummaryParent { summary: "s".to_string() });
		assert_eq!(out.parents_inserted, 1);
	}

	#[test]
	fn replace_mode_swaps_summary_for_parent() {
		let collection =
			ChunkCollection::new("lore", vec![summary("s", "p"), Chunk::new("p", "full text")])
				.expect("collection");
		let out = resolve_links(
			vec![ScoredChunk::new(summary("s", "p"), 0.8)],
			&collection,
			&HashMap::new(),
			SummaryMode::Replace,
		);

		assert_eq!(hashes(&out.items), vec!["p"]);
		assert_eq!(out.dropped[0].reason, DropReason::SummaryReplaced);
	}

	#[test]
	fn force_links_are_transitive_and_cycle_safe() {
		let collection = ChunkCollection::new(
			"lore",
			vec![
				linked("a", "b", LinkMode::Force),
				linked("b", "c", LinkMode::Force),
				linked("c", "a", LinkMode::Force),
				Chunk::new("z", "z"),
			],
		)
		.expect("collection");
		let items = vec![
			ScoredChunk::new(linked("a", "b", LinkMode::Force), 0.9),
			ScoredChunk::new(Chunk::new("z", "z"), 0.5),
		];
		let out = resolve_links(items, &collection, &HashMap::new(), SummaryMode::Append);

		assert_eq!(hashes(&out.items), vec!["a", "b", "c", "z"]);
		assert_eq!(out.links_inserted, 2);
	}

	#[test]
	fn soft_links_need_a_candidate_score_and_dangling_links_warn() {
		let mut source = linked("a", "soft", LinkMode::Soft);

		source.chunk_links.push(ChunkLink { target_hash: "cold".to_string(), mode: LinkMode::Soft });
		source.chunk_links.push(ChunkLink { target_hash: "gone".to_string(), mode: LinkMode::Force });

		let collection = ChunkCollection::new(
			"lore",
			vec![source.clone(), Chunk::new("soft", "soft"), Chunk::new("cold", "cold")],
		)
		.expect("collection");
		let mut pool = HashMap::new();

		pool.insert("soft".to_string(), ScoredChunk::new(Chunk::new("soft", "soft"), 0.2));

		let out =
			resolve_links(vec![ScoredChunk::new(source, 0.9)], &collection, &pool, SummaryMode::Append);

		assert_eq!(hashes(&out.items), vec!["a", "soft"]);
		assert_eq!(out.items[1].score, 0.2);
		assert_eq!(
			out.warnings,
			vec![Warning::DanglingLink { source: "a".to_string(), target: "gone".to_string() }]
		);
	}
}
