use std::collections::{BTreeSet, HashMap, HashSet};

use crate::search::{Inclusion, ScoredChunk, ranking::score};
use rerag_domain::{ChunkCollection, QueryTerms};

/// Names of groups whose trigger keywords match the query, taken from every enabled chunk of the
/// collection.
pub fn triggered_groups(collection: &ChunkCollection, query: &QueryTerms) -> BTreeSet<String> {
	let mut groups = BTreeSet::new();

	for entry in collection.entries() {
		if entry.chunk.disabled {
			continue;
		}

		let Some(name) = entry.chunk.group_name() else { continue };

		if groups.contains(name) {
			continue;
		}
		if entry.group_keywords.iter().any(|matcher| matcher.matches(query)) {
			groups.insert(name.to_string());
		}
	}

	groups
}

/// Multiplies the score of every candidate in a triggered group. Returns how many were boosted.
pub fn apply_group_boost(
	items: &mut [ScoredChunk],
	triggered: &BTreeSet<String>,
	multiplier: f32,
) -> u32 {
	let mut boosted = 0;

	for item in items.iter_mut() {
		let Some(name) = item.chunk.group_name() else { continue };

		if !triggered.contains(name) {
			continue;
		}

		item.score *= multiplier;
		item.group_multiplier = multiplier;
		boosted += 1;
	}

	boosted
}

/// Pulls up to `max_forced` extra members of every group already represented in `items`,
/// inserting them right after the group's highest-ranked result.
///
/// Members are drawn from the whole collection, ordered by their pre-filter candidate score and
/// then by load order. This is the one stage allowed to re-admit filtered chunks.
pub fn enforce_required_groups(
	items: Vec<ScoredChunk>,
	collection: &ChunkCollection,
	pool: &HashMap<String, ScoredChunk>,
	max_forced: u32,
) -> (Vec<ScoredChunk>, u32) {
	if max_forced == 0 {
		return (items, 0);
	}

	let mut present: HashSet<String> = items.iter().map(|item| item.chunk.hash.clone()).collect();
	let mut forced: HashMap<String, Vec<ScoredChunk>> = HashMap::new();

	for item in &items {
		let Some(name) = item.chunk.group_name() else { continue };

		if forced.contains_key(name) {
			continue;
		}

		let mut members: Vec<_> = collection
			.group_members(name)
			.filter(|entry| {
				!entry.chunk.disabled
					&& !present.contains(&entry.chunk.hash)
					&& !collection.is_orphaned_summary(entry)
			})
			.map(|entry| {
				let mut member = pool
					.get(&entry.chunk.hash)
					.cloned()
					.unwrap_or_else(|| ScoredChunk::new(entry.chunk.clone(), 0.0));

				member.inclusion = Inclusion::GroupMember { group: name.to_string() };

				member
			})
			.collect();

		members.sort_by(|a, b| score::cmp_f32_desc(a.score, b.score));
		members.truncate(max_forced as usize);

		for member in &members {
			present.insert(member.chunk.hash.clone());
		}

		forced.insert(name.to_string(), members);
	}

	let mut inserted = 0;
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let members = item.chunk.group_name().and_then(|name| forced.remove(name));

		out.push(item);

		if let Some(members) = members {
			inserted += members.len() as u32;

			out.extend(members);
		}
	}

	(out, inserted)
}
