use crate::{options::DecaySettings, search::ScoredChunk};
use rerag_domain::{SearchContext, chunk::NEUTRAL_IMPORTANCE};

pub fn importance_multiplier(importance: i32) -> f32 {
	importance as f32 / NEUTRAL_IMPORTANCE as f32
}

pub fn apply_importance(items: &mut [ScoredChunk]) {
	for item in items.iter_mut() {
		let multiplier = importance_multiplier(item.chunk.importance);

		item.score *= multiplier;
		item.importance_multiplier = multiplier;
	}
}

/// `0.5^(age / half_life)`; never increases with age.
pub fn decay_multiplier(age: u64, half_life: f32) -> f32 {
	if age == 0 || !half_life.is_finite() || half_life <= 0.0 {
		return 1.0;
	}

	0.5_f32.powf(age as f32 / half_life)
}

/// Messages elapsed since the chunk, or `None` when it carries no message index.
///
/// Scene-aware ages run from the end of the scene holding the chunk, so content of the live
/// scene does not decay at all.
pub fn chunk_age(
	message_index: Option<u64>,
	ctx: &SearchContext,
	scene_aware: bool,
) -> Option<u64> {
	let message_index = message_index?;
	let current = ctx.current_message_index;

	if scene_aware && let Some(scene) = ctx.scene_containing(message_index) {
		return Some(match scene.end {
			None => 0,
			Some(end) if end >= current => 0,
			Some(end) => current - end,
		});
	}

	Some(current.saturating_sub(message_index))
}

/// Records a multiplier on every item, including 1.0 for items without a position.
pub fn apply_decay(
	items: &mut [ScoredChunk],
	ctx: &SearchContext,
	settings: &DecaySettings,
) -> u32 {
	let mut applied = 0;

	for item in items.iter_mut() {
		let multiplier = chunk_age(item.chunk.message_index, ctx, settings.scene_aware)
			.map(|age| decay_multiplier(age, settings.half_life))
			.unwrap_or(1.0);

		item.score *= multiplier;
		item.decay_applied = true;
		item.decay_multiplier = multiplier;
		applied += 1;
	}

	applied
}
