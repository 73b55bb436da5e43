mod candidates;
mod filter;
mod groups;
mod links;
mod score;
mod select;
mod weight;

pub use candidates::{CandidateSet, build_candidates};
pub use filter::{FilterOutcome, apply_conditions, apply_threshold};
pub use groups::{apply_group_boost, enforce_required_groups, triggered_groups};
pub use links::{LinkOutcome, resolve_links};
pub use score::{
	KEYWORD_SCORE_CEILING, KEYWORD_WEIGHT_BONUS_SCALE, KeywordScore, ScoreWeights, cmp_f32_desc,
	combine, cosine_similarity, keyword_score, rerank,
};
pub use select::{Selection, is_in_context, select_top_k};
pub use weight::{
	apply_decay, apply_importance, chunk_age, decay_multiplier, importance_multiplier,
};
