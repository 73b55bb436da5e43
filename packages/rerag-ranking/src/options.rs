use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result, search::ranking::ScoreWeights};
use rerag_config::{Pipeline, PipelineDecay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	Vector,
	Keyword,
	Hybrid,
}
impl SearchMode {
	pub fn parse(value: &str, label: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"vector" => Ok(Self::Vector),
			"keyword" => Ok(Self::Keyword),
			"hybrid" => Ok(Self::Hybrid),
			other => Err(Error::InvalidConfiguration {
				message: format!("{label} must be one of: vector, keyword, hybrid. Got {other}."),
			}),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Keyword => "keyword",
			Self::Hybrid => "hybrid",
		}
	}

	pub fn uses_vectors(self) -> bool {
		matches!(self, Self::Vector | Self::Hybrid)
	}
}

/// How a surviving summary chunk hands over to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMode {
	/// Keep the summary and place the parent right after it.
	Append,
	/// Put the parent in the summary's slot and drop the summary.
	Replace,
}
impl SummaryMode {
	pub fn parse(value: &str, label: &str) -> Result<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"append" => Ok(Self::Append),
			"replace" => Ok(Self::Replace),
			other => Err(Error::InvalidConfiguration {
				message: format!("{label} must be one of: append, replace. Got {other}."),
			}),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Append => "append",
			Self::Replace => "replace",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecaySettings {
	pub enabled: bool,
	/// Messages until a chunk's score halves.
	pub half_life: f32,
	pub scene_aware: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
	pub search_mode: SearchMode,
	pub top_k: u32,
	pub candidate_k: u32,
	pub threshold: f32,
	pub vector_weight: f32,
	pub keyword_weight: f32,
	pub apply_importance: bool,
	pub apply_conditions: bool,
	pub apply_groups: bool,
	pub apply_decay: bool,
	pub group_boost_multiplier: f32,
	pub max_forced_group_members: u32,
	pub decay: DecaySettings,
	pub context_window: u32,
	pub summary_mode: SummaryMode,
	pub dedupe_context_text: bool,
	pub retrieval_timeout_ms: u64,
}
impl PipelineOptions {
	/// Layers a per-query override over configured defaults and validates the result.
	pub fn resolve(cfg: &Pipeline, override_: Option<&PipelineOverride>) -> Result<Self> {
		let search_mode = override_
			.and_then(|value| value.search_mode.as_deref())
			.unwrap_or(cfg.search_mode.as_str());
		let summary_mode = override_
			.and_then(|value| value.summary_mode.as_deref())
			.unwrap_or(cfg.summary_mode.as_str());
		let decay_override = override_.and_then(|value| value.decay.as_ref());
		let options = Self {
			search_mode: SearchMode::parse(search_mode, "pipeline.search_mode")?,
			top_k: override_.and_then(|value| value.top_k).unwrap_or(cfg.top_k),
			candidate_k: override_.and_then(|value| value.candidate_k).unwrap_or(cfg.candidate_k),
			threshold: override_.and_then(|value| value.threshold).unwrap_or(cfg.threshold),
			vector_weight: override_
				.and_then(|value| value.vector_weight)
				.unwrap_or(cfg.vector_weight),
			keyword_weight: override_
				.and_then(|value| value.keyword_weight)
				.unwrap_or(cfg.keyword_weight),
			apply_importance: override_
				.and_then(|value| value.apply_importance)
				.unwrap_or(cfg.apply_importance),
			apply_conditions: override_
				.and_then(|value| value.apply_conditions)
				.unwrap_or(cfg.apply_conditions),
			apply_groups: override_.and_then(|value| value.apply_groups).unwrap_or(cfg.apply_groups),
			apply_decay: override_.and_then(|value| value.apply_decay).unwrap_or(cfg.apply_decay),
			group_boost_multiplier: override_
				.and_then(|value| value.group_boost_multiplier)
				.unwrap_or(cfg.group_boost_multiplier),
			max_forced_group_members: override_
				.and_then(|value| value.max_forced_group_members)
				.unwrap_or(cfg.max_forced_group_members),
			decay: DecaySettings {
				enabled: decay_override
					.and_then(|value| value.enabled)
					.unwrap_or(cfg.decay.enabled),
				half_life: decay_override
					.and_then(|value| value.half_life)
					.unwrap_or(cfg.decay.half_life),
				scene_aware: decay_override
					.and_then(|value| value.scene_aware)
					.unwrap_or(cfg.decay.scene_aware),
			},
			context_window: override_
				.and_then(|value| value.context_window)
				.unwrap_or(cfg.context_window),
			summary_mode: SummaryMode::parse(summary_mode, "pipeline.summary_mode")?,
			dedupe_context_text: override_
				.and_then(|value| value.dedupe_context_text)
				.unwrap_or(cfg.dedupe_context_text),
			retrieval_timeout_ms: override_
				.and_then(|value| value.retrieval_timeout_ms)
				.unwrap_or(cfg.retrieval_timeout_ms),
		};

		options.validate()?;

		Ok(options)
	}

	/// Range checks live in `rerag_config::validate_pipeline` so configured defaults and merged
	/// per-query options are held to the same rules.
	pub fn validate(&self) -> Result<()> {
		rerag_config::validate_pipeline(&self.to_pipeline()).map_err(|err| match err {
			rerag_config::Error::Validation { message } => Error::InvalidConfiguration { message },
			other => Error::InvalidConfiguration { message: other.to_string() },
		})
	}

	/// The configuration form of these options.
	pub fn to_pipeline(&self) -> Pipeline {
		Pipeline {
			search_mode: self.search_mode.as_str().to_string(),
			top_k: self.top_k,
			candidate_k: self.candidate_k,
			threshold: self.threshold,
			vector_weight: self.vector_weight,
			keyword_weight: self.keyword_weight,
			apply_importance: self.apply_importance,
			apply_conditions: self.apply_conditions,
			apply_groups: self.apply_groups,
			apply_decay: self.apply_decay,
			group_boost_multiplier: self.group_boost_multiplier,
			max_forced_group_members: self.max_forced_group_members,
			context_window: self.context_window,
			summary_mode: self.summary_mode.as_str().to_string(),
			dedupe_context_text: self.dedupe_context_text,
			retrieval_timeout_ms: self.retrieval_timeout_ms,
			decay: PipelineDecay {
				enabled: self.decay.enabled,
				half_life: self.decay.half_life,
				scene_aware: self.decay.scene_aware,
			},
		}
	}

	pub fn weights(&self) -> ScoreWeights {
		ScoreWeights { vector_weight: self.vector_weight, keyword_weight: self.keyword_weight }
	}

	pub fn decay_active(&self) -> bool {
		self.apply_decay && self.decay.enabled
	}

	pub fn snapshot(&self) -> Result<Value> {
		serde_json::to_value(self).map_err(|err| Error::Encoding {
			message: format!("Failed to encode pipeline options snapshot: {err}"),
		})
	}
}
impl Default for PipelineOptions {
	fn default() -> Self {
		let cfg = Pipeline::default();

		Self {
			search_mode: SearchMode::parse(&cfg.search_mode, "pipeline.search_mode")
				.unwrap_or(SearchMode::Hybrid),
			top_k: cfg.top_k,
			candidate_k: cfg.candidate_k,
			threshold: cfg.threshold,
			vector_weight: cfg.vector_weight,
			keyword_weight: cfg.keyword_weight,
			apply_importance: cfg.apply_importance,
			apply_conditions: cfg.apply_conditions,
			apply_groups: cfg.apply_groups,
			apply_decay: cfg.apply_decay,
			group_boost_multiplier: cfg.group_boost_multiplier,
			max_forced_group_members: cfg.max_forced_group_members,
			decay: DecaySettings {
				enabled: cfg.decay.enabled,
				half_life: cfg.decay.half_life,
				scene_aware: cfg.decay.scene_aware,
			},
			context_window: cfg.context_window,
			summary_mode: SummaryMode::parse(&cfg.summary_mode, "pipeline.summary_mode")
				.unwrap_or(SummaryMode::Append),
			dedupe_context_text: cfg.dedupe_context_text,
			retrieval_timeout_ms: cfg.retrieval_timeout_ms,
		}
	}
}

/// Per-query overrides; every field falls back to the configured pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOverride {
	pub search_mode: Option<String>,
	pub top_k: Option<u32>,
	pub candidate_k: Option<u32>,
	pub threshold: Option<f32>,
	pub vector_weight: Option<f32>,
	pub keyword_weight: Option<f32>,
	pub apply_importance: Option<bool>,
	pub apply_conditions: Option<bool>,
	pub apply_groups: Option<bool>,
	pub apply_decay: Option<bool>,
	pub group_boost_multiplier: Option<f32>,
	pub max_forced_group_members: Option<u32>,
	pub decay: Option<DecayOverride>,
	pub context_window: Option<u32>,
	pub summary_mode: Option<String>,
	pub dedupe_context_text: Option<bool>,
	pub retrieval_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecayOverride {
	pub enabled: Option<bool>,
	pub half_life: Option<f32>,
	pub scene_aware: Option<bool>,
}

pub fn hash_options_snapshot(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Encoding {
		message: format!("Failed to encode pipeline options snapshot: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}
