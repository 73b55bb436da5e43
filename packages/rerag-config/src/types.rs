use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub retrieval: Retrieval,
	#[serde(default)]
	pub pipeline: Pipeline,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub vector_query: Option<VectorQueryProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorQueryProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	/// Either "local" (embed the query and score chunk vectors in-process) or "remote" (ask the
	/// vector query service).
	pub source: String,
	pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pipeline {
	pub search_mode: String,
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
	pub context_window: u32,
	pub summary_mode: String,
	/// Also treat a chunk as already injected when its full text appears verbatim in the
	/// recent-message window.
	pub dedupe_context_text: bool,
	/// Optional. Zero disables the retrieval deadline.
	pub retrieval_timeout_ms: u64,
	pub decay: PipelineDecay,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self {
			search_mode: "hybrid".to_string(),
			top_k: 5,
			candidate_k: 50,
			threshold: 0.25,
			vector_weight: 0.7,
			keyword_weight: 0.3,
			apply_importance: true,
			apply_conditions: true,
			apply_groups: true,
			apply_decay: false,
			group_boost_multiplier: 1.3,
			max_forced_group_members: 3,
			context_window: 10,
			summary_mode: "append".to_string(),
			dedupe_context_text: true,
			retrieval_timeout_ms: 0,
			decay: PipelineDecay::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineDecay {
	pub enabled: bool,
	/// Measured in messages.
	pub half_life: f32,
	pub scene_aware: bool,
}
impl Default for PipelineDecay {
	fn default() -> Self {
		Self { enabled: false, half_life: 50.0, scene_aware: false }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub max_entries: u64,
	pub ttl_secs: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, max_entries: 1_024, ttl_secs: 3_600 }
	}
}
