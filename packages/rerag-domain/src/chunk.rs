use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::conditions::ConditionSet;

pub const NEUTRAL_IMPORTANCE: i32 = 100;
pub const MIN_IMPORTANCE: i32 = 0;
pub const MAX_IMPORTANCE: i32 = 200;

/// An immutable unit of retrievable text as handed over by the chunk store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
	pub hash: String,
	pub text: String,
	#[serde(default)]
	pub embedding: Vec<f32>,
	#[serde(default)]
	pub keywords: Vec<String>,
	/// Keyword (as written in `keywords`) to multiplier, e.g. 1.5.
	#[serde(default)]
	pub custom_weights: BTreeMap<String, f32>,
	#[serde(default = "default_importance")]
	pub importance: i32,
	#[serde(default)]
	pub conditions: Option<ConditionSet>,
	#[serde(default)]
	pub chunk_group: Option<ChunkGroup>,
	#[serde(default)]
	pub chunk_links: Vec<ChunkLink>,
	#[serde(default)]
	pub is_summary_chunk: bool,
	#[serde(default)]
	pub parent_hash: Option<String>,
	#[serde(default)]
	pub disabled: bool,
	#[serde(default)]
	pub message_index: Option<u64>,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub timestamp: Option<OffsetDateTime>,
}
impl Chunk {
	pub fn new(hash: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			hash: hash.into(),
			text: text.into(),
			embedding: Vec::new(),
			keywords: Vec::new(),
			custom_weights: BTreeMap::new(),
			importance: NEUTRAL_IMPORTANCE,
			conditions: None,
			chunk_group: None,
			chunk_links: Vec::new(),
			is_summary_chunk: false,
			parent_hash: None,
			disabled: false,
			message_index: None,
			timestamp: None,
		}
	}

	pub fn group_name(&self) -> Option<&str> {
		self.chunk_group.as_ref().map(|group| group.name.as_str())
	}

	/// Looks up a custom weight by the keyword as written, falling back to a case-insensitive
	/// match.
	pub fn custom_weight(&self, keyword: &str) -> Option<f32> {
		if let Some(weight) = self.custom_weights.get(keyword) {
			return Some(*weight);
		}

		self.custom_weights
			.iter()
			.find(|(key, _)| key.trim().eq_ignore_ascii_case(keyword.trim()))
			.map(|(_, weight)| *weight)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGroup {
	pub name: String,
	#[serde(default)]
	pub group_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
	Force,
	Soft,
}
impl LinkMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Force => "force",
			Self::Soft => "soft",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLink {
	pub target_hash: String,
	pub mode: LinkMode,
}

fn default_importance() -> i32 {
	NEUTRAL_IMPORTANCE
}
