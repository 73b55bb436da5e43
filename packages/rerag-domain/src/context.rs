use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Read-only per-query state supplied by the host conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchContext {
	/// Chat messages in chronological order, oldest first.
	#[serde(default)]
	pub messages: Vec<ContextMessage>,
	#[serde(default)]
	pub active_character: Option<String>,
	#[serde(default)]
	pub active_user: Option<String>,
	#[serde(default)]
	pub current_message_index: u64,
	#[serde(default)]
	pub scenes: Vec<SceneBoundary>,
	/// Hashes of chunks already injected into the live context.
	#[serde(default)]
	pub injected_hashes: BTreeSet<String>,
	/// Host-defined fields addressed by `custom` condition rules.
	#[serde(default)]
	pub custom: BTreeMap<String, String>,
}
impl SearchContext {
	/// The last `window` messages.
	pub fn recent_messages(&self, window: usize) -> &[ContextMessage] {
		let start = self.messages.len().saturating_sub(window);

		&self.messages[start..]
	}

	/// The latest-starting scene that contains `message_index`.
	pub fn scene_containing(&self, message_index: u64) -> Option<&SceneBoundary> {
		self.scenes
			.iter()
			.filter(|scene| scene.contains(message_index))
			.max_by_key(|scene| scene.start)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMessage {
	#[serde(default)]
	pub speaker: Option<String>,
	pub text: String,
}
impl ContextMessage {
	pub fn new(speaker: Option<&str>, text: impl Into<String>) -> Self {
		Self { speaker: speaker.map(str::to_string), text: text.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneBoundary {
	pub start: u64,
	/// `None` while the scene is still open.
	#[serde(default)]
	pub end: Option<u64>,
}
impl SceneBoundary {
	pub fn contains(&self, message_index: u64) -> bool {
		message_index >= self.start && self.end.map(|end| message_index <= end).unwrap_or(true)
	}
}
