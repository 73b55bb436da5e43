use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::search::{Inclusion, ScoredChunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Retrieval,
	Threshold,
	Conditions,
	GroupBoost,
	Importance,
	Decay,
	Rerank,
	GroupEnforcement,
	LinkResolution,
	Selection,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Retrieval => "retrieval",
			Self::Threshold => "threshold",
			Self::Conditions => "conditions",
			Self::GroupBoost => "group_boost",
			Self::Importance => "importance",
			Self::Decay => "decay",
			Self::Rerank => "rerank",
			Self::GroupEnforcement => "group_enforcement",
			Self::LinkResolution => "link_resolution",
			Self::Selection => "selection",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
	OrphanedSummary,
	BelowThreshold,
	ConditionsFailed,
	/// Replaced by its parent in `replace` summary mode.
	SummaryReplaced,
	AlreadyInContext,
	/// A summary whose parent did not fit or is already injected.
	ParentUnavailable,
	TopK,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fate", rename_all = "snake_case")]
pub enum Fate {
	Passed,
	Dropped { reason: DropReason },
	Inserted { reason: Inclusion },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dropped {
	pub hash: String,
	pub score: f32,
	pub reason: DropReason,
}
impl Dropped {
	pub fn new(item: &ScoredChunk, reason: DropReason) -> Self {
		Self { hash: item.chunk.hash.clone(), score: item.score, reason }
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
	pub hash: String,
	pub score: f32,
	#[serde(flatten)]
	pub fate: Fate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSnapshot {
	pub stage: Stage,
	pub entries: Vec<TraceEntry>,
}

/// Stage-by-stage record of one search, returned to the caller for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
	pub trace_id: Uuid,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	pub query: String,
	pub options_snapshot: Value,
	pub options_hash: String,
	pub stages: Vec<StageSnapshot>,
}
impl Trace {
	pub fn stage(&self, stage: Stage) -> Option<&StageSnapshot> {
		self.stages.iter().find(|snapshot| snapshot.stage == stage)
	}
}

pub(crate) struct TraceBuilder {
	trace: Trace,
	previous: Option<HashSet<String>>,
}
impl TraceBuilder {
	pub(crate) fn new(query: &str, options_snapshot: Value, options_hash: String) -> Self {
		Self {
			trace: Trace {
				trace_id: Uuid::new_v4(),
				created_at: OffsetDateTime::now_utc(),
				query: query.to_string(),
				options_snapshot,
				options_hash,
				stages: Vec::new(),
			},
			previous: None,
		}
	}

	/// Survivors that were not present after the previous stage are recorded as inserted.
	pub(crate) fn record(&mut self, stage: Stage, survivors: &[ScoredChunk], dropped: &[Dropped]) {
		let mut entries = Vec::with_capacity(survivors.len() + dropped.len());

		for item in survivors {
			let is_new = self
				.previous
				.as_ref()
				.map(|previous| !previous.contains(&item.chunk.hash))
				.unwrap_or(false);
			let fate =
				if is_new { Fate::Inserted { reason: item.inclusion.clone() } } else { Fate::Passed };

			entries.push(TraceEntry { hash: item.chunk.hash.clone(), score: item.score, fate });
		}
		for drop in dropped {
			entries.push(TraceEntry {
				hash: drop.hash.clone(),
				score: drop.score,
				fate: Fate::Dropped { reason: drop.reason },
			});
		}

		self.previous = Some(survivors.iter().map(|item| item.chunk.hash.clone()).collect());
		self.trace.stages.push(StageSnapshot { stage, entries });
	}

	pub(crate) fn finish(self) -> Trace {
		self.trace
	}
}
