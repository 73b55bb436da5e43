use serde::{Deserialize, Serialize};

/// Why a search returned nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
	RetrievalFailed,
	NoCandidates,
	AllBelowThreshold,
	AllFailedConditions,
	AllInContext,
}
impl EmptyReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::RetrievalFailed => "retrieval_failed",
			Self::NoCandidates => "no_candidates",
			Self::AllBelowThreshold => "all_below_threshold",
			Self::AllFailedConditions => "all_failed_conditions",
			Self::AllInContext => "all_in_context",
		}
	}
}

/// Data-integrity problems that exclude or zero a single chunk without failing the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
	OrphanedSummary { hash: String, parent_hash: Option<String> },
	DimensionMismatch { hash: String, expected: usize, actual: usize },
	UnknownHash { hash: String },
	DanglingLink { source: String, target: String },
	MalformedRule { hash: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
	pub retrieved: u32,
	pub below_threshold: u32,
	pub failed_conditions: u32,
	pub group_boosted: u32,
	pub forced_group_members: u32,
	pub decay_applied: u32,
	pub parents_inserted: u32,
	pub links_inserted: u32,
	pub skipped_duplicates: u32,
	pub truncated: u32,
	pub returned: u32,
	pub empty_reason: Option<EmptyReason>,
	/// Message of the retrieval error that short-circuited the search.
	pub retrieval_failure: Option<String>,
	pub warnings: Vec<Warning>,
}
impl SearchStats {
	pub fn warn(&mut self, warning: Warning) {
		if !self.warnings.contains(&warning) {
			self.warnings.push(warning);
		}
	}

	pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = Warning>) {
		for warning in warnings {
			self.warn(warning);
		}
	}
}
