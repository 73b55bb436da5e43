use serde::{Deserialize, Serialize};

use crate::{context::SearchContext, keywords::TextMatcher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionLogic {
	#[default]
	#[serde(rename = "AND", alias = "and")]
	And,
	#[serde(rename = "OR", alias = "or")]
	Or,
}

/// Activation rules as stored with a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionSet {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default)]
	pub logic: ConditionLogic,
	#[serde(default)]
	pub rules: Vec<ConditionRule>,
}

/// Fields stay optional so that malformed rules survive deserialization and fail closed at
/// evaluation time instead of rejecting the whole collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionRule {
	#[serde(rename = "type", default)]
	pub rule_type: Option<String>,
	#[serde(default)]
	pub value: Option<String>,
	#[serde(default)]
	pub negate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
	Eq,
	Gt,
	Ge,
	Lt,
	Le,
}
impl Comparison {
	fn holds(self, lhs: u64, rhs: u64) -> bool {
		match self {
			Self::Eq => lhs == rhs,
			Self::Gt => lhs > rhs,
			Self::Ge => lhs >= rhs,
			Self::Lt => lhs < rhs,
			Self::Le => lhs <= rhs,
		}
	}
}

#[derive(Debug, Clone)]
pub enum RuleKind {
	Keyword(TextMatcher),
	Character(String),
	User(String),
	Speaker(String),
	MessageCount { comparison: Comparison, count: u64 },
	Custom { field: String, value: String },
	Malformed { reason: String },
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
	pub kind: RuleKind,
	pub negate: bool,
}
impl CompiledRule {
	pub fn compile(rule: &ConditionRule) -> Self {
		Self { kind: compile_kind(rule), negate: rule.negate }
	}

	pub fn is_malformed(&self) -> bool {
		matches!(self.kind, RuleKind::Malformed { .. })
	}

	pub fn evaluate(&self, ctx: &SearchContext, context_window: usize) -> bool {
		let raw = match &self.kind {
			RuleKind::Malformed { .. } => return false,
			RuleKind::Keyword(matcher) => ctx
				.recent_messages(context_window)
				.iter()
				.any(|message| matcher.is_match(&message.text)),
			RuleKind::Character(expected) => eq_ignore_case(ctx.active_character.as_deref(), expected),
			RuleKind::User(expected) => eq_ignore_case(ctx.active_user.as_deref(), expected),
			RuleKind::Speaker(expected) => eq_ignore_case(
				ctx.messages.last().and_then(|message| message.speaker.as_deref()),
				expected,
			),
			RuleKind::MessageCount { comparison, count } =>
				comparison.holds(ctx.current_message_index, *count),
			RuleKind::Custom { field, value } =>
				eq_ignore_case(ctx.custom.get(field).map(String::as_str), value),
		};

		raw != self.negate
	}
}

/// Outcome of evaluating one chunk's rule set.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
	pub passed: bool,
	/// Reasons for every malformed rule that was forced to `false`.
	pub malformed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledConditions {
	enabled: bool,
	logic: ConditionLogic,
	rules: Vec<CompiledRule>,
}
impl CompiledConditions {
	pub fn compile(set: &ConditionSet) -> Self {
		Self {
			enabled: set.enabled,
			logic: set.logic,
			rules: set.rules.iter().map(CompiledRule::compile).collect(),
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn rules(&self) -> &[CompiledRule] {
		&self.rules
	}

	/// A disabled set is a no-op: it passes and reports nothing, malformed rules included.
	pub fn evaluate(&self, ctx: &SearchContext, context_window: usize) -> Evaluation {
		if !self.enabled {
			return Evaluation { passed: true, malformed: Vec::new() };
		}

		let malformed = self
			.rules
			.iter()
			.filter_map(|rule| match &rule.kind {
				RuleKind::Malformed { reason } => Some(reason.clone()),
				_ => None,
			})
			.collect();

		if self.rules.is_empty() {
			return Evaluation { passed: true, malformed };
		}

		let mut results = self.rules.iter().map(|rule| rule.evaluate(ctx, context_window));
		let passed = match self.logic {
			ConditionLogic::And => results.all(|result| result),
			ConditionLogic::Or => results.any(|result| result),
		};

		Evaluation { passed, malformed }
	}
}

fn compile_kind(rule: &ConditionRule) -> RuleKind {
	let Some(rule_type) = rule.rule_type.as_deref().map(str::trim).filter(|value| !value.is_empty())
	else {
		return RuleKind::Malformed { reason: "Rule is missing a type.".to_string() };
	};
	let Some(value) = rule.value.as_deref().map(str::trim).filter(|value| !value.is_empty()) else {
		return RuleKind::Malformed { reason: format!("Rule {rule_type} is missing a value.") };
	};

	match rule_type.to_ascii_lowercase().as_str() {
		"keyword" => match TextMatcher::parse(value) {
			Ok(Some(matcher)) => RuleKind::Keyword(matcher),
			Ok(None) => RuleKind::Malformed { reason: "Keyword rule value is blank.".to_string() },
			Err(err) => RuleKind::Malformed { reason: err.to_string() },
		},
		"character" => RuleKind::Character(value.to_string()),
		"user" => RuleKind::User(value.to_string()),
		"speaker" => RuleKind::Speaker(value.to_string()),
		"message_count" | "messagecount" => match parse_comparison(value) {
			Some((comparison, count)) => RuleKind::MessageCount { comparison, count },
			None => RuleKind::Malformed {
				reason: format!("Message count rule value {value:?} is not a comparison."),
			},
		},
		"custom" => match value.split_once('=') {
			Some((field, expected)) if !field.trim().is_empty() => RuleKind::Custom {
				field: field.trim().to_string(),
				value: expected.trim().to_string(),
			},
			_ => RuleKind::Malformed {
				reason: format!("Custom rule value {value:?} must be written as field=value."),
			},
		},
		other => RuleKind::Malformed { reason: format!("Unknown rule type {other:?}.") },
	}
}

fn parse_comparison(value: &str) -> Option<(Comparison, u64)> {
	let value = value.trim();
	let (comparison, rest) = if let Some(rest) = value.strip_prefix(">=") {
		(Comparison::Ge, rest)
	} else if let Some(rest) = value.strip_prefix("<=") {
		(Comparison::Le, rest)
	} else if let Some(rest) = value.strip_prefix('>') {
		(Comparison::Gt, rest)
	} else if let Some(rest) = value.strip_prefix('<') {
		(Comparison::Lt, rest)
	} else if let Some(rest) = value.strip_prefix('=') {
		(Comparison::Eq, rest)
	} else {
		(Comparison::Ge, value)
	};

	rest.trim().parse().ok().map(|count| (comparison, count))
}

fn eq_ignore_case(actual: Option<&str>, expected: &str) -> bool {
	actual.map(|actual| actual.trim().eq_ignore_ascii_case(expected.trim())).unwrap_or(false)
}
