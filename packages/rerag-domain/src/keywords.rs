use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, Result};

pub const MAX_QUERY_KEYWORDS: usize = 32;

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Query text prepared once per search for keyword matching.
#[derive(Debug, Clone)]
pub struct QueryTerms {
	raw: String,
	padded: String,
	keywords: Vec<String>,
	keyword_set: HashSet<String>,
}
impl QueryTerms {
	pub fn new(query: &str) -> Self {
		let keywords = extract_query_keywords(query, MAX_QUERY_KEYWORDS);
		let normalized = normalize_text(query);
		// Single-character tokens stay matchable even though they are not query keywords.
		let keyword_set = normalized.unicode_words().map(str::to_string).collect();
		let padded = format!(" {normalized} ");

		Self { raw: query.to_string(), padded, keywords, keyword_set }
	}

	pub fn raw(&self) -> &str {
		&self.raw
	}

	pub fn keywords(&self) -> &[String] {
		&self.keywords
	}

	pub fn contains_term(&self, term: &str) -> bool {
		self.keyword_set.contains(term)
	}

	pub fn contains_phrase(&self, phrase: &str) -> bool {
		self.padded.contains(&format!(" {phrase} "))
	}

	/// Substring test against the normalized query.
	pub fn contains_fragment(&self, fragment: &str) -> bool {
		self.padded.contains(fragment)
	}
}

/// A chunk keyword or group trigger compiled at load time.
#[derive(Debug, Clone)]
pub enum KeywordMatcher {
	/// A single normalized token compared against the query's tokens.
	Term(String),
	/// A run of normalized tokens that must appear contiguously in the query.
	Phrase(String),
	/// Text that word segmentation splits apart, such as Han or Kana runs, matched as a substring
	/// of the normalized query.
	Fragment(String),
	/// A `/pattern/flags` keyword tested against the raw query text.
	Pattern(Regex),
}
impl KeywordMatcher {
	/// Returns `Ok(None)` for keywords that normalize to nothing.
	pub fn parse(raw: &str) -> Result<Option<Self>> {
		if let Some(pattern) = parse_regex_literal(raw) {
			return pattern.map(|regex| Some(Self::Pattern(regex)));
		}

		let normalized = normalize_text(raw);

		if normalized.is_empty() {
			return Ok(None);
		}
		if normalized.contains(' ') {
			return Ok(Some(Self::Phrase(normalized)));
		}

		let single_word = {
			let mut words = normalized.unicode_words();

			matches!((words.next(), words.next()), (Some(word), None) if word == normalized)
		};

		if single_word {
			return Ok(Some(Self::Term(normalized)));
		}

		Ok(Some(Self::Fragment(normalized)))
	}

	pub fn matches(&self, query: &QueryTerms) -> bool {
		match self {
			Self::Term(term) => query.contains_term(term),
			Self::Phrase(phrase) => query.contains_phrase(phrase),
			Self::Fragment(fragment) => query.contains_fragment(fragment),
			Self::Pattern(regex) => regex.is_match(query.raw()),
		}
	}
}

/// Matches condition values against free text such as chat messages.
#[derive(Debug, Clone)]
pub enum TextMatcher {
	Substring(String),
	Pattern(Regex),
}
impl TextMatcher {
	pub fn parse(raw: &str) -> Result<Option<Self>> {
		if let Some(pattern) = parse_regex_literal(raw) {
			return pattern.map(|regex| Some(Self::Pattern(regex)));
		}

		let needle = raw.trim().to_lowercase();

		if needle.is_empty() {
			return Ok(None);
		}

		Ok(Some(Self::Substring(needle)))
	}

	pub fn is_match(&self, text: &str) -> bool {
		match self {
			Self::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
			Self::Pattern(regex) => regex.is_match(text),
		}
	}
}

/// NFKC-folds, lowercases, and collapses everything that is not alphanumeric into single spaces.
pub fn normalize_text(text: &str) -> String {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.nfkc().flat_map(char::to_lowercase) {
		if ch.is_alphanumeric() {
			normalized.push(ch);
		} else {
			normalized.push(' ');
		}
	}

	normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn extract_query_keywords(query: &str, max_terms: usize) -> Vec<String> {
	let normalized = normalize_text(query);
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	if max_terms == 0 {
		return out;
	}

	for token in normalized.unicode_words() {
		if token.chars().count() < 2 {
			continue;
		}
		if seen.insert(token) {
			out.push(token.to_string());
		}
		if out.len() >= max_terms {
			break;
		}
	}

	out
}

/// Parses `/pattern/flags`. Returns `None` when `raw` is not written in that form.
pub fn parse_regex_literal(raw: &str) -> Option<Result<Regex>> {
	let trimmed = raw.trim();
	let body = trimmed.strip_prefix('/')?;
	let close = body.rfind('/')?;
	let (pattern, flags) = (&body[..close], &body[close + 1..]);

	if pattern.is_empty() {
		return None;
	}

	let mut builder = RegexBuilder::new(pattern);

	builder.size_limit(REGEX_SIZE_LIMIT);

	for flag in flags.chars() {
		match flag {
			'i' => builder.case_insensitive(true),
			'm' => builder.multi_line(true),
			's' => builder.dot_matches_new_line(true),
			'x' => builder.ignore_whitespace(true),
			// JavaScript-style flags that carry no meaning for a single match test.
			'g' | 'u' => &mut builder,
			other =>
				return Some(Err(Error::InvalidPattern {
					pattern: trimmed.to_string(),
					message: format!("Unsupported regex flag {other:?}."),
				})),
		};
	}

	Some(builder.build().map_err(|err| Error::InvalidPattern {
		pattern: trimmed.to_string(),
		message: err.to_string(),
	}))
}
