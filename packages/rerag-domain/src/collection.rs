use std::collections::HashMap;

use crate::{
	Error, Result,
	chunk::{Chunk, MAX_IMPORTANCE, MIN_IMPORTANCE},
	conditions::CompiledConditions,
	keywords::KeywordMatcher,
};

#[derive(Debug, Clone)]
pub struct CompiledKeyword {
	/// The keyword as written on the chunk.
	pub source: String,
	pub matcher: KeywordMatcher,
	pub weight: Option<f32>,
}

/// A chunk plus everything derived from it at load time.
#[derive(Debug, Clone)]
pub struct ChunkEntry {
	pub chunk: Chunk,
	pub keywords: Vec<CompiledKeyword>,
	pub group_keywords: Vec<KeywordMatcher>,
	pub conditions: Option<CompiledConditions>,
}

/// The canonical ordered set of chunks for one collection with a hash index built once.
#[derive(Debug, Clone)]
pub struct ChunkCollection {
	id: String,
	entries: Vec<ChunkEntry>,
	index: HashMap<String, usize>,
}
impl ChunkCollection {
	pub fn new(id: impl Into<String>, chunks: Vec<Chunk>) -> Result<Self> {
		let mut entries = Vec::with_capacity(chunks.len());
		let mut index = HashMap::with_capacity(chunks.len());

		for chunk in chunks {
			validate_chunk(&chunk)?;

			if index.contains_key(&chunk.hash) {
				return Err(Error::DuplicateHash { hash: chunk.hash });
			}

			index.insert(chunk.hash.clone(), entries.len());
			entries.push(compile_entry(chunk)?);
		}

		let collection = Self { id: id.into(), entries, index };

		collection.validate_summary_parents()?;

		Ok(collection)
	}

	/// Parses a JSON array of chunks.
	pub fn from_json(id: impl Into<String>, raw: &str) -> Result<Self> {
		let chunks: Vec<Chunk> = serde_json::from_str(raw)
			.map_err(|err| Error::InvalidPayload { message: err.to_string() })?;

		Self::new(id, chunks)
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> &[ChunkEntry] {
		&self.entries
	}

	pub fn get(&self, hash: &str) -> Option<&ChunkEntry> {
		self.index.get(hash).map(|idx| &self.entries[*idx])
	}

	/// Load order of `hash`, used as the final deterministic tie-break.
	pub fn position(&self, hash: &str) -> Option<usize> {
		self.index.get(hash).copied()
	}

	pub fn group_members<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ChunkEntry> + 'a {
		self.entries.iter().filter(move |entry| entry.chunk.group_name() == Some(name))
	}

	/// Whether `entry` is a summary whose parent cannot be injected.
	pub fn is_orphaned_summary(&self, entry: &ChunkEntry) -> bool {
		if !entry.chunk.is_summary_chunk {
			return false;
		}

		match entry.chunk.parent_hash.as_deref().and_then(|parent| self.get(parent)) {
			Some(parent) => parent.chunk.disabled,
			None => true,
		}
	}

	/// Summaries resolve to full-text chunks only, so a parent cannot be a summary itself.
	fn validate_summary_parents(&self) -> Result<()> {
		for entry in &self.entries {
			let Some(parent) = entry.chunk.parent_hash.as_deref().and_then(|hash| self.get(hash))
			else {
				continue;
			};

			if entry.chunk.is_summary_chunk && parent.chunk.is_summary_chunk {
				return Err(Error::InvalidChunk {
					hash: entry.chunk.hash.clone(),
					message: format!("parent {} is itself a summary chunk.", parent.chunk.hash),
				});
			}
		}

		Ok(())
	}
}

fn validate_chunk(chunk: &Chunk) -> Result<()> {
	let invalid = |message: String| Error::InvalidChunk { hash: chunk.hash.clone(), message };

	if chunk.hash.trim().is_empty() {
		return Err(invalid("hash must be non-empty.".to_string()));
	}
	if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&chunk.importance) {
		return Err(invalid(format!(
			"importance must be in the range {MIN_IMPORTANCE}-{MAX_IMPORTANCE}, got {}.",
			chunk.importance
		)));
	}
	if chunk.embedding.iter().any(|value| !value.is_finite()) {
		return Err(invalid("embedding values must be finite numbers.".to_string()));
	}

	for (keyword, weight) in &chunk.custom_weights {
		if !weight.is_finite() || *weight < 0.0 {
			return Err(invalid(format!(
				"custom weight for {keyword:?} must be a finite number zero or greater."
			)));
		}
	}

	if chunk.is_summary_chunk {
		match chunk.parent_hash.as_deref().map(str::trim) {
			None | Some("") =>
				return Err(invalid("summary chunks must carry a parent_hash.".to_string())),
			Some(parent) if parent == chunk.hash =>
				return Err(invalid("summary chunks cannot be their own parent.".to_string())),
			Some(_) => {},
		}
	}
	if let Some(group) = chunk.chunk_group.as_ref()
		&& group.name.trim().is_empty()
	{
		return Err(invalid("chunk_group.name must be non-empty.".to_string()));
	}

	for link in &chunk.chunk_links {
		if link.target_hash.trim().is_empty() {
			return Err(invalid("chunk_links.target_hash must be non-empty.".to_string()));
		}
		if link.target_hash == chunk.hash {
			return Err(invalid("chunk_links cannot target the chunk itself.".to_string()));
		}
	}

	Ok(())
}

fn compile_entry(chunk: Chunk) -> Result<ChunkEntry> {
	let mut keywords = Vec::with_capacity(chunk.keywords.len());

	for keyword in &chunk.keywords {
		let Some(matcher) = KeywordMatcher::parse(keyword)? else { continue };

		keywords.push(CompiledKeyword {
			source: keyword.clone(),
			matcher,
			weight: chunk.custom_weight(keyword),
		});
	}

	let mut group_keywords = Vec::new();

	if let Some(group) = chunk.chunk_group.as_ref() {
		for keyword in &group.group_keywords {
			if let Some(matcher) = KeywordMatcher::parse(keyword)? {
				group_keywords.push(matcher);
			}
		}
	}

	let conditions = chunk.conditions.as_ref().map(CompiledConditions::compile);

	Ok(ChunkEntry { chunk, keywords, group_keywords, conditions })
}
