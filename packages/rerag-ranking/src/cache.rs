use std::time::Duration;

use moka::sync::Cache;
use serde_json::Value;

use crate::{Error, Result};

const EMBEDDING_CACHE_SCHEMA_VERSION: i32 = 1;

/// Query embeddings memoized across searches. Implementations must be safe to share.
pub trait EmbeddingCache
where
	Self: Send + Sync,
{
	fn get(&self, key: &str) -> Option<Vec<f32>>;

	fn insert(&self, key: String, embedding: Vec<f32>);
}

/// Bounded in-memory cache with TinyLFU admission and a fixed time-to-live.
pub struct MokaEmbeddingCache {
	cache: Cache<String, Vec<f32>>,
}
impl MokaEmbeddingCache {
	pub fn new(max_entries: u64, ttl: Duration) -> Self {
		let cache = Cache::builder().max_capacity(max_entries).time_to_live(ttl).build();

		Self { cache }
	}

	/// Returns `None` when caching is disabled.
	pub fn from_config(cfg: &rerag_config::Cache) -> Option<Self> {
		cfg.enabled.then(|| Self::new(cfg.max_entries, Duration::from_secs(cfg.ttl_secs)))
	}

	pub fn entry_count(&self) -> u64 {
		self.cache.entry_count()
	}
}
impl EmbeddingCache for MokaEmbeddingCache {
	fn get(&self, key: &str) -> Option<Vec<f32>> {
		self.cache.get(key)
	}

	fn insert(&self, key: String, embedding: Vec<f32>) {
		self.cache.insert(key, embedding);
	}
}

pub fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Encoding {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn build_embedding_cache_key(provider_id: &str, model: &str, text: &str) -> Result<String> {
	let payload = serde_json::json!({
		"kind": "query_embedding",
		"schema_version": EMBEDDING_CACHE_SCHEMA_VERSION,
		"provider_id": provider_id,
		"model": model,
		"text": text.trim(),
	});

	hash_cache_key(&payload)
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}
