use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
	BoxFuture, CandidateSource, EmbeddingProvider, Error, Result,
	cache::{self, EmbeddingCache},
	search::ranking,
	stats::Warning,
};
use rerag_config::{EmbeddingProviderConfig, VectorQueryProviderConfig};
use rerag_domain::ChunkCollection;
use rerag_providers::vector_query;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateHit {
	pub hash: String,
	pub score: f32,
}

/// Hits in descending relevance plus integrity warnings raised while scoring them.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
	pub hits: Vec<CandidateHit>,
	pub warnings: Vec<Warning>,
}

/// Embeds the query and scores chunk vectors in-process.
pub struct LocalVectorSource {
	provider: Arc<dyn EmbeddingProvider>,
	cfg: EmbeddingProviderConfig,
	cache: Option<Arc<dyn EmbeddingCache>>,
}
impl LocalVectorSource {
	pub fn new(provider: Arc<dyn EmbeddingProvider>, cfg: EmbeddingProviderConfig) -> Self {
		Self { provider, cfg, cache: None }
	}

	pub fn with_cache(mut self, cache: Arc<dyn EmbeddingCache>) -> Self {
		self.cache = Some(cache);

		self
	}

	pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let key = self
			.cache
			.as_ref()
			.map(|_| cache::build_embedding_cache_key(&self.cfg.provider_id, &self.cfg.model, query))
			.transpose()?;

		if let (Some(store), Some(key)) = (self.cache.as_ref(), key.as_deref())
			&& let Some(hit) = store.get(key)
		{
			debug!(cache_key_prefix = cache::cache_key_prefix(key), "Query embedding cache hit.");

			return Ok(hit);
		}

		let texts = vec![query.to_string()];
		let mut vectors = self.provider.embed(&self.cfg, &texts).await?;

		if vectors.len() != 1 {
			return Err(Error::Provider {
				message: format!("Embedding provider returned {} vectors for one query.", vectors.len()),
			});
		}

		let vector = vectors.remove(0);

		if let (Some(store), Some(key)) = (self.cache.as_ref(), key) {
			store.insert(key, vector.clone());
		}

		Ok(vector)
	}
}
impl CandidateSource for LocalVectorSource {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		collection: &'a ChunkCollection,
		limit: u32,
	) -> BoxFuture<'a, Result<Retrieval>> {
		Box::pin(async move {
			let vector = self.embed_query(query).await?;

			Ok(rank_by_cosine(&vector, collection, limit))
		})
	}
}

/// Asks the vector query service for hits.
pub struct RemoteVectorSource {
	cfg: VectorQueryProviderConfig,
}
impl RemoteVectorSource {
	pub fn new(cfg: VectorQueryProviderConfig) -> Self {
		Self { cfg }
	}
}
impl CandidateSource for RemoteVectorSource {
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		collection: &'a ChunkCollection,
		limit: u32,
	) -> BoxFuture<'a, Result<Retrieval>> {
		Box::pin(async move {
			let hits = vector_query::query(&self.cfg, collection.id(), query, limit).await?;

			Ok(Retrieval {
				hits: hits
					.into_iter()
					.map(|hit| CandidateHit { hash: hit.hash, score: hit.score })
					.collect(),
				warnings: Vec::new(),
			})
		})
	}
}

/// Scores every enabled chunk that carries an embedding and keeps the best `limit`.
///
/// Chunks whose dimension differs from the query score 0 and are reported.
pub fn rank_by_cosine(query: &[f32], collection: &ChunkCollection, limit: u32) -> Retrieval {
	let mut out = Retrieval::default();

	for entry in collection.entries() {
		let chunk = &entry.chunk;

		if chunk.disabled || chunk.embedding.is_empty() {
			continue;
		}
		if chunk.embedding.len() != query.len() {
			warn!(
				hash = %chunk.hash,
				expected = query.len(),
				actual = chunk.embedding.len(),
				"Chunk embedding dimension does not match the query."
			);

			out.warnings.push(Warning::DimensionMismatch {
				hash: chunk.hash.clone(),
				expected: query.len(),
				actual: chunk.embedding.len(),
			});
			out.hits.push(CandidateHit { hash: chunk.hash.clone(), score: 0.0 });

			continue;
		}

		out.hits.push(CandidateHit {
			hash: chunk.hash.clone(),
			score: ranking::cosine_similarity(query, &chunk.embedding),
		});
	}

	out.hits.sort_by(|a, b| ranking::cmp_f32_desc(a.score, b.score));
	out.hits.truncate(limit as usize);

	out
}
