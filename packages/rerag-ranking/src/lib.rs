pub mod cache;
pub mod options;
pub mod retrieval;
pub mod search;
pub mod stats;
pub mod trace;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

pub use error::{Error, Result};
pub use options::{
	DecayOverride, DecaySettings, PipelineOptions, PipelineOverride, SearchMode, SummaryMode,
};
pub use retrieval::{CandidateHit, LocalVectorSource, RemoteVectorSource, Retrieval};
pub use search::{Inclusion, ScoredChunk, SearchResponse, search};
pub use stats::{EmptyReason, SearchStats, Warning};
pub use trace::{Fate, Stage, Trace};

use cache::{EmbeddingCache, MokaEmbeddingCache};
use rerag_config::{Config, EmbeddingProviderConfig};
use rerag_domain::{ChunkCollection, SearchContext};
use rerag_providers::embedding;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// Produces the initial relevance score per chunk. The only suspension point of a search.
pub trait CandidateSource
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		query: &'a str,
		collection: &'a ChunkCollection,
		limit: u32,
	) -> BoxFuture<'a, Result<Retrieval>>;
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
	pub query: String,
	pub context: SearchContext,
	pub ranking: Option<PipelineOverride>,
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}

/// Configured defaults plus the candidate source chosen for this deployment.
pub struct RankingService {
	pub cfg: Config,
	pub source: Arc<dyn CandidateSource>,
}
impl RankingService {
	/// Builds the source named by `retrieval.source`, with the embedding cache for local sources.
	pub fn new(cfg: Config) -> Result<Self> {
		let source: Arc<dyn CandidateSource> = match cfg.retrieval.source.as_str() {
			"local" => {
				let mut local = LocalVectorSource::new(
					Arc::new(DefaultProviders),
					cfg.providers.embedding.clone(),
				);

				if let Some(cache) = MokaEmbeddingCache::from_config(&cfg.cache) {
					let cache: Arc<dyn EmbeddingCache> = Arc::new(cache);

					local = local.with_cache(cache);
				}

				Arc::new(local)
			},
			"remote" => {
				let Some(provider) = cfg.providers.vector_query.clone() else {
					return Err(Error::InvalidConfiguration {
						message: "providers.vector_query is required when retrieval.source is remote."
							.to_string(),
					});
				};

				Arc::new(RemoteVectorSource::new(provider))
			},
			other => {
				return Err(Error::InvalidConfiguration {
					message: format!("retrieval.source must be one of local or remote. Got {other}."),
				});
			},
		};

		Ok(Self { cfg, source })
	}

	pub fn with_source(cfg: Config, source: Arc<dyn CandidateSource>) -> Self {
		Self { cfg, source }
	}

	pub async fn search(
		&self,
		collection: &ChunkCollection,
		req: SearchRequest,
	) -> Result<SearchResponse> {
		let options = PipelineOptions::resolve(&self.cfg.pipeline, req.ranking.as_ref())?;

		search::search(&req.query, collection, &options, &req.context, self.source.as_ref()).await
	}
}
