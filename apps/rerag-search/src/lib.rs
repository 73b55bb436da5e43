use std::{
	fs,
	path::{Path, PathBuf},
};

use clap::Parser;
use color_eyre::eyre;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rerag_config::Config;
use rerag_domain::{ChunkCollection, SearchContext};
use rerag_ranking::{
	Inclusion, PipelineOverride, RankingService, ScoredChunk, SearchRequest, SearchStats, Trace,
};

#[derive(Debug, Parser)]
#[command(
	version = rerag_cli::VERSION,
	rename_all = "kebab",
	styles = rerag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSON array of chunks, in load order.
	#[arg(long, value_name = "FILE")]
	pub chunks: PathBuf,
	#[arg(long, short = 'q', value_name = "TEXT")]
	pub query: String,
	/// JSON search context: recent messages, active speakers, scenes, injected hashes.
	#[arg(long, value_name = "FILE")]
	pub context: Option<PathBuf>,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "N")]
	pub candidate_k: Option<u32>,
	#[arg(long, value_name = "F")]
	pub threshold: Option<f32>,
	#[arg(long, value_name = "MODE")]
	pub mode: Option<String>,
	#[arg(long, value_name = "MODE")]
	pub summary_mode: Option<String>,
	/// Include the per-stage diagnostic trace in the output.
	#[arg(long)]
	pub trace: bool,
}
impl Args {
	fn ranking_override(&self) -> Option<PipelineOverride> {
		if self.top_k.is_none()
			&& self.candidate_k.is_none()
			&& self.threshold.is_none()
			&& self.mode.is_none()
			&& self.summary_mode.is_none()
		{
			return None;
		}

		Some(PipelineOverride {
			search_mode: self.mode.clone(),
			top_k: self.top_k,
			candidate_k: self.candidate_k,
			threshold: self.threshold,
			summary_mode: self.summary_mode.clone(),
			..PipelineOverride::default()
		})
	}
}

#[derive(Debug, Serialize)]
struct SearchOutput {
	query: String,
	collection: String,
	results: Vec<ResultView>,
	stats: SearchStats,
	#[serde(skip_serializing_if = "Option::is_none")]
	trace: Option<Trace>,
}

/// A returned chunk without its embedding.
#[derive(Debug, Serialize)]
struct ResultView {
	hash: String,
	score: f32,
	original_score: f32,
	vector_score: f32,
	keyword_score: f32,
	importance_multiplier: f32,
	group_multiplier: f32,
	decay_multiplier: f32,
	matched_keywords: Vec<String>,
	is_summary_chunk: bool,
	inclusion: Inclusion,
	text: String,
}
impl From<ScoredChunk> for ResultView {
	fn from(item: ScoredChunk) -> Self {
		Self {
			hash: item.chunk.hash,
			score: item.score,
			original_score: item.original_score,
			vector_score: item.vector_score,
			keyword_score: item.keyword_score,
			importance_multiplier: item.importance_multiplier,
			group_multiplier: item.group_multiplier,
			decay_multiplier: item.decay_multiplier,
			matched_keywords: item.matched_keywords,
			is_summary_chunk: item.chunk.is_summary_chunk,
			inclusion: item.inclusion,
			text: item.chunk.text,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = rerag_config::load(&args.config)?;

	init_tracing(&config)?;

	let raw_chunks = fs::read_to_string(&args.chunks).map_err(|err| {
		eyre::eyre!("Failed to read chunks file {}: {err}", args.chunks.display())
	})?;
	let collection = ChunkCollection::from_json(config.retrieval.collection.clone(), &raw_chunks)?;
	let context = match args.context.as_ref() {
		Some(path) => load_context(path)?,
		None => SearchContext::default(),
	};

	info!(collection = collection.id(), chunks = collection.len(), "Chunk collection loaded.");

	let service = RankingService::new(config)?;
	let request = SearchRequest {
		query: args.query.clone(),
		context,
		ranking: args.ranking_override(),
	};
	let response = service.search(&collection, request).await?;
	let output = SearchOutput {
		query: args.query,
		collection: collection.id().to_string(),
		results: response.results.into_iter().map(ResultView::from).collect(),
		stats: response.stats,
		trace: args.trace.then_some(response.trace),
	};
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_context(path: &Path) -> color_eyre::Result<SearchContext> {
	let raw = fs::read_to_string(path)
		.map_err(|err| eyre::eyre!("Failed to read context file {}: {err}", path.display()))?;
	let context = serde_json::from_str(&raw)
		.map_err(|err| eyre::eyre!("Failed to parse context file {}: {err}", path.display()))?;

	Ok(context)
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init()
		.map_err(|err| eyre::eyre!("Failed to initialize tracing: {err}"))?;

	Ok(())
}
