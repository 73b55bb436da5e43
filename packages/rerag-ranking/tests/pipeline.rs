use std::time::Duration;

use rerag_domain::{
	Chunk, ChunkCollection, ChunkGroup, ChunkLink, ConditionLogic, ConditionRule, ConditionSet,
	ContextMessage, LinkMode, SearchContext,
};
use rerag_ranking::{
	BoxFuture, CandidateHit, CandidateSource, EmptyReason, Error, Inclusion, PipelineOptions,
	PipelineOverride, RankingService, Result, Retrieval, SearchMode, SearchRequest, Stage,
	SummaryMode, Warning, search,
};

const SAMPLE_CONFIG_TOML: &str = r#"
[service]
log_level = "info"

[providers.embedding]
provider_id = "local"
api_base = "http://127.0.0.1:9"
api_key = "key"
path = "/embeddings"
model = "test-embedding"
dimensions = 2
timeout_ms = 1000

[retrieval]
source = "local"
collection = "lore"

[pipeline]
search_mode = "vector"
threshold = 0.0
"#;

struct FixedSource {
	hits: Vec<CandidateHit>,
}
impl FixedSource {
	fn new(hits: &[(&str, f32)]) -> Self {
		Self {
			hits: hits
				.iter()
				.map(|(hash, score)| CandidateHit { hash: hash.to_string(), score: *score })
				.collect(),
		}
	}
}
impl CandidateSource for FixedSource {
	fn retrieve<'a>(
		&'a self,
		_query: &'a str,
		_collection: &'a ChunkCollection,
		limit: u32,
	) -> BoxFuture<'a, Result<Retrieval>> {
		let hits = self.hits.iter().take(limit as usize).cloned().collect();

		Box::pin(async move { Ok(Retrieval { hits, warnings: Vec::new() }) })
	}
}

struct FailingSource;
impl CandidateSource for FailingSource {
	fn retrieve<'a>(
		&'a self,
		_query: &'a str,
		_collection: &'a ChunkCollection,
		_limit: u32,
	) -> BoxFuture<'a, Result<Retrieval>> {
		Box::pin(async { Err(Error::Retrieval { message: "vector service unavailable".to_string() }) })
	}
}

struct SlowSource;
impl CandidateSource for SlowSource {
	fn retrieve<'a>(
		&'a self,
		_query: &'a str,
		_collection: &'a ChunkCollection,
		_limit: u32,
	) -> BoxFuture<'a, Result<Retrieval>> {
		Box::pin(async {
			tokio::time::sleep(Duration::from_secs(30)).await;

			Ok(Retrieval::default())
		})
	}
}

fn vector_options() -> PipelineOptions {
	PipelineOptions {
		search_mode: SearchMode::Vector,
		threshold: 0.0,
		..PipelineOptions::default()
	}
}

fn collection(chunks: Vec<Chunk>) -> ChunkCollection {
	ChunkCollection::new("lore", chunks).expect("collection")
}

fn with_importance(hash: &str, importance: i32) -> Chunk {
	let mut chunk = Chunk::new(hash, format!("text of {hash}"));

	chunk.importance = importance;

	chunk
}

fn grouped(hash: &str) -> Chunk {
	let mut chunk = Chunk::new(hash, format!("text of {hash}"));

	chunk.chunk_group = Some(ChunkGroup {
		name: "castle".to_string(),
		group_keywords: vec!["castle".to_string(), "ironhold".to_string()],
	});

	chunk
}

fn summary(hash: &str, parent: &str) -> Chunk {
	let mut chunk = Chunk::new(hash, format!("summary of {parent}"));

	chunk.is_summary_chunk = true;
	chunk.parent_hash = Some(parent.to_string());

	chunk
}

fn hashes(results: &[rerag_ranking::ScoredChunk]) -> Vec<&str> {
	results.iter().map(|item| item.chunk.hash.as_str()).collect()
}

#[tokio::test]
async fn importance_scales_equal_base_scores() {
	let collection = collection(vec![with_importance("low", 30), with_importance("high", 180)]);
	let source = FixedSource::new(&[("low", 0.5), ("high", 0.5)]);
	let response =
		search("query", &collection, &vector_options(), &SearchContext::default(), &source)
			.await
			.expect("search");

	assert_eq!(hashes(&response.results), vec!["high", "low"]);
	assert!((response.results[0].score - 0.9).abs() < 1e-6);
	assert!((response.results[1].score - 0.15).abs() < 1e-6);
	assert_eq!(response.results[0].original_score, 0.5);
}

#[tokio::test]
async fn threshold_keeps_only_strong_candidates() {
	let collection =
		collection(vec![Chunk::new("a", "alpha"), Chunk::new("b", "beta"), Chunk::new("c", "gamma")]);
	let source = FixedSource::new(&[("a", 0.9), ("b", 0.55), ("c", 0.3)]);
	let options = PipelineOptions { threshold: 0.6, ..vector_options() };
	let response = search("query", &collection, &options, &SearchContext::default(), &source)
		.await
		.expect("search");

	assert_eq!(hashes(&response.results), vec!["a"]);
	assert_eq!(response.stats.below_threshold, 2);
	assert_eq!(response.stats.retrieved, 3);
}

#[tokio::test]
async fn surviving_summary_brings_its_filtered_parent() {
	let collection = collection(vec![summary("S", "P"), Chunk::new("P", "the full parent text")]);
	let source = FixedSource::new(&[("S", 0.8), ("P", 0.3)]);
	let options = PipelineOptions { threshold: 0.5, ..vector_options() };
	let response = search("query", &collection, &options, &SearchContext::default(), &source)
		.await
		.expect("search");

	assert_eq!(hashes(&response.results), vec!["S", "P"]);
	assert_eq!(response.results[1].inclusion, Inclusion::SummaryParent { summary: "S".to_string() });
	assert_eq!(response.stats.parents_inserted, 1);
}

#[tokio::test]
async fn replace_mode_returns_the_parent_in_the_summary_slot() {
	let collection = collection(vec![
		summary("S", "P"),
		Chunk::new("P", "the full parent text"),
		Chunk::new("X", "other"),
	]);
	let source = FixedSource::new(&[("S", 0.8), ("X", 0.6)]);
	let options = PipelineOptions { summary_mode: SummaryMode::Replace, ..vector_options() };
	let response = search("query", &collection, &options, &SearchContext::default(), &source)
		.await
		.expect("search");

	assert_eq!(hashes(&response.results), vec!["P", "X"]);
	assert!((response.results[0].score - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn group_keywords_boost_every_member() {
	let collection =
		collection(vec![Chunk::new("tavern", "a tavern"), grouped("hall"), grouped("armory")]);
	let source = FixedSource::new(&[("tavern", 0.5), ("hall", 0.5), ("armory", 0.5)]);
	let options = PipelineOptions { group_boost_multiplier: 1.3, ..vector_options() };
	let response = search(
		"castle ironhold fortress",
		&collection,
		&options,
		&SearchContext::default(),
		&source,
	)
	.await
	.expect("search");

	assert_eq!(hashes(&response.results), vec!["hall", "armory", "tavern"]);
	assert!((response.results[0].score - 0.65).abs() < 1e-6);
	assert!((response.results[1].score - 0.65).abs() < 1e-6);
	assert_eq!(response.stats.group_boosted, 2);
}

#[tokio::test]
async fn group_enforcement_readmits_filtered_members() {
	let collection = collection(vec![grouped("hall"), grouped("armory"), Chunk::new("x", "x")]);
	let source = FixedSource::new(&[("hall", 0.9), ("x", 0.8), ("armory", 0.1)]);
	let options =
		PipelineOptions { threshold: 0.5, max_forced_group_members: 1, ..vector_options() };
	let response = search("unrelated", &collection, &options, &SearchContext::default(), &source)
		.await
		.expect("search");

	assert_eq!(hashes(&response.results), vec!["hall", "armory", "x"]);
	assert_eq!(response.stats.forced_group_members, 1);
	assert_eq!(response.results[1].inclusion, Inclusion::GroupMember { group: "castle".to_string() });
}

#[tokio::test]
async fn force_links_pull_targets_and_dangling_links_warn() {
	let mut source_chunk = Chunk::new("a", "alpha");

	source_chunk.chunk_links = vec![
		ChunkLink { target_hash: "b".to_string(), mode: LinkMode::Force },
		ChunkLink { target_hash: "ghost".to_string(), mode: LinkMode::Force },
	];

	let collection = collection(vec![source_chunk, Chunk::new("b", "beta")]);
	let source = FixedSource::new(&[("a", 0.9)]);
	let response =
		search("query", &collection, &vector_options(), &SearchContext::default(), &source)
			.await
			.expect("search");

	assert_eq!(hashes(&response.results), vec!["a", "b"]);
	assert_eq!(response.stats.links_inserted, 1);
	assert!(response.stats.warnings.contains(&Warning::DanglingLink {
		source: "a".to_string(),
		target: "ghost".to_string(),
	}));
}

#[tokio::test]
async fn retrieval_failure_is_reported_not_thrown() {
	let collection = collection(vec![Chunk::new("a", "alpha")]);
	let response =
		search("query", &collection, &vector_options(), &SearchContext::default(), &FailingSource)
			.await
			.expect("search");

	assert!(response.results.is_empty());
	assert_eq!(response.stats.empty_reason, Some(EmptyReason::RetrievalFailed));
	assert!(
		response
			.stats
			.retrieval_failure
			.as_deref()
			.is_some_and(|message| message.contains("vector service unavailable"))
	);
	assert!(response.trace.stages.is_empty());
}

#[tokio::test]
async fn retrieval_timeout_is_a_retrieval_failure() {
	let collection = collection(vec![Chunk::new("a", "alpha")]);
	let options = PipelineOptions { retrieval_timeout_ms: 20, ..vector_options() };
	let response = search("query", &collection, &options, &SearchContext::default(), &SlowSource)
		.await
		.expect("search");

	assert_eq!(response.stats.empty_reason, Some(EmptyReason::RetrievalFailed));
}

#[tokio::test]
async fn keyword_mode_never_calls_the_candidate_source() {
	let mut chunk = Chunk::new("a", "The dragon sleeps.");

	chunk.keywords = vec!["dragon".to_string()];

	let collection = collection(vec![chunk, Chunk::new("b", "beta")]);
	let options = PipelineOptions { search_mode: SearchMode::Keyword, ..vector_options() };
	let response =
		search("where is the dragon", &collection, &options, &SearchContext::default(), &FailingSource)
			.await
			.expect("search");

	assert_eq!(hashes(&response.results), vec!["a"]);
	assert_eq!(response.results[0].matched_keywords, vec!["dragon".to_string()]);
	assert_eq!(response.results[0].keyword_boost, 0.5);
}

#[tokio::test]
async fn empty_reasons_explain_empty_results() {
	let mut gated = Chunk::new("gated", "siege plans");

	gated.conditions = Some(ConditionSet {
		enabled: true,
		logic: ConditionLogic::And,
		rules: vec![ConditionRule {
			rule_type: Some("keyword".to_string()),
			value: Some("siege".to_string()),
			negate: false,
		}],
	});

	let collection = collection(vec![gated, Chunk::new("known", "already injected")]);
	let ctx = SearchContext::default();
	let cases = [
		(FixedSource::new(&[]), 0.0, EmptyReason::NoCandidates),
		(FixedSource::new(&[("known", 0.2)]), 0.5, EmptyReason::AllBelowThreshold),
		(FixedSource::new(&[("gated", 0.9)]), 0.0, EmptyReason::AllFailedConditions),
	];

	for (source, threshold, expected) in cases {
		let options = PipelineOptions { threshold, ..vector_options() };
		let response =
			search("query", &collection, &options, &ctx, &source).await.expect("search");

		assert!(response.results.is_empty());
		assert_eq!(response.stats.empty_reason, Some(expected));
	}

	let mut ctx = SearchContext::default();

	ctx.injected_hashes.insert("known".to_string());

	let response = search(
		"query",
		&collection,
		&vector_options(),
		&ctx,
		&FixedSource::new(&[("known", 0.9)]),
	)
	.await
	.expect("search");

	assert_eq!(response.stats.empty_reason, Some(EmptyReason::AllInContext));
	assert_eq!(response.stats.skipped_duplicates, 1);
}

#[tokio::test]
async fn conditions_see_the_recent_message_window() {
	let mut gated = Chunk::new("gated", "siege plans");

	gated.conditions = Some(ConditionSet {
		enabled: true,
		logic: ConditionLogic::Or,
		rules: vec![ConditionRule {
			rule_type: Some("keyword".to_string()),
			value: Some("/sieg(e|ing)/i".to_string()),
			negate: false,
		}],
	});

	let collection = collection(vec![gated]);
	let ctx = SearchContext {
		messages: vec![
			ContextMessage::new(Some("Aria"), "The Sieging army arrives."),
			ContextMessage::new(Some("Bram"), "We should rest."),
		],
		..SearchContext::default()
	};
	let source = FixedSource::new(&[("gated", 0.9)]);
	let wide = PipelineOptions { context_window: 2, ..vector_options() };
	let narrow = PipelineOptions { context_window: 1, ..vector_options() };

	assert_eq!(
		search("q", &collection, &wide, &ctx, &source).await.expect("search").results.len(),
		1
	);
	assert_eq!(
		search("q", &collection, &narrow, &ctx, &source).await.expect("search").stats.failed_conditions,
		1
	);
}

#[tokio::test]
async fn decay_dampens_old_chunks_when_enabled() {
	let mut old = Chunk::new("old", "old news");
	let mut fresh = Chunk::new("fresh", "fresh news");

	old.message_index = Some(0);
	fresh.message_index = Some(95);

	let collection = collection(vec![old, fresh]);
	let ctx = SearchContext { current_message_index: 100, ..SearchContext::default() };
	let source = FixedSource::new(&[("old", 0.9), ("fresh", 0.6)]);
	let mut options = PipelineOptions { apply_decay: true, ..vector_options() };

	options.decay.enabled = true;
	options.decay.half_life = 50.0;

	let response = search("q", &collection, &options, &ctx, &source).await.expect("search");

	assert_eq!(hashes(&response.results), vec!["fresh", "old"]);
	assert!((response.results[1].decay_multiplier - 0.25).abs() < 1e-6);
	assert_eq!(response.stats.decay_applied, 2);
	assert!(response.trace.stage(Stage::Decay).is_some());

	options.apply_decay = false;

	let response = search("q", &collection, &options, &ctx, &source).await.expect("search");

	assert_eq!(hashes(&response.results), vec!["old", "fresh"]);
	assert!(!response.results[0].decay_applied);
}

#[tokio::test]
async fn orphaned_summaries_are_excluded_with_a_warning() {
	let collection = collection(vec![summary("S", "missing"), Chunk::new("a", "alpha")]);
	let source = FixedSource::new(&[("S", 0.9), ("a", 0.5)]);
	let response =
		search("q", &collection, &vector_options(), &SearchContext::default(), &source)
			.await
			.expect("search");

	assert_eq!(hashes(&response.results), vec!["a"]);
	assert!(matches!(
		response.stats.warnings.as_slice(),
		[Warning::OrphanedSummary { hash, .. }] if hash == "S"
	));
}

#[tokio::test]
async fn invalid_options_are_rejected_before_any_stage() {
	let collection = collection(vec![Chunk::new("a", "alpha")]);
	let options = PipelineOptions { threshold: 1.5, ..vector_options() };
	let err = search("q", &collection, &options, &SearchContext::default(), &FailingSource)
		.await
		.expect_err("invalid threshold");

	assert!(matches!(err, Error::InvalidConfiguration { .. }));
}

#[tokio::test]
async fn repeated_runs_are_identical_and_traced() {
	let collection = collection(
		(0..12).map(|idx| with_importance(&format!("c{idx}"), 50 + idx * 10)).collect(),
	);
	let hits: Vec<(String, f32)> =
		(0..12).map(|idx| (format!("c{idx}"), 0.5 + (idx % 3) as f32 * 0.1)).collect();
	let hit_refs: Vec<(&str, f32)> =
		hits.iter().map(|(hash, score)| (hash.as_str(), *score)).collect();
	let source = FixedSource::new(&hit_refs);
	let options = PipelineOptions { top_k: 4, ..vector_options() };
	let first = search("q", &collection, &options, &SearchContext::default(), &source)
		.await
		.expect("search");
	let second = search("q", &collection, &options, &SearchContext::default(), &source)
		.await
		.expect("search");

	assert_eq!(hashes(&first.results), hashes(&second.results));
	assert_eq!(first.results.len(), 4);
	assert_eq!(first.stats.truncated, 8);
	assert_eq!(first.trace.options_hash, second.trace.options_hash);
	assert_eq!(first.trace.options_hash.len(), 64);
	assert_eq!(
		first.trace.stages.last().map(|snapshot| snapshot.stage),
		Some(Stage::Selection)
	);
}

#[tokio::test]
async fn service_layers_request_overrides_over_config() {
	let cfg = rerag_config::from_str(SAMPLE_CONFIG_TOML).expect("config");
	let collection =
		collection(vec![Chunk::new("a", "alpha"), Chunk::new("b", "beta"), Chunk::new("c", "gamma")]);
	let service = RankingService::with_source(
		cfg,
		std::sync::Arc::new(FixedSource::new(&[("a", 0.9), ("b", 0.8), ("c", 0.7)])),
	);
	let response = service
		.search(
			&collection,
			SearchRequest {
				query: "q".to_string(),
				ranking: Some(PipelineOverride { top_k: Some(2), ..PipelineOverride::default() }),
				..SearchRequest::default()
			},
		)
		.await
		.expect("search");

	assert_eq!(hashes(&response.results), vec!["a", "b"]);

	let err = service
		.search(
			&collection,
			SearchRequest {
				query: "q".to_string(),
				ranking: Some(PipelineOverride {
					search_mode: Some("semantic".to_string()),
					..PipelineOverride::default()
				}),
				..SearchRequest::default()
			},
		)
		.await
		.expect_err("unknown mode");

	assert!(matches!(err, Error::InvalidConfiguration { .. }));
}

#[test]
fn service_builds_sources_from_config() {
	let cfg = rerag_config::from_str(SAMPLE_CONFIG_TOML).expect("config");

	assert!(RankingService::new(cfg).is_ok());

	let remote = SAMPLE_CONFIG_TOML.replace("source = \"local\"", "source = \"remote\"");

	assert!(rerag_config::from_str(&remote).is_err());
}
