use std::collections::HashSet;

use proptest::prelude::*;
use rerag_domain::{Chunk, ChunkCollection, ChunkGroup, ChunkLink, LinkMode, SearchContext};
use rerag_ranking::{
	BoxFuture, CandidateHit, CandidateSource, PipelineOptions, Result, Retrieval, SearchMode,
	SearchResponse, SummaryMode, search,
	search::ranking::{chunk_age, cosine_similarity, decay_multiplier},
};

#[derive(Debug, Clone)]
struct ChunkSpec {
	importance: i32,
	disabled: bool,
	summary_of: Option<usize>,
	group: Option<u8>,
	link: Option<(usize, bool)>,
	score: Option<f32>,
}

struct FixedSource {
	hits: Vec<CandidateHit>,
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

fn arb_spec() -> impl Strategy<Value = ChunkSpec> {
	(
		0i32..=200,
		prop::bool::weighted(0.2),
		prop::option::weighted(0.3, 0usize..16),
		prop::option::weighted(0.4, 0u8..3),
		prop::option::weighted(0.3, (0usize..16, any::<bool>())),
		prop::option::weighted(0.8, 0.0f32..1.0),
	)
		.prop_map(|(importance, disabled, summary_of, group, link, score)| ChunkSpec {
			importance,
			disabled,
			summary_of,
			group,
			link,
			score,
		})
}

/// Spans subnormal through `f32::MAX` magnitudes.
fn arb_component() -> impl Strategy<Value = f32> {
	prop_oneof![
		Just(0.0f32),
		-1e-38f32..1e-38,
		-1.0f32..1.0,
		-1e30f32..1e30,
		-1e38f32..1e38,
		Just(f32::MAX),
		Just(-f32::MAX),
	]
}

fn arb_options() -> impl Strategy<Value = PipelineOptions> {
	(1u32..8, 0.0f32..0.6, any::<bool>(), any::<bool>(), any::<bool>(), 0u32..3).prop_map(
		|(top_k, threshold, replace, apply_groups, apply_importance, max_forced)| PipelineOptions {
			search_mode: SearchMode::Vector,
			top_k,
			threshold,
			apply_groups,
			apply_importance,
			max_forced_group_members: max_forced,
			summary_mode: if replace { SummaryMode::Replace } else { SummaryMode::Append },
			..PipelineOptions::default()
		},
	)
}

/// Summaries live on odd positions and point at even ones so no summary has a summary parent.
fn build(specs: &[ChunkSpec]) -> (ChunkCollection, FixedSource) {
	let len = specs.len();
	let mut chunks = Vec::with_capacity(len);
	let mut hits = Vec::new();

	for (idx, spec) in specs.iter().enumerate() {
		let hash = format!("c{idx}");
		let mut chunk = Chunk::new(hash.clone(), format!("text {idx}"));

		chunk.importance = spec.importance;
		chunk.disabled = spec.disabled;

		if let Some(target) = spec.summary_of
			&& idx % 2 == 1
		{
			chunk.is_summary_chunk = true;
			chunk.parent_hash = Some(format!("c{}", (target % len.div_ceil(2)) * 2));
		}
		if let Some(group) = spec.group {
			chunk.chunk_group = Some(ChunkGroup {
				name: format!("g{group}"),
				group_keywords: vec![format!("g{group}")],
			});
		}
		if let Some((target, force)) = spec.link
			&& target % len != idx
		{
			chunk.chunk_links = vec![ChunkLink {
				target_hash: format!("c{}", target % len),
				mode: if force { LinkMode::Force } else { LinkMode::Soft },
			}];
		}
		if let Some(score) = spec.score {
			hits.push(CandidateHit { hash, score });
		}

		chunks.push(chunk);
	}

	hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

	(ChunkCollection::new("lore", chunks).expect("collection"), FixedSource { hits })
}

fn run(
	query: &str,
	collection: &ChunkCollection,
	options: &PipelineOptions,
	source: &FixedSource,
) -> SearchResponse {
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_time()
		.build()
		.expect("runtime");

	runtime
		.block_on(search(query, collection, options, &SearchContext::default(), source))
		.expect("search")
}

proptest! {
	#[test]
	fn results_respect_top_k_and_never_include_disabled_chunks(
		specs in prop::collection::vec(arb_spec(), 1..16),
		options in arb_options(),
	) {
		let (collection, source) = build(&specs);
		let response = run("g0 g1 query", &collection, &options, &source);

		prop_assert!(response.results.len() <= options.top_k as usize);
		prop_assert!(response.results.iter().all(|item| !item.chunk.disabled));
		prop_assert_eq!(response.stats.returned as usize, response.results.len());
	}

	#[test]
	fn every_returned_summary_comes_with_its_parent(
		specs in prop::collection::vec(arb_spec(), 2..16),
		options in arb_options(),
	) {
		let (collection, source) = build(&specs);
		let response = run("g2 query", &collection, &options, &source);
		let returned: HashSet<_> =
			response.results.iter().map(|item| item.chunk.hash.as_str()).collect();

		for item in response.results.iter().filter(|item| item.chunk.is_summary_chunk) {
			let parent = item.chunk.parent_hash.as_deref().unwrap_or_default();

			prop_assert!(
				returned.contains(parent),
				"summary {} without parent {}",
				item.chunk.hash,
				parent
			);
		}
	}

	#[test]
	fn identical_inputs_give_identical_results(
		specs in prop::collection::vec(arb_spec(), 1..16),
		options in arb_options(),
	) {
		let (collection, source) = build(&specs);
		let first = run("g1 query", &collection, &options, &source);
		let second = run("g1 query", &collection, &options, &source);
		let ranked = |response: &SearchResponse| -> Vec<(String, f32)> {
			response.results.iter().map(|item| (item.chunk.hash.clone(), item.score)).collect()
		};
		let lhs = ranked(&first);
		let rhs = ranked(&second);

		prop_assert_eq!(lhs, rhs);
		prop_assert_eq!(first.stats, second.stats);
	}

	#[test]
	fn higher_importance_never_scores_lower(
		base in 0.0f32..1.0,
		low in 0i32..=200,
		bump in 0i32..=200,
	) {
		let high = (low + bump).min(200);
		let mut lo = Chunk::new("lo", "low");
		let mut hi = Chunk::new("hi", "high");

		lo.importance = low;
		hi.importance = high;

		let collection = ChunkCollection::new("lore", vec![lo, hi]).expect("collection");
		let source = FixedSource {
			hits: vec![
				CandidateHit { hash: "lo".to_string(), score: base },
				CandidateHit { hash: "hi".to_string(), score: base },
			],
		};
		let options = PipelineOptions {
			search_mode: SearchMode::Vector,
			threshold: 0.0,
			..PipelineOptions::default()
		};
		let response = run("query", &collection, &options, &source);
		let score_of = |hash: &str| {
			response.results.iter().find(|item| item.chunk.hash == hash).map(|item| item.score)
		};

		prop_assert!(score_of("hi").unwrap_or_default() >= score_of("lo").unwrap_or_default());
	}

	#[test]
	fn older_chunks_never_decay_less(
		current in 0u64..10_000,
		older in 0u64..10_000,
		newer in 0u64..10_000,
		half_life in 0.5f32..500.0,
	) {
		let (older, newer) = if older <= newer { (older, newer) } else { (newer, older) };
		let ctx = SearchContext { current_message_index: current, ..SearchContext::default() };
		let older_age = chunk_age(Some(older), &ctx, false).unwrap_or_default();
		let newer_age = chunk_age(Some(newer), &ctx, false).unwrap_or_default();

		prop_assert!(older_age >= newer_age);
		prop_assert!(decay_multiplier(older_age, half_life) <= decay_multiplier(newer_age, half_life));
	}

	#[test]
	fn cosine_similarity_is_bounded_and_reflexive(
		lhs in prop::collection::vec(arb_component(), 1..32),
		rhs in prop::collection::vec(arb_component(), 1..32),
	) {
		let cross = cosine_similarity(&lhs, &rhs);

		prop_assert!((-1.0..=1.0).contains(&cross));

		if lhs.iter().any(|value| *value != 0.0) {
			prop_assert!((cosine_similarity(&lhs, &lhs) - 1.0).abs() <= f32::EPSILON);
		}
	}
}
