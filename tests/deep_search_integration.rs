//! Deep search pipeline with scripted search, generation and scoring backends

use async_trait::async_trait;
use deepsearch::decompose::{QueryDecomposer, SequenceGenerator};
use deepsearch::knowledge::{PassageSearch, SearchParams};
use deepsearch::retrieval::{DeepSearchOrchestrator, OrchestratorConfig, PassageResult, Scorer};
use deepsearch::{DeepSearchError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Generator that returns a fixed completion, or fails
struct ScriptedGenerator {
    output: Option<String>,
}

impl ScriptedGenerator {
    fn with_sub_queries(subs: &[&str]) -> Self {
        let output = subs
            .iter()
            .enumerate()
            .map(|(i, q)| format!("<|sub{}_start|>{}<|sub{}_end|>", i, q, i))
            .collect::<String>()
            + "<|deep_search_end|>";
        Self {
            output: Some(output),
        }
    }

    fn failing() -> Self {
        Self { output: None }
    }
}

#[async_trait]
impl SequenceGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, _stop: &str, _max: usize) -> Result<String> {
        self.output
            .clone()
            .ok_or_else(|| DeepSearchError::Generation("model offline".to_string()))
    }
}

enum Reply {
    Passages(Vec<PassageResult>),
    Fail,
    Delay(Duration, Vec<PassageResult>),
}

/// Search backend answering per query from a script
struct ScriptedSearch {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    fn new(replies: Vec<(&str, Reply)>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|(q, r)| (q.to_string(), r))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PassageSearch for ScriptedSearch {
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<PassageResult>> {
        params.validate(query)?;
        self.calls.lock().unwrap().push(query.to_string());

        match self.replies.get(query) {
            Some(Reply::Passages(passages)) => Ok(passages.clone()),
            Some(Reply::Delay(delay, passages)) => {
                tokio::time::sleep(*delay).await;
                Ok(passages.clone())
            }
            Some(Reply::Fail) | None => Err(DeepSearchError::SearchRequest {
                status: Some(500),
                body: format!("no reply scripted for {}", query),
            }),
        }
    }
}

/// Scores passages by length unless fixed scores are given
struct FixedScorer {
    scores: Option<Vec<f64>>,
}

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f64>> {
        Ok(match &self.scores {
            Some(scores) => scores.clone(),
            None => passages.iter().map(|p| p.len() as f64).collect(),
        })
    }
}

fn passage(content: &str, score: f64) -> PassageResult {
    PassageResult::new(content, Some(score))
}

fn orchestrator(
    search: Arc<ScriptedSearch>,
    generator: ScriptedGenerator,
    config: OrchestratorConfig,
) -> DeepSearchOrchestrator {
    DeepSearchOrchestrator::new(search, QueryDecomposer::new(Arc::new(generator)), config)
}

#[tokio::test]
async fn test_perfume_query_end_to_end() {
    let search = Arc::new(ScriptedSearch::new(vec![
        (
            "perfume scent longevity",
            Reply::Passages(vec![
                passage("Lasts all day on skin", 0.91),
                passage("Fades within an hour", 0.74),
                passage("Strong floral notes", 0.55),
            ]),
        ),
        (
            "perfume smell reviews",
            Reply::Passages(vec![
                passage("Strong floral notes", 0.81),
                passage("Smells like fresh roses", 0.77),
                passage("Too sweet for me", 0.32),
            ]),
        ),
        (
            "perfume fragrance notes",
            Reply::Passages(vec![
                passage("Top notes of citrus", 0.66),
                passage("Lasts all day on skin", 0.40),
            ]),
        ),
    ]));
    let generator = ScriptedGenerator::with_sub_queries(&[
        "perfume scent longevity",
        "perfume smell reviews",
        "perfume fragrance notes",
    ]);

    let results = orchestrator(search.clone(), generator, OrchestratorConfig::default())
        .deep_search("smell of the perfume", 5)
        .await
        .unwrap();

    let contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Lasts all day on skin",
            "Strong floral notes",
            "Smells like fresh roses",
            "Fades within an hour",
            "Top notes of citrus",
        ]
    );
    assert_eq!(results.iter().next().unwrap().score, Some(0.91));
    assert_eq!(results.iter().nth(1).unwrap().score, Some(0.81));

    let mut calls = search.calls();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            "perfume fragrance notes",
            "perfume scent longevity",
            "perfume smell reviews",
        ]
    );
}

#[tokio::test]
async fn test_two_sub_queries_fill_top_k_without_duplicates() {
    let search = Arc::new(ScriptedSearch::new(vec![
        (
            "perfume scent",
            Reply::Passages(vec![
                passage("Sweet vanilla finish", 0.88),
                passage("Light and airy", 0.52),
                passage("Reminds me of rain", 0.47),
            ]),
        ),
        (
            "perfume smell",
            Reply::Passages(vec![
                passage("Sweet vanilla finish", 0.93),
                passage("Headache inducing", 0.61),
                passage("Barely noticeable", 0.12),
            ]),
        ),
    ]));

    let results = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["perfume scent", "perfume smell"]),
        OrchestratorConfig::default(),
    )
    .deep_search("smell of the perfume", 5)
    .await
    .unwrap();

    assert_eq!(results.len(), 5);
    let scores: Vec<f64> = results.iter().filter_map(|p| p.score).collect();
    assert_eq!(scores, vec![0.93, 0.61, 0.52, 0.47, 0.12]);

    let mut contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    contents.sort();
    contents.dedup();
    assert_eq!(contents.len(), 5);
}

#[tokio::test]
async fn test_partial_failure_keeps_successful_results() {
    let search = Arc::new(ScriptedSearch::new(vec![
        ("a", Reply::Passages(vec![passage("from a", 0.9)])),
        ("b", Reply::Passages(vec![passage("from b", 0.8)])),
        ("c", Reply::Fail),
        ("d", Reply::Passages(vec![passage("from d", 0.7)])),
        ("e", Reply::Fail),
    ]));
    let generator = ScriptedGenerator::with_sub_queries(&["a", "b", "c", "d", "e"]);

    let results = orchestrator(search.clone(), generator, OrchestratorConfig::default())
        .deep_search("letters", 10)
        .await
        .unwrap();

    let contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["from a", "from b", "from d"]);
    assert_eq!(search.calls().len(), 5);
}

#[tokio::test]
async fn test_all_failed() {
    let search = Arc::new(ScriptedSearch::new(vec![
        ("a", Reply::Fail),
        ("b", Reply::Fail),
        ("c", Reply::Fail),
    ]));
    let generator = ScriptedGenerator::with_sub_queries(&["a", "b", "c"]);

    let err = orchestrator(search, generator, OrchestratorConfig::default())
        .deep_search("letters", 10)
        .await
        .unwrap_err();
    assert!(matches!(err, DeepSearchError::AllSearchesFailed { attempted: 3 }));
}

#[tokio::test]
async fn test_generation_failure_falls_back_to_original_query() {
    let search = Arc::new(ScriptedSearch::new(vec![(
        "smell of the perfume",
        Reply::Passages(vec![passage("direct hit", 0.5)]),
    )]));

    let results = orchestrator(
        search.clone(),
        ScriptedGenerator::failing(),
        OrchestratorConfig::default(),
    )
    .deep_search("smell of the perfume", 5)
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(search.calls(), vec!["smell of the perfume"]);
}

#[tokio::test]
async fn test_no_sub_queries_falls_back_to_original_query() {
    let search = Arc::new(ScriptedSearch::new(vec![(
        "plain question",
        Reply::Passages(vec![passage("answer", 0.5)]),
    )]));

    let results = orchestrator(
        search.clone(),
        ScriptedGenerator::with_sub_queries(&[]),
        OrchestratorConfig::default(),
    )
    .deep_search("plain question", 5)
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(search.calls(), vec!["plain question"]);
}

#[tokio::test]
async fn test_slow_sub_query_hits_call_timeout() {
    let search = Arc::new(ScriptedSearch::new(vec![
        ("fast", Reply::Passages(vec![passage("quick", 0.4)])),
        (
            "slow",
            Reply::Delay(Duration::from_secs(5), vec![passage("too late", 0.99)]),
        ),
    ]));
    let config = OrchestratorConfig {
        call_timeout: Duration::from_millis(100),
        ..Default::default()
    };

    let started = Instant::now();
    let results = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["fast", "slow"]),
        config,
    )
    .deep_search("speed", 5)
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    let contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["quick"]);
}

#[tokio::test]
async fn test_request_deadline_returns_completed_results() {
    let search = Arc::new(ScriptedSearch::new(vec![
        ("fast", Reply::Passages(vec![passage("quick", 0.4)])),
        (
            "slow",
            Reply::Delay(Duration::from_secs(5), vec![passage("too late", 0.99)]),
        ),
    ]));
    let config = OrchestratorConfig {
        call_timeout: Duration::from_secs(30),
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    };

    let started = Instant::now();
    let results = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["fast", "slow"]),
        config,
    )
    .deep_search("speed", 5)
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(results.len(), 1);
    assert_eq!(results.iter().next().unwrap().content, "quick");
}

#[tokio::test]
async fn test_ties_follow_sub_query_order_not_completion_order() {
    let search = Arc::new(ScriptedSearch::new(vec![
        (
            "first",
            Reply::Delay(
                Duration::from_millis(150),
                vec![PassageResult::new("from first", None)],
            ),
        ),
        (
            "second",
            Reply::Passages(vec![PassageResult::new("from second", None)]),
        ),
    ]));

    let results = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["first", "second"]),
        OrchestratorConfig::default(),
    )
    .deep_search("order", 5)
    .await
    .unwrap();

    let contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["from first", "from second"]);
}

#[tokio::test]
async fn test_rerank_replaces_retrieval_scores() {
    let search = Arc::new(ScriptedSearch::new(vec![
        (
            "a",
            Reply::Passages(vec![
                passage("short", 0.9).with_source("s-1"),
                passage("a much longer passage", 0.1),
            ]),
        ),
        ("b", Reply::Passages(vec![passage("medium text", 0.5)])),
    ]));

    let results = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["a", "b"]),
        OrchestratorConfig::default(),
    )
    .with_scorer(Arc::new(FixedScorer { scores: None }))
    .deep_search("lengths", 2)
    .await
    .unwrap();

    let contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["a much longer passage", "medium text"]);
    assert_eq!(results.iter().next().unwrap().score, Some(21.0));
}

#[tokio::test]
async fn test_rerank_keeps_source_ids() {
    let search = Arc::new(ScriptedSearch::new(vec![(
        "a",
        Reply::Passages(vec![
            passage("first", 0.9).with_source("s-1"),
            passage("second", 0.1).with_source("s-2"),
        ]),
    )]));

    let results = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["a"]),
        OrchestratorConfig::default(),
    )
    .with_scorer(Arc::new(FixedScorer {
        scores: Some(vec![0.2, 0.8]),
    }))
    .deep_search("ids", 5)
    .await
    .unwrap();

    let pairs: Vec<(&str, Option<&str>)> = results
        .iter()
        .map(|p| (p.content.as_str(), p.source_id.as_deref()))
        .collect();
    assert_eq!(pairs, vec![("second", Some("s-2")), ("first", Some("s-1"))]);
}

#[tokio::test]
async fn test_rerank_mismatch_propagates() {
    let search = Arc::new(ScriptedSearch::new(vec![(
        "a",
        Reply::Passages(vec![passage("one", 0.9), passage("two", 0.8)]),
    )]));

    let err = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&["a"]),
        OrchestratorConfig::default(),
    )
    .with_scorer(Arc::new(FixedScorer {
        scores: Some(vec![0.5]),
    }))
    .deep_search("mismatch", 5)
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        DeepSearchError::RerankMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn test_plain_search_has_no_fan_out() {
    let search = Arc::new(ScriptedSearch::new(vec![(
        "smell of the perfume",
        Reply::Passages(vec![
            passage("low", 0.1),
            passage("high", 0.9),
            passage("high", 0.3),
        ]),
    )]));

    let results = orchestrator(
        search.clone(),
        ScriptedGenerator::with_sub_queries(&["unused"]),
        OrchestratorConfig::default(),
    )
    .search("smell of the perfume", 5)
    .await
    .unwrap();

    let contents: Vec<&str> = results.iter().map(|p| p.content.as_str()).collect();
    assert_eq!(contents, vec!["high", "low"]);
    assert_eq!(search.calls(), vec!["smell of the perfume"]);
}

#[tokio::test]
async fn test_plain_search_failure_propagates() {
    let search = Arc::new(ScriptedSearch::new(vec![("q", Reply::Fail)]));

    let err = orchestrator(
        search,
        ScriptedGenerator::with_sub_queries(&[]),
        OrchestratorConfig::default(),
    )
    .search("q", 5)
    .await
    .unwrap_err();
    assert!(matches!(err, DeepSearchError::SearchRequest { .. }));
}
