//! Deep search pipeline: decompose, fan out, aggregate

use crate::config::Config;
use crate::decompose::{HttpSequenceGenerator, QueryDecomposer};
use crate::error::{DeepSearchError, Result};
use crate::knowledge::{KnowledgeBaseClient, PassageSearch, RerankClient, SearchClient, SearchParams};
use crate::retrieval::{rerank, PassageResult, ResultAggregator, ResultSet, Scorer};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Stages a deep search request moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Decomposing,
    FanningOut,
    Aggregating,
    Done,
    Failed,
}

/// Orchestrator settings, resolved from the config file
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub collection_name: String,
    pub dense_weight: f32,
    pub rerank_switch: bool,
    /// Sub-query searches allowed in flight at once
    pub max_concurrency: usize,
    /// Bound on each sub-query search, measured from when it starts running
    pub call_timeout: Duration,
    /// Bound on the whole fan-out stage
    pub request_timeout: Duration,
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            collection_name: config.knowledge_base.collection_name.clone(),
            dense_weight: config.search.dense_weight,
            rerank_switch: config.search.rerank_switch,
            max_concurrency: config.deep_search.max_concurrency,
            call_timeout: config.deep_search.call_timeout()?,
            request_timeout: config.deep_search.request_timeout()?,
        })
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            collection_name: "RAG".to_string(),
            dense_weight: 0.7,
            rerank_switch: false,
            max_concurrency: 5,
            call_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Composes decomposition, concurrent search, optional rerank and merging
#[derive(Clone)]
pub struct DeepSearchOrchestrator {
    searcher: Arc<dyn PassageSearch>,
    decomposer: QueryDecomposer,
    scorer: Option<Arc<dyn Scorer>>,
    config: OrchestratorConfig,
}

impl DeepSearchOrchestrator {
    pub fn new(
        searcher: Arc<dyn PassageSearch>,
        decomposer: QueryDecomposer,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            searcher,
            decomposer,
            scorer: None,
            config,
        }
    }

    /// Rescore merged deep search results with `scorer`
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Wire up the remote clients described by `config`
    ///
    /// Fails with `AuthConfig` when the knowledge-base credential is incomplete.
    pub fn from_config(config: &Config) -> Result<Self> {
        let kb = KnowledgeBaseClient::from_config(&config.knowledge_base)?;
        let searcher = SearchClient::new(kb.clone(), config.knowledge_base.project.clone())?;

        let generator = HttpSequenceGenerator::new(&config.generator)?;
        let decomposer = QueryDecomposer::new(Arc::new(generator))
            .with_max_new_tokens(config.generator.max_new_tokens);

        let orchestrator = Self::new(
            Arc::new(searcher),
            decomposer,
            OrchestratorConfig::from_config(config)?,
        );

        if config.deep_search.rerank {
            Ok(orchestrator.with_scorer(Arc::new(RerankClient::new(kb))))
        } else {
            Ok(orchestrator)
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn params(&self, top_k: usize) -> SearchParams {
        SearchParams {
            collection_name: self.config.collection_name.clone(),
            limit: top_k.max(1),
            rerank_switch: self.config.rerank_switch,
            dense_weight: self.config.dense_weight,
        }
    }

    /// Plain search: one request, no decomposition or fan-out
    pub async fn search(&self, query: &str, top_k: usize) -> Result<ResultSet> {
        let passages = self.searcher.search(query, &self.params(top_k)).await?;
        let results = ResultAggregator::merge(vec![passages], top_k);
        tracing::info!(query, results = results.len(), "Search completed");
        Ok(results)
    }

    /// Full deep search pipeline
    pub async fn deep_search(&self, query: &str, top_k: usize) -> Result<ResultSet> {
        let started = Instant::now();

        match self.run_deep_search(query, top_k).await {
            Ok(results) => {
                tracing::debug!(stage = ?PipelineStage::Done, "Deep search stage");
                tracing::info!(
                    query,
                    results = results.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Deep search completed"
                );
                Ok(results)
            }
            Err(e) => {
                tracing::debug!(stage = ?PipelineStage::Failed, error = %e, "Deep search stage");
                Err(e)
            }
        }
    }

    async fn run_deep_search(&self, query: &str, top_k: usize) -> Result<ResultSet> {
        if query.trim().is_empty() {
            return Err(DeepSearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        tracing::debug!(stage = ?PipelineStage::Decomposing, "Deep search stage");
        let sub_queries = self.sub_queries(query).await?;

        tracing::debug!(
            stage = ?PipelineStage::FanningOut,
            sub_queries = sub_queries.len(),
            "Deep search stage"
        );
        let result_sets = self.fan_out(&sub_queries, top_k).await?;

        tracing::debug!(stage = ?PipelineStage::Aggregating, "Deep search stage");
        match &self.scorer {
            Some(scorer) => self.rerank_merged(scorer.as_ref(), query, result_sets, top_k).await,
            None => Ok(ResultAggregator::merge(result_sets, top_k)),
        }
    }

    /// Decompose, falling back to the original query when nothing usable comes back
    async fn sub_queries(&self, query: &str) -> Result<Vec<String>> {
        match self.decomposer.decompose(query).await {
            Ok(subs) if !subs.is_empty() => {
                tracing::info!(query, sub_queries = ?subs, "Query decomposed");
                Ok(subs)
            }
            Ok(_) => {
                tracing::warn!(query, "Decomposition produced no sub-queries, using original query");
                Ok(vec![query.to_string()])
            }
            Err(DeepSearchError::Generation(reason)) => {
                tracing::warn!(query, %reason, "Decomposition failed, using original query");
                Ok(vec![query.to_string()])
            }
            Err(e) => Err(e),
        }
    }

    /// Run one search per sub-query under the concurrency cap and deadline
    ///
    /// Returned sets are in sub-query order regardless of completion order.
    async fn fan_out(&self, sub_queries: &[String], top_k: usize) -> Result<Vec<Vec<PassageResult>>> {
        let params = self.params(top_k);
        let semaphore = Semaphore::new(self.config.max_concurrency.max(1));
        let call_timeout = self.config.call_timeout;

        let mut pending: FuturesUnordered<_> = sub_queries
            .iter()
            .enumerate()
            .map(|(idx, sub_query)| {
                let semaphore = &semaphore;
                let params = &params;
                async move {
                    let outcome = match semaphore.acquire().await {
                        Ok(_permit) => {
                            match tokio::time::timeout(
                                call_timeout,
                                self.searcher.search(sub_query, params),
                            )
                            .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(DeepSearchError::SearchRequest {
                                    status: None,
                                    body: format!(
                                        "timed out after {}ms",
                                        call_timeout.as_millis()
                                    ),
                                }),
                            }
                        }
                        Err(e) => Err(DeepSearchError::Other(e.into())),
                    };
                    (idx, outcome)
                }
            })
            .collect();

        let deadline = tokio::time::sleep(self.config.request_timeout);
        tokio::pin!(deadline);

        let mut collected: Vec<(usize, Vec<PassageResult>)> = Vec::with_capacity(sub_queries.len());
        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((idx, Ok(passages))) => collected.push((idx, passages)),
                    Some((idx, Err(e))) if e.is_recoverable() => {
                        tracing::warn!(
                            sub_query = %sub_queries[idx],
                            error = %e,
                            "Sub-query search failed, excluding from results"
                        );
                    }
                    Some((idx, Err(e))) => {
                        tracing::error!(
                            sub_query = %sub_queries[idx],
                            error = %e,
                            "Sub-query search rejected, excluding from results"
                        );
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        pending = pending.len(),
                        completed = collected.len(),
                        "Deep search deadline reached, cancelling pending searches"
                    );
                    break;
                }
            }
        }
        drop(pending);

        if collected.is_empty() {
            return Err(DeepSearchError::AllSearchesFailed {
                attempted: sub_queries.len(),
            });
        }

        collected.sort_by_key(|(idx, _)| *idx);
        Ok(collected.into_iter().map(|(_, passages)| passages).collect())
    }

    async fn rerank_merged(
        &self,
        scorer: &dyn Scorer,
        query: &str,
        result_sets: Vec<Vec<PassageResult>>,
        top_k: usize,
    ) -> Result<ResultSet> {
        let merged = ResultAggregator::merge(result_sets, usize::MAX);

        let mut sources: HashMap<String, Option<String>> = HashMap::with_capacity(merged.len());
        let texts: Vec<String> = merged
            .into_iter()
            .map(|passage| {
                sources.insert(passage.content.clone(), passage.source_id);
                passage.content
            })
            .collect();

        let ranked = rerank(scorer, query, &texts).await?;

        let results = ranked
            .into_iter()
            .take(top_k)
            .map(|r| PassageResult {
                source_id: sources.remove(&r.content).flatten(),
                score: Some(r.score),
                content: r.content,
            })
            .collect();

        Ok(ResultSet { results })
    }
}

impl std::fmt::Debug for DeepSearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSearchOrchestrator")
            .field("config", &self.config)
            .field("rerank", &self.scorer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::SequenceGenerator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticGenerator(&'static str);

    #[async_trait]
    impl SequenceGenerator for StaticGenerator {
        async fn generate(&self, _prompt: &str, _stop: &str, _max: usize) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Tracks the highest number of searches running at once
    struct GaugedSearch {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PassageSearch for GaugedSearch {
        async fn search(&self, query: &str, _params: &SearchParams) -> Result<Vec<PassageResult>> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![PassageResult::new(format!("about {}", query), Some(0.5))])
        }
    }

    fn five_sub_queries() -> StaticGenerator {
        StaticGenerator(
            "<|sub0_start|>a<|sub0_end|><|sub1_start|>b<|sub1_end|><|sub2_start|>c<|sub2_end|>\
             <|sub3_start|>d<|sub3_end|><|sub4_start|>e<|sub4_end|>",
        )
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_cap() {
        let search = Arc::new(GaugedSearch {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let config = OrchestratorConfig {
            max_concurrency: 2,
            ..Default::default()
        };
        let orchestrator = DeepSearchOrchestrator::new(
            search.clone(),
            QueryDecomposer::new(Arc::new(five_sub_queries())),
            config,
        );

        let results = orchestrator.deep_search("letters", 10).await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(search.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let orchestrator = DeepSearchOrchestrator::new(
            Arc::new(GaugedSearch {
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
            QueryDecomposer::new(Arc::new(five_sub_queries())),
            OrchestratorConfig::default(),
        );
        let result = orchestrator.deep_search(" ", 5).await;
        assert!(matches!(result, Err(DeepSearchError::InvalidInput(_))));
    }

    #[test]
    fn test_orchestrator_config_from_config() {
        let config = Config::default();
        let resolved = OrchestratorConfig::from_config(&config).unwrap();
        assert_eq!(resolved.max_concurrency, 5);
        assert_eq!(resolved.call_timeout, Duration::from_secs(20));
        assert_eq!(resolved.collection_name, "RAG");
    }
}
