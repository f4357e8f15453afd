//! Result handling and the deep search pipeline
//!
//! Search results from any number of sub-queries are merged, deduplicated by
//! content and ordered by score. Optionally a rerank scorer replaces the
//! retrieval scores before truncation.

mod aggregator;
mod deduplication;
mod orchestrator;
mod passage;
mod reranker;

pub use aggregator::ResultAggregator;
pub use deduplication::{compare_scores, deduplicate_passages};
pub use orchestrator::{DeepSearchOrchestrator, OrchestratorConfig, PipelineStage};
pub use passage::{PassageResult, RerankedResult, ResultSet};
pub use reranker::{rank_passages, rerank, Scorer};
