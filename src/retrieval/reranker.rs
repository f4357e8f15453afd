//! Query-aware rescoring of retrieved passages

use crate::error::{DeepSearchError, Result};
use crate::retrieval::RerankedResult;
use async_trait::async_trait;
use std::cmp::Ordering;

/// Assigns a relevance score to each (query, passage) pair
///
/// Implementations must return exactly one score per passage, in input order.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f64>>;
}

/// Score passages and return them ordered by descending score
///
/// Ties keep their input order. A score count that differs from the passage
/// count is a contract violation and fails with `RerankMismatch`.
pub async fn rerank(
    scorer: &dyn Scorer,
    query: &str,
    passages: &[String],
) -> Result<Vec<RerankedResult>> {
    if passages.is_empty() {
        return Ok(Vec::new());
    }

    let scores = scorer.score(query, passages).await?;
    rank_passages(passages, scores)
}

/// Zip scores positionally with passages and sort descending
pub fn rank_passages(passages: &[String], scores: Vec<f64>) -> Result<Vec<RerankedResult>> {
    if scores.len() != passages.len() {
        return Err(DeepSearchError::RerankMismatch {
            expected: passages.len(),
            actual: scores.len(),
        });
    }

    let mut ranked: Vec<RerankedResult> = passages
        .iter()
        .zip(scores)
        .map(|(content, score)| RerankedResult {
            content: content.clone(),
            score,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(Vec<f64>);

    #[async_trait]
    impl Scorer for FixedScorer {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    fn passages(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_rerank_sorts_descending() {
        let scorer = FixedScorer(vec![0.1, 0.9, 0.5]);
        let ranked = rerank(&scorer, "query", &passages(&["a", "b", "c"]))
            .await
            .unwrap();

        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(ranked[0].score, 0.9);
    }

    #[tokio::test]
    async fn test_rerank_ties_keep_input_order() {
        let scorer = FixedScorer(vec![0.5, 0.7, 0.5, 0.5]);
        let ranked = rerank(&scorer, "query", &passages(&["a", "b", "c", "d"]))
            .await
            .unwrap();

        let order: Vec<&str> = ranked.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
    }

    #[tokio::test]
    async fn test_rerank_mismatch() {
        let scorer = FixedScorer(vec![0.5, 0.7]);
        let result = rerank(&scorer, "query", &passages(&["a", "b", "c"])).await;

        match result {
            Err(DeepSearchError::RerankMismatch { expected, actual }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rerank_empty_skips_scorer() {
        let scorer = FixedScorer(vec![1.0]);
        let ranked = rerank(&scorer, "query", &[]).await.unwrap();
        assert!(ranked.is_empty());
    }
}
