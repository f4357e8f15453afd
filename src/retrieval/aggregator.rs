//! Merging of per-sub-query result sets into one ranked list

use crate::retrieval::{compare_scores, deduplicate_passages, PassageResult, ResultSet};

/// Merges, deduplicates, sorts and truncates result sets. Pure, no I/O.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Merge result sets into at most `top_k` passages
    ///
    /// Output order depends only on scores and input order: passages are
    /// stably sorted by descending score, unscored passages last.
    pub fn merge(result_sets: Vec<Vec<PassageResult>>, top_k: usize) -> ResultSet {
        let combined: Vec<PassageResult> = result_sets.into_iter().flatten().collect();
        let mut results = deduplicate_passages(combined);

        // sort_by is stable, so ties keep their first-seen order
        results.sort_by(|a, b| compare_scores(b.score, a.score));
        results.truncate(top_k);

        ResultSet { results }
    }
}
