//! Result deduplication by cleaned passage text

use crate::retrieval::PassageResult;
use ahash::{HashMap, HashMapExt};
use std::cmp::Ordering;

/// Order two optional scores; any score outranks a missing one
pub fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Deduplicate passages by exact content, keeping the highest-scored instance
///
/// # Arguments
/// * `passages` - Passages potentially with duplicates
///
/// # Returns
/// One passage per distinct content, in first-seen order. On equal scores the
/// earlier instance wins.
pub fn deduplicate_passages(passages: Vec<PassageResult>) -> Vec<PassageResult> {
    let mut slots: HashMap<blake3::Hash, usize> = HashMap::with_capacity(passages.len());
    let mut kept: Vec<PassageResult> = Vec::with_capacity(passages.len());

    for passage in passages {
        let digest = blake3::hash(passage.content.as_bytes());
        match slots.get(&digest) {
            Some(&idx) => {
                if compare_scores(passage.score, kept[idx].score) == Ordering::Greater {
                    kept[idx] = passage;
                }
            }
            None => {
                slots.insert(digest, kept.len());
                kept.push(passage);
            }
        }
    }

    kept
}
