//! Query decomposition into sub-queries

mod generator;
mod markers;

pub use generator::HttpSequenceGenerator;
pub use markers::{
    apply_template, extract_sub_queries, DEEP_SEARCH_END, DEEP_SEARCH_START, MAX_SUB_QUERIES,
};

use crate::error::{DeepSearchError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Default generation budget for one decomposition
pub const DEFAULT_MAX_NEW_TOKENS: usize = 512;

/// Text generation capability used for decomposition
///
/// Generation stops at `stop_token` or after `max_tokens` new tokens.
#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, stop_token: &str, max_tokens: usize) -> Result<String>;
}

/// Produces zero or more sub-queries for one input query
#[derive(Clone)]
pub struct QueryDecomposer {
    generator: Arc<dyn SequenceGenerator>,
    max_new_tokens: usize,
}

impl QueryDecomposer {
    pub fn new(generator: Arc<dyn SequenceGenerator>) -> Self {
        Self {
            generator,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        }
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    /// Generate and parse sub-queries; an empty list is not an error
    pub async fn decompose(&self, query: &str) -> Result<Vec<String>> {
        if query.trim().is_empty() {
            return Err(DeepSearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let prompt = apply_template(query);
        let generated = self
            .generator
            .generate(&prompt, DEEP_SEARCH_END, self.max_new_tokens)
            .await?;

        let sub_queries = extract_sub_queries(&generated);
        tracing::debug!(
            query,
            count = sub_queries.len(),
            "Decomposed query into sub-queries"
        );
        Ok(sub_queries)
    }
}

impl std::fmt::Debug for QueryDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryDecomposer")
            .field("max_new_tokens", &self.max_new_tokens)
            .finish()
    }
}
