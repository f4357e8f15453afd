//! Single passage search against a knowledge-base collection

use crate::error::{DeepSearchError, Result};
use crate::knowledge::{ContentCleaner, KnowledgeBaseClient, RawResponse, SEARCH_PATH};
use crate::retrieval::PassageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-call search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Collection the search is scoped to
    pub collection_name: String,
    /// Maximum passages to return, at least 1
    pub limit: usize,
    /// Ask the service to rerank before returning
    pub rerank_switch: bool,
    /// Dense vs. sparse blend, within [0, 1]
    pub dense_weight: f32,
}

impl SearchParams {
    pub fn new(collection_name: impl Into<String>, limit: usize) -> Self {
        Self {
            collection_name: collection_name.into(),
            limit,
            rerank_switch: false,
            dense_weight: 0.5,
        }
    }

    pub fn validate(&self, query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return Err(DeepSearchError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(DeepSearchError::InvalidInput(
                "Limit must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dense_weight) {
            return Err(DeepSearchError::InvalidInput(format!(
                "Dense weight must be between 0.0 and 1.0, got {}",
                self.dense_weight
            )));
        }
        Ok(())
    }
}

/// Anything that can answer a passage search for one query
#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<PassageResult>>;
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    name: &'a str,
    query: &'a str,
    limit: usize,
    rerank_switch: bool,
    dense_weight: f32,
    project: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    result_list: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    content: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    rerank_score: Option<f64>,
    #[serde(default)]
    point_id: Option<String>,
    #[serde(default)]
    id: Option<Value>,
}

impl SearchItem {
    fn source_id(&self) -> Option<String> {
        if let Some(point_id) = &self.point_id {
            return Some(point_id.clone());
        }
        match &self.id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Passage search client for the knowledge-base collection search API
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: KnowledgeBaseClient,
    cleaner: ContentCleaner,
    project: String,
}

impl SearchClient {
    pub fn new(client: KnowledgeBaseClient, project: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            cleaner: ContentCleaner::new()?,
            project: project.into(),
        })
    }

    fn parse_response(&self, raw: RawResponse) -> Result<Vec<PassageResult>> {
        if !raw.is_success() {
            return Err(DeepSearchError::SearchRequest {
                status: Some(raw.status),
                body: raw.body,
            });
        }

        let response: SearchResponse = match serde_json::from_str(&raw.body) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Malformed search response: {}", e);
                return Err(DeepSearchError::SearchRequest {
                    status: Some(raw.status),
                    body: raw.body,
                });
            }
        };

        if let Some(code) = response.code.filter(|code| *code != 0) {
            tracing::debug!(code, "Search service returned non-zero code");
            return Err(DeepSearchError::SearchRequest {
                status: Some(raw.status),
                body: raw.body,
            });
        }

        let items = response.data.map(|d| d.result_list).unwrap_or_default();

        Ok(items
            .into_iter()
            .map(|item| {
                let source_id = item.source_id();
                PassageResult {
                    content: self.cleaner.clean(&item.content),
                    score: item.rerank_score.or(item.score),
                    source_id,
                }
            })
            .collect())
    }
}

#[async_trait]
impl PassageSearch for SearchClient {
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<PassageResult>> {
        params.validate(query)?;

        let body = SearchBody {
            name: &params.collection_name,
            query,
            limit: params.limit,
            rerank_switch: params.rerank_switch,
            dense_weight: params.dense_weight,
            project: &self.project,
        };

        let raw = self
            .client
            .post_json(SEARCH_PATH, &body)
            .await
            .map_err(|e| match e {
                DeepSearchError::Http(err) => DeepSearchError::SearchRequest {
                    status: err.status().map(|s| s.as_u16()),
                    body: err.to_string(),
                },
                other => other,
            })?;

        let passages = self.parse_response(raw)?;
        tracing::debug!(
            query,
            collection = %params.collection_name,
            count = passages.len(),
            "Search returned passages"
        );
        Ok(passages)
    }
}
