//! Batch rerank against the knowledge-base rerank service

use crate::error::{DeepSearchError, Result};
use crate::knowledge::{KnowledgeBaseClient, RawResponse, RERANK_PATH};
use crate::retrieval::{self, RerankedResult, Scorer};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct RerankBody<'a> {
    datas: Vec<RerankPair<'a>>,
}

#[derive(Debug, Serialize)]
struct RerankPair<'a> {
    query: &'a str,
    content: &'a str,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<RerankData>,
}

#[derive(Debug, Deserialize)]
struct RerankData {
    #[serde(default)]
    scores: Vec<f64>,
}

/// Rerank client; scores every (query, passage) pair in one request
#[derive(Debug, Clone)]
pub struct RerankClient {
    client: KnowledgeBaseClient,
}

impl RerankClient {
    pub fn new(client: KnowledgeBaseClient) -> Self {
        Self { client }
    }

    /// Rescore passages and order them by descending score
    pub async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<RerankedResult>> {
        retrieval::rerank(self, query, passages).await
    }

    fn parse_response(raw: RawResponse) -> Result<Vec<f64>> {
        if raw.status != 200 {
            return Err(DeepSearchError::RerankRequest {
                status: Some(raw.status),
                message: raw.body,
            });
        }

        let response: RerankResponse =
            serde_json::from_str(&raw.body).map_err(|e| DeepSearchError::RerankRequest {
                status: Some(raw.status),
                message: format!("malformed rerank response: {}", e),
            })?;

        if response.code != 0 {
            return Err(DeepSearchError::RerankRequest {
                status: Some(raw.status),
                message: response
                    .message
                    .unwrap_or_else(|| format!("rerank service returned code {}", response.code)),
            });
        }

        Ok(response.data.map(|d| d.scores).unwrap_or_default())
    }
}

#[async_trait]
impl Scorer for RerankClient {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f64>> {
        let body = RerankBody {
            datas: passages
                .iter()
                .map(|content| RerankPair {
                    query,
                    content: content.as_str(),
                    title: "",
                })
                .collect(),
        };

        let raw = self
            .client
            .post_json(RERANK_PATH, &body)
            .await
            .map_err(|e| match e {
                DeepSearchError::Http(err) => DeepSearchError::RerankRequest {
                    status: err.status().map(|s| s.as_u16()),
                    message: err.to_string(),
                },
                other => other,
            })?;

        let scores = Self::parse_response(raw)?;
        tracing::debug!(
            passages = passages.len(),
            scores = scores.len(),
            "Rerank service responded"
        );
        Ok(scores)
    }
}
