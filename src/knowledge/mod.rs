//! Signed HTTP access to the remote knowledge-base API
//!
//! `KnowledgeBaseClient` owns the HTTP connection pool and the request signer.
//! `SearchClient` and `RerankClient` are thin typed wrappers over it.

mod cleaning;
mod rerank;
mod search;

pub use cleaning::ContentCleaner;
pub use rerank::RerankClient;
pub use search::{PassageSearch, SearchClient, SearchParams};

use crate::auth::{Clock, Credential, RequestSigner, SignableRequest, SystemClock};
use crate::config::KnowledgeBaseConfig;
use crate::error::{DeepSearchError, Result};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

/// Collection search endpoint
pub const SEARCH_PATH: &str = "/api/knowledge/collection/search";

/// Batch rerank endpoint
pub const RERANK_PATH: &str = "/api/knowledge/service/rerank";

/// Status and body of a knowledge-base response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared transport for knowledge-base calls
#[derive(Clone, Debug)]
pub struct KnowledgeBaseClient {
    http: Client,
    signer: RequestSigner,
    scheme: String,
    domain: String,
}

impl KnowledgeBaseClient {
    /// Build a client from configuration, resolving credentials from the environment
    pub fn from_config(config: &KnowledgeBaseConfig) -> Result<Self> {
        let credential = config.credential()?;
        Self::new(config, credential)
    }

    pub fn new(config: &KnowledgeBaseConfig, credential: Credential) -> Result<Self> {
        Self::with_clock(config, credential, Arc::new(SystemClock))
    }

    /// Build a client with an explicit signing clock
    pub fn with_clock(
        config: &KnowledgeBaseConfig,
        credential: Credential,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.domain.trim().is_empty() {
            return Err(DeepSearchError::AuthConfig(
                "knowledge base domain is empty".to_string(),
            ));
        }

        let signer = RequestSigner::new(Arc::new(credential), clock)?;

        let http = Client::builder()
            .connect_timeout(config.connect_timeout()?)
            .timeout(config.socket_timeout()?)
            .build()?;

        Ok(Self {
            http,
            signer,
            scheme: config.scheme.clone(),
            domain: config.domain.clone(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Sign and send a JSON POST; transport failures surface as `Http`
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<RawResponse> {
        let payload = serde_json::to_vec(body).map_err(|e| DeepSearchError::Json {
            source: e,
            context: format!("Failed to serialize request body for {}", path),
        })?;

        let request = SignableRequest::json_post(
            &self.domain,
            path,
            self.signer.credential().account_id(),
            payload,
        );
        let signed = self.signer.sign(request)?;

        let mut builder = self.http.post(signed.url(&self.scheme));
        for (name, value) in &signed.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        tracing::debug!(path, x_date = %signed.timestamp, "Sending knowledge base request");

        let response = builder.body(signed.body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}
