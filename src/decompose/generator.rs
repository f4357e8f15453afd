//! Sequence generation over an Ollama-compatible HTTP endpoint

use crate::config::GeneratorConfig;
use crate::decompose::SequenceGenerator;
use crate::error::{DeepSearchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Non-streaming generation client for `POST {endpoint}/api/generate`
#[derive(Debug, Clone)]
pub struct HttpSequenceGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl HttpSequenceGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()?).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SequenceGenerator for HttpSequenceGenerator {
    async fn generate(&self, prompt: &str, stop_token: &str, max_tokens: usize) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            raw: true,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: max_tokens,
                stop: vec![stop_token],
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DeepSearchError::Generation(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeepSearchError::Generation(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DeepSearchError::Generation(format!("Failed to parse response: {}", e)))?;

        if body.response.trim().is_empty() {
            return Err(DeepSearchError::Generation(
                "model returned empty output".to_string(),
            ));
        }

        Ok(body.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    /// The prompt already carries the model's own template tokens
    raw: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    num_predict: usize,
    stop: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
