use std::path::PathBuf;
use thiserror::Error;

/// Main error type for deepsearch
#[derive(Error, Debug)]
pub enum DeepSearchError {
    /// Missing or invalid credential fields
    #[error("Auth configuration error: {0}")]
    AuthConfig(String),

    /// A single passage search failed (network, timeout, non-2xx, malformed body)
    #[error("Search request failed (status: {status:?}): {body}")]
    SearchRequest { status: Option<u16>, body: String },

    /// Every sub-query search failed
    #[error("All {attempted} sub-query searches failed")]
    AllSearchesFailed { attempted: usize },

    /// Rerank call failed or returned a non-zero status code
    #[error("Rerank request failed (status: {status:?}): {message}")]
    RerankRequest { status: Option<u16>, message: String },

    /// Rerank service returned a different number of scores than passages sent
    #[error("Rerank returned {actual} scores for {expected} passages")]
    RerankMismatch { expected: usize, actual: usize },

    /// Sequence generation produced no usable output
    #[error("Generation error: {0}")]
    Generation(String),

    /// Caller-supplied arguments out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeepSearchError {
    /// Whether the orchestrator may drop this failure for a single sub-query
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DeepSearchError::SearchRequest { .. }
                | DeepSearchError::Http(_)
                | DeepSearchError::Generation(_)
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for deepsearch operations
pub type Result<T> = std::result::Result<T, DeepSearchError>;
