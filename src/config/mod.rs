//! Configuration management for deepsearch
//!
//! Configuration is loaded once at process start, validated, and then handed
//! to each component as an immutable value.

use crate::auth::Credential;
use crate::error::{DeepSearchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub search: SearchConfig,
    pub deep_search: DeepSearchConfig,
    pub generator: GeneratorConfig,
    pub server: ServerConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Remote knowledge-base connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// "https" in production; tests point this at a local "http" server
    pub scheme: String,
    pub domain: String,
    pub account_id: String,
    pub collection_name: String,
    pub project: String,
    /// Environment variable holding the access key
    pub access_key_env: String,
    /// Environment variable holding the secret key
    pub secret_key_env: String,
    pub connect_timeout: String,
    pub socket_timeout: String,
}

impl KnowledgeBaseConfig {
    /// Resolve the signing credential from the configured environment variables
    pub fn credential(&self) -> Result<Credential> {
        let access_key = std::env::var(&self.access_key_env).unwrap_or_default();
        let secret_key = std::env::var(&self.secret_key_env).unwrap_or_default();
        Credential::new(access_key, secret_key, self.account_id.clone())
    }

    pub fn connect_timeout(&self) -> Result<Duration> {
        parse_duration(&self.connect_timeout)
    }

    pub fn socket_timeout(&self) -> Result<Duration> {
        parse_duration(&self.socket_timeout)
    }
}

/// Defaults for a single passage search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub limit: usize,
    pub dense_weight: f32,
    pub rerank_switch: bool,
}

/// Deep search fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepSearchConfig {
    /// Maximum number of sub-query searches in flight at once
    pub max_concurrency: usize,
    /// Bound on each individual sub-query search
    pub call_timeout: String,
    /// Bound on the whole fan-out stage
    pub request_timeout: String,
    /// Rescore merged passages through the rerank service
    pub rerank: bool,
}

impl DeepSearchConfig {
    pub fn call_timeout(&self) -> Result<Duration> {
        parse_duration(&self.call_timeout)
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration(&self.request_timeout)
    }
}

/// Query decomposition model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub timeout: String,
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }
}

/// HTTP API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DeepSearchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DeepSearchError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DeepSearchError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DEEPSEARCH_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DEEPSEARCH_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "KNOWLEDGE_BASE__DOMAIN" => self.knowledge_base.domain = value.to_string(),
            "KNOWLEDGE_BASE__SCHEME" => self.knowledge_base.scheme = value.to_string(),
            "KNOWLEDGE_BASE__ACCOUNT_ID" => self.knowledge_base.account_id = value.to_string(),
            "KNOWLEDGE_BASE__COLLECTION_NAME" => {
                self.knowledge_base.collection_name = value.to_string()
            }
            "GENERATOR__ENDPOINT" => self.generator.endpoint = value.to_string(),
            "GENERATOR__MODEL" => self.generator.model = value.to_string(),
            "DEEP_SEARCH__MAX_CONCURRENCY" => {
                self.deep_search.max_concurrency = parse_value(path, value)?;
            }
            "DEEP_SEARCH__RERANK" => {
                self.deep_search.rerank = parse_value(path, value)?;
            }
            "SERVER__PORT" => {
                self.server.port = parse_value(path, value)?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DeepSearchError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("deepsearch").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
            },
            knowledge_base: KnowledgeBaseConfig {
                scheme: "https".to_string(),
                domain: "api-knowledgebase.mlp.cn-beijing.volces.com".to_string(),
                account_id: String::new(),
                collection_name: "RAG".to_string(),
                project: "default".to_string(),
                access_key_env: "VOLC_ACCESSKEY".to_string(),
                secret_key_env: "VOLC_SECRETKEY".to_string(),
                connect_timeout: "10s".to_string(),
                socket_timeout: "10s".to_string(),
            },
            search: SearchConfig {
                limit: 10,
                dense_weight: 0.7,
                rerank_switch: false,
            },
            deep_search: DeepSearchConfig {
                max_concurrency: 5,
                call_timeout: "20s".to_string(),
                request_timeout: "60s".to_string(),
                rerank: false,
            },
            generator: GeneratorConfig {
                endpoint: "http://127.0.0.1:11434".to_string(),
                model: "insightview-deepsearch".to_string(),
                max_new_tokens: 512,
                temperature: 0.1,
                timeout: "60s".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 5000,
            },
        }
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| DeepSearchError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}'", value),
        })
}

/// Parse duration strings like "500ms", "10s", "2m", "1h" (bare digits are seconds)
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || DeepSearchError::InvalidConfigValue {
        path: "duration".to_string(),
        message: format!("Invalid duration format: '{}'", s),
    };

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;

    match unit {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        "h" => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(invalid()),
    }
}
