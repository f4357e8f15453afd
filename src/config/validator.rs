use crate::config::{parse_duration, Config};
use crate::error::{DeepSearchError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_knowledge_base(config, &mut errors);
        Self::validate_search(config, &mut errors);
        Self::validate_deep_search(config, &mut errors);
        Self::validate_generator(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DeepSearchError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_knowledge_base(config: &Config, errors: &mut Vec<ValidationError>) {
        let kb = &config.knowledge_base;

        if kb.scheme != "https" && kb.scheme != "http" {
            errors.push(ValidationError::new(
                "knowledge_base.scheme",
                format!("Scheme must be 'https' or 'http', got '{}'", kb.scheme),
            ));
        }

        if kb.domain.is_empty() {
            errors.push(ValidationError::new(
                "knowledge_base.domain",
                "Domain cannot be empty",
            ));
        }

        if kb.collection_name.is_empty() {
            errors.push(ValidationError::new(
                "knowledge_base.collection_name",
                "Collection name cannot be empty",
            ));
        }

        if kb.access_key_env.is_empty() || kb.secret_key_env.is_empty() {
            errors.push(ValidationError::new(
                "knowledge_base.access_key_env",
                "Credential environment variable names cannot be empty",
            ));
        }

        Self::check_duration("knowledge_base.connect_timeout", &kb.connect_timeout, errors);
        Self::check_duration("knowledge_base.socket_timeout", &kb.socket_timeout, errors);
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.search.limit == 0 {
            errors.push(ValidationError::new(
                "search.limit",
                "Limit must be greater than 0",
            ));
        }

        let weight = config.search.dense_weight;
        if !(0.0..=1.0).contains(&weight) {
            errors.push(ValidationError::new(
                "search.dense_weight",
                format!("Dense weight must be between 0.0 and 1.0, got {}", weight),
            ));
        }
    }

    fn validate_deep_search(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.deep_search.max_concurrency == 0 {
            errors.push(ValidationError::new(
                "deep_search.max_concurrency",
                "Max concurrency must be greater than 0",
            ));
        }

        Self::check_duration(
            "deep_search.call_timeout",
            &config.deep_search.call_timeout,
            errors,
        );
        Self::check_duration(
            "deep_search.request_timeout",
            &config.deep_search.request_timeout,
            errors,
        );
    }

    fn validate_generator(config: &Config, errors: &mut Vec<ValidationError>) {
        let generator = &config.generator;

        if !generator.endpoint.starts_with("http://") && !generator.endpoint.starts_with("https://")
        {
            errors.push(ValidationError::new(
                "generator.endpoint",
                format!("Endpoint must be an http(s) URL, got '{}'", generator.endpoint),
            ));
        }

        if generator.model.is_empty() {
            errors.push(ValidationError::new(
                "generator.model",
                "Model name cannot be empty",
            ));
        }

        if generator.max_new_tokens == 0 {
            errors.push(ValidationError::new(
                "generator.max_new_tokens",
                "Max new tokens must be greater than 0",
            ));
        }

        let temp = generator.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "generator.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        Self::check_duration("generator.timeout", &generator.timeout, errors);
    }

    fn check_duration(path: &str, value: &str, errors: &mut Vec<ValidationError>) {
        match parse_duration(value) {
            Ok(d) if d.is_zero() => {
                errors.push(ValidationError::new(path, "Duration must be non-zero"));
            }
            Ok(_) => {}
            Err(_) => {
                errors.push(ValidationError::new(
                    path,
                    format!("Invalid duration format: {}", value),
                ));
            }
        }
    }
}
