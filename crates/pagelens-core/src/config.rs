//! Connection parameters, resolved from process environment.
//!
//! The binary loads `.env` via dotenvy before calling into here; this module
//! only reads `std::env`. Missing required variables are explicit errors
//! rather than a silent empty-result path.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(name))
}

/// Model-inference endpoint parameters.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the Anthropic-messages-compatible gateway.
    pub endpoint: String,
    pub api_key: String,
    /// Vision/generation model id.
    pub model_id: String,
    /// Embedding model id.
    pub embed_model_id: String,
    /// Embedding dimensionality; must match the index mapping.
    pub embed_dimensions: u32,
}

impl ModelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let embed_dimensions = match std::env::var("EMBED_DIMENSIONS") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidVar {
                name: "EMBED_DIMENSIONS",
                value,
            })?,
            Err(_) => 1024,
        };
        Ok(Self {
            endpoint: required("BEDROCK_ENDPOINT")?,
            api_key: required("BEDROCK_API_KEY")?,
            model_id: required("BEDROCK_MODEL_ID")?,
            embed_model_id: std::env::var("BEDROCK_EMBED_MODEL_ID")
                .unwrap_or_else(|_| "amazon.titan-embed-text-v2:0".to_string()),
            embed_dimensions,
        })
    }
}

/// Search-index endpoint parameters.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub index_name: String,
    pub username: String,
    pub password: String,
}

impl SearchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: required("OPENSEARCH_ENDPOINT")?,
            index_name: required("OPENSEARCH_INDEX_NAME")?,
            username: required("OPENSEARCH_USERNAME")?,
            password: required("OPENSEARCH_PASSWORD")?,
        })
    }
}
