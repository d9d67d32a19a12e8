//! Configuration for the embedding and chat-completion clients

use crate::error::{EmbedError, Result};
use crate::retry::RetryPolicy;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Configuration for an OpenAI-compatible embeddings endpoint.
///
/// The API key is never read from or written to configuration files; callers
/// resolve it (usually from the environment) and set it explicitly.
#[derive(Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(error = "EmbedError"))]
#[serde(default)]
pub struct EmbedConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    /// Name of the embedding model to use
    #[builder(default = "DEFAULT_EMBEDDING_MODEL.to_string()")]
    pub model: String,
    /// Bearer token for the endpoint
    #[builder(default)]
    #[serde(skip)]
    pub api_key: String,
    /// Requested output dimension, for models that support shortening
    #[builder(default)]
    pub dimensions: Option<usize>,
    /// Maximum number of texts sent in one request
    #[builder(default = "100")]
    pub batch_size: usize,
    /// Per-request deadline in seconds
    #[builder(default = "30")]
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    #[builder(default = "3")]
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds
    #[builder(default = "500")]
    pub retry_backoff_ms: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: String::new(),
            dimensions: None,
            batch_size: 100,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Default configuration authenticated with `api_key`
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set the API key (builder style)
    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..self
        }
    }

    /// Set the API root (builder style)
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    /// Set the batch size for embedding requests (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries + 1,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    /// Full URL of the embeddings endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    /// Validate the configuration before building a client
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.base_url, &self.model, &self.api_key, self.timeout_secs)?;
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "embedding batch size must be greater than zero",
            ));
        }
        if self.dimensions == Some(0) {
            return Err(EmbedError::invalid_config(
                "requested embedding dimension must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Configuration for an OpenAI-compatible chat completions endpoint.
#[derive(Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(error = "EmbedError"))]
#[serde(default)]
pub struct ChatConfig {
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    #[builder(default = "DEFAULT_CHAT_MODEL.to_string()")]
    pub model: String,
    #[builder(default)]
    #[serde(skip)]
    pub api_key: String,
    /// Upper bound on the answer length
    #[builder(default = "50")]
    pub max_tokens: usize,
    /// Sampling temperature; 0 keeps answers close to the provided context
    #[builder(default = "0.0")]
    pub temperature: f32,
    #[builder(default = "60")]
    pub timeout_secs: u64,
    #[builder(default = "3")]
    pub max_retries: usize,
    #[builder(default = "500")]
    pub retry_backoff_ms: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_key: String::new(),
            max_tokens: 50,
            temperature: 0.0,
            timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl ChatConfig {
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..self
        }
    }

    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries + 1,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn validate(&self) -> Result<()> {
        validate_common(&self.base_url, &self.model, &self.api_key, self.timeout_secs)?;
        if self.max_tokens == 0 {
            return Err(EmbedError::invalid_config(
                "max_tokens must be greater than zero",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(EmbedError::invalid_config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

fn validate_common(base_url: &str, model: &str, api_key: &str, timeout_secs: u64) -> Result<()> {
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(EmbedError::invalid_config(format!(
            "base URL must be an http(s) URL, got '{base_url}'"
        )));
    }
    if model.trim().is_empty() {
        return Err(EmbedError::invalid_config("missing model name"));
    }
    if api_key.trim().is_empty() {
        return Err(EmbedError::invalid_config("missing API key"));
    }
    if timeout_secs == 0 {
        return Err(EmbedError::invalid_config(
            "timeout must be at least one second",
        ));
    }
    Ok(())
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}
