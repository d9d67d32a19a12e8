//! Embedding provider implementations

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::http::{Capability, build_client, post_json};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of embedding generation
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector and is 0
    /// when there are no embeddings.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Dimension of the vectors this provider produces, once known
    fn embedding_dimension(&self) -> Option<usize>;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    config: EmbedConfig,
    client: Client,
    endpoint: String,
    /// Dimension seen in the first successful response; 0 until then.
    observed_dimension: AtomicUsize,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .field("dimension", &self.embedding_dimension())
            .finish()
    }
}

impl OpenAiEmbedder {
    /// Validate `config` and build the HTTP client.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.api_key, config.timeout())?;
        let endpoint = config.endpoint();
        tracing::info!(
            "Created OpenAI embedder for model {} at {}",
            config.model,
            endpoint
        );
        Ok(Self {
            config,
            client,
            endpoint,
            observed_dimension: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: inputs,
            dimensions: self.config.dimensions,
        };
        let mut parsed: EmbeddingResponse = post_json(
            &self.client,
            &self.endpoint,
            &request,
            self.config.retry_policy(),
            self.config.timeout(),
            Capability::Embedding,
        )
        .await?;

        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(EmbedError::embedding_unavailable(format!(
                "endpoint returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|e| e.embedding).collect();
        for vector in &vectors {
            self.check_dimension(vector.len())?;
        }
        Ok(vectors)
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual == 0 {
            return Err(EmbedError::embedding_unavailable(
                "endpoint returned an empty embedding",
            ));
        }
        let expected = match self.config.dimensions {
            Some(d) => d,
            None => match self.observed_dimension.compare_exchange(
                0,
                actual,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => actual,
                Err(previous) => previous,
            },
        };
        if expected != actual {
            return Err(EmbedError::embedding_unavailable(format!(
                "endpoint returned a {actual}-dimensional embedding, expected {expected}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .pop()
            .ok_or_else(|| EmbedError::embedding_unavailable("no embedding returned"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(Vec::new()));
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            tracing::debug!("Embedding batch of {} texts", batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.config.dimensions.or_else(|| {
            match self.observed_dimension.load(Ordering::Acquire) {
                0 => None,
                d => Some(d),
            }
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
