//! File-based configuration for the `ragline` pipeline
//!
//! Settings live in a TOML file with one table per component. Every key is
//! optional:
//!
//! ```toml
//! [chunking]
//! size = 500
//! overlap = 100
//! unit = "word"
//!
//! [embedding]
//! model = "text-embedding-3-small"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [chat]
//! model = "gpt-3.5-turbo"
//! max_tokens = 50
//!
//! [index]
//! backend = "remote"
//! host = "https://rag-test-abc123.svc.us-east-1.pinecone.io"
//! api_key_env = "PINECONE_API_KEY"
//!
//! [retriever]
//! embed_concurrency = 5
//! ```
//!
//! API keys are never read from the file. Each section names the environment
//! variable holding its key, and [`RagConfig::resolve_keys`] fills them in.

use crate::error::{Result, RetrieverError};
use crate::index::VectorIndex;
use crate::index::memory::MemoryIndex;
use crate::index::remote::{RemoteIndex, RemoteIndexConfig};
use crate::retriever::{Retriever, RetrieverConfig};
use ragline_context::ChunkConfig;
use ragline_embed::{AnswerComposer, ChatConfig, EmbedConfig, EmbeddingProvider, OpenAiChat, OpenAiEmbedder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_INDEX_KEY_ENV: &str = "PINECONE_API_KEY";

/// Which [`VectorIndex`] implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Memory,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    #[serde(flatten)]
    pub client: EmbedConfig,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            client: EmbedConfig::default(),
            api_key_env: DEFAULT_OPENAI_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    #[serde(flatten)]
    pub client: ChatConfig,
    pub api_key_env: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            client: ChatConfig::default(),
            api_key_env: DEFAULT_OPENAI_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    pub backend: IndexBackend,
    /// Connection settings, used by the remote backend
    #[serde(flatten)]
    pub remote: RemoteIndexConfig,
    pub api_key_env: String,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            remote: RemoteIndexConfig::default(),
            api_key_env: DEFAULT_INDEX_KEY_ENV.to_string(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunking: ChunkConfig,
    pub embedding: EmbeddingSection,
    pub chat: ChatSection,
    pub index: IndexSection,
    pub retriever: RetrieverConfig,
}

impl RagConfig {
    /// Load config from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrieverError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            RetrieverError::Config { message } => {
                RetrieverError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RetrieverError::config(format!("Failed to parse config: {e}")))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RetrieverError::config(format!("Failed to serialize config: {e}")))
    }

    /// Fill in API keys from the process environment.
    pub fn resolve_env_keys(&mut self) {
        self.resolve_keys(|name| std::env::var(name).ok());
    }

    /// Fill in API keys by looking up each section's `api_key_env` with `lookup`.
    ///
    /// Keys that are already set are left alone.
    pub fn resolve_keys<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fill_key(&mut self.embedding.client.api_key, &self.embedding.api_key_env, &lookup);
        fill_key(&mut self.chat.client.api_key, &self.chat.api_key_env, &lookup);
        fill_key(&mut self.index.remote.api_key, &self.index.api_key_env, &lookup);
    }

    /// Check the settings that do not depend on API keys.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.retriever.validate()?;
        if let (Some(model_dim), Some(index_dim)) =
            (self.embedding.client.dimensions, self.index.remote.dimension)
        {
            if self.index.backend == IndexBackend::Remote && model_dim != index_dim {
                return Err(RetrieverError::config(format!(
                    "embedding dimension {model_dim} does not match index dimension {index_dim}"
                )));
            }
        }
        Ok(())
    }

    pub fn build_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        require_key(&self.embedding.client.api_key, &self.embedding.api_key_env)?;
        Ok(Arc::new(OpenAiEmbedder::new(self.embedding.client.clone())?))
    }

    pub fn build_composer(&self) -> Result<Arc<dyn AnswerComposer>> {
        require_key(&self.chat.client.api_key, &self.chat.api_key_env)?;
        Ok(Arc::new(OpenAiChat::new(self.chat.client.clone())?))
    }

    pub fn build_index(&self) -> Result<Arc<dyn VectorIndex>> {
        match self.index.backend {
            IndexBackend::Memory => Ok(Arc::new(match self.embedding.client.dimensions {
                Some(d) => MemoryIndex::with_dimension(d),
                None => MemoryIndex::new(),
            })),
            IndexBackend::Remote => {
                require_key(&self.index.remote.api_key, &self.index.api_key_env)?;
                Ok(Arc::new(RemoteIndex::new(self.index.remote.clone())?))
            }
        }
    }

    /// Validate and assemble a [`Retriever`] from this configuration.
    pub fn build_retriever(&self) -> Result<Retriever> {
        self.validate()?;
        Ok(Retriever::new(
            self.build_embedder()?,
            self.build_index()?,
            self.retriever.clone(),
        ))
    }
}

fn fill_key<F>(slot: &mut String, env_name: &str, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if !slot.is_empty() || env_name.is_empty() {
        return;
    }
    match lookup(env_name) {
        Some(value) if !value.trim().is_empty() => *slot = value.trim().to_string(),
        _ => tracing::debug!("{} is not set", env_name),
    }
}

fn require_key(key: &str, env_name: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(RetrieverError::config(format!(
            "missing API key; set the {env_name} environment variable"
        )));
    }
    Ok(())
}
