//! # ragline-embed
//!
//! Async clients for the two model capabilities a retrieval pipeline leans
//! on: turning text into embedding vectors, and turning a conversation into
//! an answer. Both are expressed as traits so the retrieval core can be
//! driven by the bundled OpenAI-compatible clients or by any other backend.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ragline_embed::{EmbedConfig, EmbeddingProvider, OpenAiEmbedder};
//!
//! # async fn example() -> ragline_embed::Result<()> {
//! let embedder = OpenAiEmbedder::new(EmbedConfig::new("sk-..."))?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = embedder.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: endpoint, model and retry settings for both clients
//! - [`provider`]: the [`EmbeddingProvider`] trait and [`OpenAiEmbedder`]
//! - [`completion`]: the [`AnswerComposer`] trait and [`OpenAiChat`]
//! - [`retry`]: bounded exponential backoff shared by both clients
//! - [`error`]: error types and result handling
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type.
//! Transport failures, non-success statuses and malformed answers surface as
//! [`EmbedError::EmbeddingUnavailable`] or [`EmbedError::CompletionUnavailable`];
//! deadlines surface as [`EmbedError::Timeout`].

pub mod completion;
pub mod config;
pub mod error;
mod http;
pub mod provider;
pub mod retry;

// Re-export main types for easy access
pub use completion::{AnswerComposer, ChatMessage, OpenAiChat, Role};
pub use config::{ChatConfig, EmbedConfig};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, OpenAiEmbedder};
pub use retry::RetryPolicy;
