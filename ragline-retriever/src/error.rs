//! Error types for indexing and retrieval

use ragline_context::ChunkError;
use ragline_embed::EmbedError;
use std::time::Duration;

/// Errors raised by a [`VectorIndex`](crate::index::VectorIndex) backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    /// A vector's length differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector with zero L2 norm cannot be compared by cosine similarity
    #[error("Vector '{id}' has zero norm")]
    DegenerateVector { id: String },

    /// The backend could not be reached or answered with an error
    #[error("Vector index unavailable: {message}")]
    IndexUnavailable { message: String },

    /// The index holds no records
    #[error("Vector index is empty")]
    EmptyIndex,

    #[error("top_k must be greater than zero")]
    InvalidTopK,

    #[error("Vector index call timed out after {after:?}")]
    Timeout { after: Duration },
}

impl IndexError {
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }
}

/// Result type for vector index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Top-level error for the retrieval pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),

    /// A stored record carries no chunk text in its metadata
    #[error("Record '{id}' has no stored text")]
    MissingText { id: String },

    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl RetrieverError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for retrieval operations
pub type Result<T> = std::result::Result<T, RetrieverError>;
