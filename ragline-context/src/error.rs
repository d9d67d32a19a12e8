//! Error types for chunking

/// Result type for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkError>;

/// Errors raised while configuring or running the chunker.
///
/// Chunking itself cannot fail once a configuration has been validated, so
/// every variant describes a caller bug. These are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// Window parameters that would never advance, or an unknown unit
    #[error("Invalid chunking configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ChunkError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }
}
