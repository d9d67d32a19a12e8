//! Error types for the model capability clients

use std::time::Duration;

/// Result type for embedding and completion operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all calls to external model capabilities.
///
/// The embedding model and the chat model are external collaborators; every
/// failure to reach them, or to make sense of their answer, is reported as
/// one of the `*Unavailable` variants so callers can branch on which
/// collaborator failed without inspecting transport details.
///
/// # Error Categories
///
/// - **Configuration Errors**: missing API keys, malformed endpoints
/// - **Embedding Errors**: the embedding endpoint failed or answered garbage
/// - **Completion Errors**: the chat endpoint failed or answered garbage
/// - **Timeouts**: a call did not finish within its deadline
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the client configuration is invalid
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// The embedding collaborator could not produce vectors
    #[error("Embedding unavailable: {message}")]
    EmbeddingUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The completion collaborator could not produce an answer
    #[error("Completion unavailable: {message}")]
    CompletionUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    ///
    /// # Arguments
    /// * `message` - A descriptive error message explaining what's wrong with the configuration
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an embedding error that carries no underlying cause.
    pub fn embedding_unavailable<S: Into<String>>(message: S) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create an embedding error wrapping the underlying cause.
    ///
    /// # Arguments
    /// * `message` - What was being attempted
    /// * `source` - The underlying error that caused the failure
    pub fn embedding_failed<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::EmbeddingUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a completion error that carries no underlying cause.
    pub fn completion_unavailable<S: Into<String>>(message: S) -> Self {
        Self::CompletionUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a completion error wrapping the underlying cause.
    pub fn completion_failed<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::CompletionUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Configuration errors are caller bugs and are never retried.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. })
    }
}

impl From<derive_builder::UninitializedFieldError> for EmbedError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::invalid_config(err.to_string())
    }
}
