//! Shared JSON-over-HTTP plumbing for the OpenAI-compatible clients

use crate::error::{EmbedError, Result};
use crate::retry::{RetryPolicy, is_retryable_error, should_retry_status};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Which external capability a request belongs to. Decides the error variant
/// failures are reported as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capability {
    Embedding,
    Completion,
}

impl Capability {
    fn operation(self) -> &'static str {
        match self {
            Self::Embedding => "embedding request",
            Self::Completion => "completion request",
        }
    }

    pub(crate) fn unavailable(self, message: impl Into<String>) -> EmbedError {
        match self {
            Self::Embedding => EmbedError::embedding_unavailable(message),
            Self::Completion => EmbedError::completion_unavailable(message),
        }
    }

    fn failed<E>(self, message: impl Into<String>, source: E) -> EmbedError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            Self::Embedding => EmbedError::embedding_failed(message, source),
            Self::Completion => EmbedError::completion_failed(message, source),
        }
    }
}

/// Build a client that authenticates every request with `api_key`.
pub(crate) fn build_client(api_key: &str, timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    let auth = HeaderValue::from_str(&auth)
        .map_err(|_| EmbedError::invalid_config("API key is not a valid header value"))?;
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| EmbedError::invalid_config(format!("failed to build HTTP client: {e}")))
}

/// POST `body` to `endpoint` and decode the JSON answer, retrying transient
/// failures according to `policy`.
pub(crate) async fn post_json<B, R>(
    client: &Client,
    endpoint: &str,
    body: &B,
    policy: RetryPolicy,
    timeout: Duration,
    capability: Capability,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut attempt = 1usize;
    loop {
        match client.post(endpoint).json(body).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return resp.json::<R>().await.map_err(|e| {
                        capability.failed(format!("failed to parse response from {endpoint}"), e)
                    });
                }

                let text = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                if should_retry_status(status) && policy.allows_retry(attempt) {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        "{} to {} returned {}; retrying in {:?} (attempt {}/{})",
                        capability.operation(),
                        endpoint,
                        status,
                        delay,
                        attempt + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(capability.unavailable(format!(
                    "{} failed ({}): {}",
                    capability.operation(),
                    status,
                    text
                )));
            }
            Err(err) => {
                if is_retryable_error(&err) && policy.allows_retry(attempt) {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        "{} to {} failed: {}; retrying in {:?} (attempt {}/{})",
                        capability.operation(),
                        endpoint,
                        err,
                        delay,
                        attempt + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                if err.is_timeout() {
                    return Err(EmbedError::Timeout {
                        operation: capability.operation(),
                        after: timeout,
                    });
                }
                return Err(capability.failed(
                    format!("{} to {} failed", capability.operation(), endpoint),
                    err,
                ));
            }
        }
    }
}
