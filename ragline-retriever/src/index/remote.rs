//! Client for a Pinecone-style vector index REST service
//!
//! Endpoints used, relative to the index host:
//!
//! - `POST /vectors/upsert` with `{"vectors": [{"id", "values", "metadata"}], "namespace"}`
//! - `POST /query` with `{"vector", "topK", "includeMetadata": true, "namespace"}`
//! - `GET /describe_index_stats`
//!
//! Every request carries the `Api-Key` header and runs under a deadline.
//! Rate limiting, server errors and transport failures are retried with
//! exponential backoff; anything else is reported as
//! [`IndexError::IndexUnavailable`].

use super::{IndexedRecord, QueryMatch, QueryResult, VectorIndex, check_batch, check_query, l2_norm};
use crate::error::{IndexError, IndexResult, Result, RetrieverError};
use async_trait::async_trait;
use ragline_embed::retry::{RetryPolicy, is_retryable_error, should_retry_status};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Connection settings for a [`RemoteIndex`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteIndexConfig {
    /// Index host, e.g. `https://my-index-abc123.svc.us-east-1.pinecone.io`
    pub host: String,
    #[serde(skip)]
    pub api_key: String,
    /// Namespace to read and write; the default namespace when unset
    pub namespace: Option<String>,
    /// Known vector dimension; learned from the first upsert when unset
    pub dimension: Option<usize>,
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: usize,
    pub retry_backoff_ms: u64,
}

impl Default for RemoteIndexConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: String::new(),
            namespace: None,
            dimension: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for RemoteIndexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteIndexConfig")
            .field("host", &self.host)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("namespace", &self.namespace)
            .field("dimension", &self.dimension)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl RemoteIndexConfig {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(self, namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
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

    pub fn validate(&self) -> Result<()> {
        if !(self.host.starts_with("http://") || self.host.starts_with("https://")) {
            return Err(RetrieverError::config(format!(
                "index host must be an http(s) URL, got '{}'",
                self.host
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(RetrieverError::config("missing vector index API key"));
        }
        if self.timeout_secs == 0 {
            return Err(RetrieverError::config(
                "index timeout must be at least one second",
            ));
        }
        if self.dimension == Some(0) {
            return Err(RetrieverError::config(
                "index dimension must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// [`VectorIndex`] backed by a remote Pinecone-style service.
pub struct RemoteIndex {
    config: RemoteIndexConfig,
    client: Client,
    base: String,
    /// 0 until known
    dimension: AtomicUsize,
}

impl fmt::Debug for RemoteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteIndex")
            .field("config", &self.config)
            .field("dimension", &self.dimension())
            .finish()
    }
}

impl RemoteIndex {
    pub fn new(config: RemoteIndexConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|_| RetrieverError::config("index API key is not a valid header value"))?;
        headers.insert("Api-Key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| RetrieverError::config(format!("failed to build HTTP client: {e}")))?;

        let base = config.host.trim_end_matches('/').to_string();
        tracing::info!("Using remote vector index at {}", base);
        Ok(Self {
            dimension: AtomicUsize::new(config.dimension.unwrap_or(0)),
            config,
            client,
            base,
        })
    }

    pub fn config(&self) -> &RemoteIndexConfig {
        &self.config
    }

    /// Run `build()` until it succeeds, fails permanently or the retry
    /// budget runs out. `build` is called once per attempt.
    async fn send<R, F>(&self, what: &str, build: F) -> IndexResult<R>
    where
        R: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let policy = self.config.retry_policy();
        let timeout = self.config.timeout();
        let mut attempt = 1usize;
        loop {
            let outcome = tokio::time::timeout(timeout, async {
                let resp = build().send().await?;
                let status = resp.status();
                let body = resp.text().await?;
                Ok::<_, reqwest::Error>((status, body))
            })
            .await;

            let can_retry = policy.allows_retry(attempt);
            let reason = match outcome {
                Err(_) if can_retry => format!("timed out after {timeout:?}"),
                Err(_) => return Err(IndexError::Timeout { after: timeout }),
                Ok(Err(err)) if can_retry && is_retryable_error(&err) => err.to_string(),
                Ok(Err(err)) => {
                    return Err(IndexError::unavailable(format!("{what} failed: {err}")));
                }
                Ok(Ok((status, body))) if status.is_success() => {
                    return serde_json::from_str(&body).map_err(|e| {
                        IndexError::unavailable(format!("invalid {what} response: {e}"))
                    });
                }
                Ok(Ok((status, _))) if can_retry && should_retry_status(status) => {
                    format!("status {status}")
                }
                Ok(Ok((status, body))) => {
                    return Err(IndexError::unavailable(format!(
                        "{what} failed ({status}): {body}"
                    )));
                }
            };

            let delay = policy.backoff(attempt);
            tracing::warn!(
                "Index {} failed ({}); retrying in {:?} (attempt {}/{})",
                what,
                reason,
                delay,
                attempt + 1,
                policy.max_attempts
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }
}

#[async_trait]
impl VectorIndex for RemoteIndex {
    async fn upsert(&self, records: Vec<IndexedRecord>) -> IndexResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let dimension = check_batch(&records, self.dimension())?;

        let body = UpsertRequest {
            vectors: &records,
            namespace: self.config.namespace.as_deref(),
        };
        let url = self.url("vectors/upsert");
        let response: UpsertResponse = self
            .send("upsert", || self.client.post(&url).json(&body))
            .await?;

        if let Some(d) = dimension {
            let _ = self
                .dimension
                .compare_exchange(0, d, Ordering::AcqRel, Ordering::Acquire);
        }
        tracing::debug!(
            "Remote index accepted {} of {} records",
            response.upserted_count.unwrap_or(records.len()),
            records.len()
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> IndexResult<QueryResult> {
        check_query(vector, top_k, self.dimension())?;
        if l2_norm(vector) == 0.0 {
            return Err(IndexError::DegenerateVector { id: "query".into() });
        }

        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.config.namespace.as_deref(),
        };
        let url = self.url("query");
        let response: QueryResponse = self
            .send("query", || self.client.post(&url).json(&body))
            .await?;

        let mut matches = response.matches;
        if matches.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn len(&self) -> IndexResult<usize> {
        let url = self.url("describe_index_stats");
        let stats: IndexStats = self
            .send("describe_index_stats", || self.client.get(&url))
            .await?;

        if let Some(d) = stats.dimension.filter(|d| *d > 0) {
            let _ = self
                .dimension
                .compare_exchange(0, d, Ordering::AcqRel, Ordering::Acquire);
        }
        Ok(match &self.config.namespace {
            Some(ns) => stats
                .namespaces
                .get(ns)
                .map(|n| n.vector_count)
                .unwrap_or(0),
            None => stats.total_vector_count,
        })
    }

    fn dimension(&self) -> Option<usize> {
        match self.dimension.load(Ordering::Acquire) {
            0 => None,
            d => Some(d),
        }
    }

    fn backend_name(&self) -> &str {
        "remote"
    }
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [IndexedRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: usize,
}
