//! Ingestion and question answering on top of an embedder and a vector index
//!
//! ```text
//! ingest: text → Chunker → (WorkerPool) embed each chunk → sort → upsert in batches
//! search: question → embed → index.query(top_k) → ranked chunk texts
//! ask:    search → [system, context, question] → AnswerComposer
//! ```
//!
//! A chunk whose embedding keeps failing is skipped and reported in
//! [`IngestReport::warnings`]; it never aborts the rest of the document.
//! Index writes that fail are returned as errors. Batches written before the
//! failure stay written.

use crate::error::{IndexError, Result, RetrieverError};
use crate::index::{IndexedRecord, OFFSET_END_KEY, OFFSET_START_KEY, TEXT_KEY, VectorIndex};
use crate::pool::WorkerPool;
use ragline_context::{Chunk, ChunkConfig, Chunker};
use ragline_embed::{AnswerComposer, ChatMessage, EmbedError, EmbeddingProvider, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Persona used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "I want you to act as a support agent. Your name is \"My Super Assistant\". You will provide me with answers from the given info. Never break character.";

/// Tuning knobs for a [`Retriever`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Embedding calls allowed in flight at once
    pub embed_concurrency: usize,
    /// Total attempts per chunk before it is skipped
    pub embed_attempts: usize,
    /// Records per index write
    pub upsert_batch_size: usize,
    /// Deadline for each embed, index or completion call
    pub call_timeout_secs: u64,
    /// Delay before the first re-embed of a failed chunk, in milliseconds
    pub retry_backoff_ms: u64,
    /// Prepended to chunk ordinals to form record ids
    pub id_prefix: Option<String>,
    pub system_prompt: String,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            embed_concurrency: 5,
            embed_attempts: 3,
            upsert_batch_size: 100,
            call_timeout_secs: 30,
            retry_backoff_ms: 500,
            id_prefix: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl RetrieverConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.embed_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.embed_concurrency == 0 {
            return Err(RetrieverError::config("embed_concurrency must be at least 1"));
        }
        if self.embed_attempts == 0 {
            return Err(RetrieverError::config("embed_attempts must be at least 1"));
        }
        if self.upsert_batch_size == 0 {
            return Err(RetrieverError::config("upsert_batch_size must be at least 1"));
        }
        if self.call_timeout_secs == 0 {
            return Err(RetrieverError::config("call_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// Record id for the chunk with the given ordinal.
    pub fn record_id(&self, chunk_id: usize) -> String {
        match &self.id_prefix {
            Some(prefix) => format!("{prefix}{chunk_id}"),
            None => chunk_id.to_string(),
        }
    }
}

/// A chunk that could not be embedded and was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestWarning {
    pub chunk_id: usize,
    pub attempts: usize,
    pub message: String,
}

/// Outcome of [`Retriever::ingest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunks_total: usize,
    pub records_upserted: usize,
    /// Skipped chunks, ordered by chunk id
    pub warnings: Vec<IngestWarning>,
}

impl IngestReport {
    /// Whether every chunk made it into the index
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty() && self.records_upserted == self.chunks_total
    }
}

/// A ranked search hit with its stored text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub text: String,
}

/// Chunks, embeds and indexes documents, and answers questions from them.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    config: RetrieverConfig,
    pool: WorkerPool,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        config: RetrieverConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.embed_concurrency);
        Self {
            embedder,
            index,
            config,
            pool,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Chunk `text`, embed every chunk and write the results to the index.
    pub async fn ingest(&self, text: &str, chunking: &ChunkConfig) -> Result<IngestReport> {
        let chunker = Chunker::new(chunking.clone())?;
        let chunks = chunker.chunk(text);
        let chunks_total = chunks.len();
        info!(
            "Ingesting {} chunks ({} {}s per chunk, overlap {}) into {} index",
            chunks_total,
            chunking.size,
            chunking.unit,
            chunking.overlap,
            self.index.backend_name()
        );

        let outcomes = self
            .pool
            .map(chunks, |chunk| self.embed_chunk(chunk))
            .await;

        let mut embedded = Vec::with_capacity(chunks_total);
        let mut warnings = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(pair) => embedded.push(pair),
                Err(warning) => warnings.push(warning),
            }
        }
        embedded.sort_by_key(|(chunk_id, _)| *chunk_id);
        warnings.sort_by_key(|w| w.chunk_id);

        let batch_size = self.config.upsert_batch_size.max(1);
        let mut records = embedded.into_iter().map(|(_, record)| record).peekable();
        let mut records_upserted = 0;
        while records.peek().is_some() {
            let batch: Vec<IndexedRecord> = records.by_ref().take(batch_size).collect();
            let count = batch.len();
            debug!("Upserting batch of {} records", count);
            self.with_index_timeout(self.index.upsert(batch))
                .await
                .inspect_err(|e| {
                    error!(
                        "Upsert failed after {} of {} records: {}",
                        records_upserted,
                        chunks_total - warnings.len(),
                        e
                    )
                })?;
            records_upserted += count;
        }

        if !warnings.is_empty() {
            warn!(
                "{} of {} chunks could not be embedded and were skipped",
                warnings.len(),
                chunks_total
            );
        }
        info!(
            "Ingestion finished: {} of {} chunks indexed",
            records_upserted, chunks_total
        );
        Ok(IngestReport {
            chunks_total,
            records_upserted,
            warnings,
        })
    }

    /// Embed one chunk, retrying with backoff. Gives up with a warning.
    async fn embed_chunk(
        &self,
        chunk: Chunk,
    ) -> std::result::Result<(usize, IndexedRecord), IngestWarning> {
        let policy = self.config.retry_policy();
        let timeout = self.config.call_timeout();
        let mut attempt = 1usize;
        loop {
            let error = match tokio::time::timeout(timeout, self.embedder.embed_text(&chunk.text))
                .await
            {
                Ok(Ok(vector)) if !vector.is_empty() => {
                    return Ok((chunk.id, self.build_record(&chunk, vector)));
                }
                Ok(Ok(_)) => EmbedError::embedding_unavailable("embedder returned an empty vector"),
                Ok(Err(e)) => e,
                Err(_) => EmbedError::Timeout {
                    operation: "embedding request",
                    after: timeout,
                },
            };

            if !error.is_transient() || !policy.allows_retry(attempt) {
                warn!(
                    "Skipping chunk {} after {} attempt(s): {}",
                    chunk.id, attempt, error
                );
                return Err(IngestWarning {
                    chunk_id: chunk.id,
                    attempts: attempt,
                    message: error.to_string(),
                });
            }

            let delay = policy.backoff(attempt);
            debug!(
                "Embedding chunk {} failed ({}); retrying in {:?}",
                chunk.id, error, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn build_record(&self, chunk: &Chunk, vector: Vec<f32>) -> IndexedRecord {
        IndexedRecord::new(self.config.record_id(chunk.id), vector)
            .with_metadata(TEXT_KEY, chunk.text.clone())
            .with_metadata(OFFSET_START_KEY, chunk.source_offset_start)
            .with_metadata(OFFSET_END_KEY, chunk.source_offset_end)
    }

    /// The `top_k` stored chunks most similar to `question`, best first.
    ///
    /// An empty index yields an empty list.
    pub async fn search(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(IndexError::InvalidTopK.into());
        }

        let timeout = self.config.call_timeout();
        let vector = tokio::time::timeout(timeout, self.embedder.embed_text(question))
            .await
            .map_err(|_| EmbedError::Timeout {
                operation: "embedding request",
                after: timeout,
            })??;

        let matches = match self
            .with_index_timeout(self.index.query(&vector, top_k))
            .await
        {
            Ok(matches) => matches,
            Err(IndexError::EmptyIndex) => {
                info!("Index is empty; no context for question");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Index returned {} matches", matches.len());

        matches
            .into_iter()
            .map(|m| {
                let text = m
                    .text()
                    .ok_or_else(|| RetrieverError::MissingText { id: m.id.clone() })?
                    .to_string();
                Ok(RetrievedChunk {
                    id: m.id,
                    score: m.score,
                    text,
                })
            })
            .collect()
    }

    /// Texts of the `top_k` chunks most similar to `question`, best first.
    pub async fn answer(&self, question: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(question, top_k)
            .await?
            .into_iter()
            .map(|chunk| chunk.text)
            .collect())
    }

    /// Prompt sent to the composer: persona, retrieved context, question.
    pub fn build_messages(&self, context: &[String], question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.config.system_prompt.clone()),
            ChatMessage::user(context.join("\n")),
            ChatMessage::user(question),
        ]
    }

    /// Retrieve context for `question` and have `composer` phrase the answer.
    pub async fn ask(
        &self,
        composer: &dyn AnswerComposer,
        question: &str,
        top_k: usize,
    ) -> Result<String> {
        let context = self.answer(question, top_k).await?;
        if context.is_empty() {
            info!("Asking without retrieved context");
        }
        let messages = self.build_messages(&context, question);

        let timeout = self.config.call_timeout();
        let answer = tokio::time::timeout(timeout, self.pool.run(composer.complete(&messages)))
            .await
            .map_err(|_| EmbedError::Timeout {
                operation: "completion request",
                after: timeout,
            })??;
        Ok(answer)
    }

    async fn with_index_timeout<T, F>(&self, fut: F) -> std::result::Result<T, IndexError>
    where
        F: std::future::Future<Output = std::result::Result<T, IndexError>>,
    {
        let after = self.config.call_timeout();
        tokio::time::timeout(after, fut)
            .await
            .unwrap_or(Err(IndexError::Timeout { after }))
    }
}
