use async_trait::async_trait;
use ragline_context::{ChunkConfig, ChunkUnit};
use ragline_embed::{
    AnswerComposer, ChatMessage, EmbedError, EmbeddingProvider, EmbeddingResult, Role,
};
use ragline_retriever::index::memory::MemoryIndex;
use ragline_retriever::index::{IndexedRecord, OFFSET_START_KEY};
use ragline_retriever::{
    IndexError, QueryResult, Retriever, RetrieverConfig, RetrieverError, VectorIndex,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Deterministic embedder over a tiny vocabulary, with scripted failures.
#[derive(Default)]
struct ScriptedEmbedder {
    /// text containing the key fails this many times before succeeding
    fail_times: HashMap<&'static str, usize>,
    /// text containing any of these never embeds
    always_fail: Vec<&'static str>,
    delay: Option<Duration>,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

const VOCAB: [&str; 4] = ["rust", "python", "cooking", "music"];

#[async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    async fn embed_text(&self, text: &str) -> ragline_embed::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let seen = {
            let mut attempts = self.attempts.lock().unwrap();
            let seen = attempts.entry(text.to_string()).or_insert(0);
            *seen += 1;
            *seen
        };
        if self.always_fail.iter().any(|k| text.contains(k)) {
            return Err(EmbedError::embedding_unavailable("model overloaded"));
        }
        for (key, times) in &self.fail_times {
            if text.contains(key) && seen <= *times {
                return Err(EmbedError::embedding_unavailable("rate limited"));
            }
        }

        let lower = text.to_lowercase();
        Ok(VOCAB
            .iter()
            .map(|w| lower.matches(w).count() as f32 + 0.05)
            .collect())
    }

    async fn embed_texts(&self, texts: &[String]) -> ragline_embed::Result<EmbeddingResult> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(out))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(VOCAB.len())
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Composer that records the conversation it was given.
#[derive(Default)]
struct RecordingComposer {
    seen: Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl AnswerComposer for RecordingComposer {
    async fn complete(&self, messages: &[ChatMessage]) -> ragline_embed::Result<String> {
        *self.seen.lock().unwrap() = messages.to_vec();
        Ok(format!("answered from {} messages", messages.len()))
    }

    fn provider_name(&self) -> &str {
        "recording"
    }
}

/// Composer that takes longer than any reasonable call timeout.
struct SlowComposer;

#[async_trait]
impl AnswerComposer for SlowComposer {
    async fn complete(&self, _messages: &[ChatMessage]) -> ragline_embed::Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".into())
    }

    fn provider_name(&self) -> &str {
        "slow"
    }
}

/// Memory index that refuses every upsert after the first `allowed`.
struct FailingIndex {
    inner: MemoryIndex,
    allowed: usize,
    upserts: AtomicUsize,
}

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, records: Vec<IndexedRecord>) -> Result<(), IndexError> {
        if self.upserts.fetch_add(1, Ordering::SeqCst) >= self.allowed {
            return Err(IndexError::unavailable("disk full"));
        }
        self.inner.upsert(records).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<QueryResult, IndexError> {
        self.inner.query(vector, top_k).await
    }

    async fn len(&self) -> Result<usize, IndexError> {
        self.inner.len().await
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    fn backend_name(&self) -> &str {
        "failing"
    }
}

fn fast_config() -> RetrieverConfig {
    RetrieverConfig {
        retry_backoff_ms: 1,
        ..RetrieverConfig::default()
    }
}

fn one_word_chunks() -> ChunkConfig {
    ChunkConfig::new(1, 0, ChunkUnit::Word)
}

const DOCUMENT: &str = "rust python cooking music rust cooking";

#[tokio::test]
async fn flaky_chunks_are_retried_then_reported() {
    let embedder = Arc::new(ScriptedEmbedder {
        fail_times: HashMap::from([("python", 2)]),
        always_fail: vec!["music"],
        ..Default::default()
    });
    let index = Arc::new(MemoryIndex::new());
    let retriever = Retriever::new(embedder.clone(), index.clone(), fast_config());

    let report = retriever
        .ingest(DOCUMENT, &one_word_chunks())
        .await
        .unwrap();

    assert_eq!(report.chunks_total, 6);
    assert_eq!(report.records_upserted, 5);
    assert!(!report.is_complete());
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.chunk_id, 3);
    assert_eq!(warning.attempts, 3);
    assert!(warning.message.contains("model overloaded"));

    // "python" succeeded on its third attempt
    assert_eq!(embedder.attempts.lock().unwrap()["python"], 3);
    assert_eq!(index.len().await.unwrap(), 5);
    assert!(index.get("3").await.is_none());
    let record = index.get("4").await.unwrap();
    assert_eq!(record.text(), Some("rust"));
    assert_eq!(record.metadata[OFFSET_START_KEY], 26);
}

#[tokio::test]
async fn warnings_are_sorted_by_chunk_id() {
    let embedder = Arc::new(ScriptedEmbedder {
        always_fail: vec!["cooking", "music"],
        delay: Some(Duration::from_millis(2)),
        ..Default::default()
    });
    let retriever = Retriever::new(
        embedder,
        Arc::new(MemoryIndex::new()),
        RetrieverConfig {
            embed_attempts: 1,
            ..fast_config()
        },
    );

    let report = retriever
        .ingest(DOCUMENT, &one_word_chunks())
        .await
        .unwrap();
    let ids: Vec<usize> = report.warnings.iter().map(|w| w.chunk_id).collect();
    assert_eq!(ids, vec![2, 3, 5]);
    assert!(report.warnings.iter().all(|w| w.attempts == 1));
}

#[tokio::test]
async fn embedding_concurrency_is_bounded() {
    let embedder = Arc::new(ScriptedEmbedder {
        delay: Some(Duration::from_millis(10)),
        ..Default::default()
    });
    let retriever = Retriever::new(
        embedder.clone(),
        Arc::new(MemoryIndex::new()),
        RetrieverConfig {
            embed_concurrency: 2,
            ..fast_config()
        },
    );

    let text = "rust ".repeat(12);
    let report = retriever.ingest(&text, &one_word_chunks()).await.unwrap();
    assert_eq!(report.records_upserted, 12);
    let peak = embedder.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency was {peak}");
    assert!(peak >= 1);
}

#[tokio::test]
async fn answers_are_ranked_by_similarity() {
    let retriever = Retriever::new(
        Arc::new(ScriptedEmbedder::default()),
        Arc::new(MemoryIndex::new()),
        fast_config(),
    );
    let text = "rust rust rust. python python python. cooking music cooking.";
    retriever
        .ingest(text, &ChunkConfig::new(3, 0, ChunkUnit::Word))
        .await
        .unwrap();

    let context = retriever.answer("tell me about python", 2).await.unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context[0], "python python python.");

    let hits = retriever.search("cooking", 3).await.unwrap();
    assert_eq!(hits[0].text, "cooking music cooking.");
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn empty_index_gives_empty_context_and_still_asks() {
    let retriever = Retriever::new(
        Arc::new(ScriptedEmbedder::default()),
        Arc::new(MemoryIndex::new()),
        fast_config(),
    );
    let composer = RecordingComposer::default();

    let answer = retriever.ask(&composer, "what is rust?", 5).await.unwrap();
    assert_eq!(answer, "answered from 3 messages");
    let seen = composer.seen.lock().unwrap();
    assert_eq!(seen[1].content, "");
    assert_eq!(seen[2].content, "what is rust?");
}

#[tokio::test]
async fn ask_sends_persona_context_and_question() {
    let retriever = Retriever::new(
        Arc::new(ScriptedEmbedder::default()),
        Arc::new(MemoryIndex::new()),
        RetrieverConfig {
            system_prompt: "Answer only from the given info.".into(),
            ..fast_config()
        },
    );
    retriever
        .ingest(
            "rust python cooking music music music",
            &ChunkConfig::new(2, 0, ChunkUnit::Word),
        )
        .await
        .unwrap();

    let composer = RecordingComposer::default();
    retriever.ask(&composer, "music", 2).await.unwrap();

    let seen = composer.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].role, Role::System);
    assert_eq!(seen[0].content, "Answer only from the given info.");
    assert_eq!(seen[1].role, Role::User);
    assert_eq!(seen[1].content, "music music\ncooking music");
    assert_eq!(seen[2], ChatMessage::user("music"));
}

#[tokio::test]
async fn upsert_failure_is_an_error_and_keeps_earlier_batches() {
    let index = Arc::new(FailingIndex {
        inner: MemoryIndex::new(),
        allowed: 1,
        upserts: AtomicUsize::new(0),
    });
    let retriever = Retriever::new(
        Arc::new(ScriptedEmbedder::default()),
        index.clone(),
        RetrieverConfig {
            upsert_batch_size: 4,
            ..fast_config()
        },
    );

    let err = retriever
        .ingest(DOCUMENT, &one_word_chunks())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RetrieverError::Index(IndexError::IndexUnavailable { .. })
    ));
    assert_eq!(index.inner.len().await.unwrap(), 4);
    assert!(index.inner.get("0").await.is_some());
    assert!(index.inner.get("4").await.is_none());
}

#[tokio::test]
async fn invalid_chunking_is_rejected_before_embedding() {
    let embedder = Arc::new(ScriptedEmbedder::default());
    let retriever = Retriever::new(embedder.clone(), Arc::new(MemoryIndex::new()), fast_config());

    let err = retriever
        .ingest(DOCUMENT, &ChunkConfig::new(5, 5, ChunkUnit::Word))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrieverError::Chunk(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_embedder_times_out_per_chunk() {
    let embedder = Arc::new(ScriptedEmbedder {
        delay: Some(Duration::from_millis(1500)),
        ..Default::default()
    });
    let retriever = Retriever::new(
        embedder,
        Arc::new(MemoryIndex::new()),
        RetrieverConfig {
            call_timeout_secs: 1,
            embed_attempts: 1,
            ..fast_config()
        },
    );

    let report = retriever.ingest("rust", &one_word_chunks()).await.unwrap();
    assert_eq!(report.records_upserted, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("timed out"));
}

#[tokio::test]
async fn slow_composer_times_out() {
    let retriever = Retriever::new(
        Arc::new(ScriptedEmbedder::default()),
        Arc::new(MemoryIndex::new()),
        RetrieverConfig {
            call_timeout_secs: 1,
            ..fast_config()
        },
    );
    retriever
        .ingest("rust python", &one_word_chunks())
        .await
        .unwrap();

    let err = retriever.ask(&SlowComposer, "rust", 1).await.unwrap_err();
    assert!(
        matches!(
            err,
            RetrieverError::Embed(EmbedError::Timeout {
                operation: "completion request",
                ..
            })
        ),
        "unexpected error: {err:?}"
    );
}
