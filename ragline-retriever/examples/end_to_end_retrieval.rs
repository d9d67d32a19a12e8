//! End-to-end example of the ingest and retrieval workflow
//!
//! This example shows how to:
//! 1. Plug a custom `EmbeddingProvider` into a `Retriever`
//! 2. Ingest a document into the in-memory index
//! 3. Search the index and build the context passed to a chat model
//!
//! The embedder here hashes words into a small vector so the example runs
//! offline. Swap in `OpenAiEmbedder` for real semantic search.

use anyhow::Result;
use async_trait::async_trait;
use ragline_context::{ChunkConfig, ChunkUnit};
use ragline_embed::{EmbeddingProvider, EmbeddingResult};
use ragline_retriever::index::memory::MemoryIndex;
use ragline_retriever::{Retriever, RetrieverConfig};
use std::sync::Arc;

const DIMENSION: usize = 32;

/// Bag-of-words embedder: each word bumps one hashed slot.
struct HashingEmbedder;

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_text(&self, text: &str) -> ragline_embed::Result<Vec<f32>> {
        let mut vector = vec![0.0; DIMENSION];
        for word in text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if word.is_empty() {
                continue;
            }
            let slot = word
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            vector[slot % DIMENSION] += 1.0;
        }
        Ok(vector)
    }

    async fn embed_texts(&self, texts: &[String]) -> ragline_embed::Result<EmbeddingResult> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(out))
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(DIMENSION)
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

const DOCUMENT: &str = "\
Rust guarantees memory safety without a garbage collector. \
The borrow checker enforces ownership rules at compile time. \
Python is a dynamically typed language popular for scripting. \
Sourdough bread needs a starter, flour, water and patience. \
Tokio is an asynchronous runtime for writing network services in Rust.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("🚀 Starting end-to-end retrieval example...\n");

    let retriever = Retriever::new(
        Arc::new(HashingEmbedder),
        Arc::new(MemoryIndex::with_dimension(DIMENSION)),
        RetrieverConfig {
            embed_concurrency: 2,
            ..RetrieverConfig::default()
        },
    );

    let chunking = ChunkConfig::new(12, 4, ChunkUnit::Word);
    let report = retriever.ingest(DOCUMENT, &chunking).await?;
    println!(
        "📊 Chunks: {}, Records upserted: {}, Warnings: {}",
        report.chunks_total,
        report.records_upserted,
        report.warnings.len()
    );

    let queries = [
        "How does Rust manage memory?",
        "What do I need for bread?",
        "async runtime",
    ];
    for query in queries {
        println!("\n🔍 Query: {query}");
        let hits = retriever.search(query, 2).await?;
        if hits.is_empty() {
            println!("   ❌ No results found");
            continue;
        }
        for (i, hit) in hits.iter().enumerate() {
            println!("   {}. [{:.3}] {}", i + 1, hit.score, hit.text);
        }
    }

    let context = retriever.answer("Which language has a borrow checker?", 2).await?;
    let messages = retriever.build_messages(&context, "Which language has a borrow checker?");
    println!("\n💬 Conversation sent to the chat model:");
    for message in &messages {
        println!("   {:?}: {}", message.role, message.content);
    }

    println!("\n✅ Example completed successfully!");
    Ok(())
}
