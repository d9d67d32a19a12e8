//! ragline-retriever: retrieval-augmented answering over plain text
//!
//! This crate turns documents into searchable vector records and answers
//! questions from them. It builds on `ragline-context` for chunking and on
//! `ragline-embed` for the embedding and chat model clients.
//!
//! ## Key Modules
//!
//! - **[`index`]**: the [`VectorIndex`](index::VectorIndex) trait with in-memory and remote backends
//! - **[`retriever`]**: ingestion, search and answer composition
//! - **[`pool`]**: bounded concurrency for external calls
//! - **[`config`]**: TOML configuration and component wiring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ragline_retriever::config::RagConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = RagConfig::default();
//! config.resolve_env_keys();
//!
//! let retriever = config.build_retriever()?;
//! let report = retriever.ingest("Rust is a systems language.", &config.chunking).await?;
//! println!("indexed {} chunks", report.records_upserted);
//!
//! let context = retriever.answer("What is Rust?", 5).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! text → Chunker → WorkerPool(embed) → VectorIndex::upsert
//!                                           ↓
//! question → embed → VectorIndex::query → context → AnswerComposer
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod pool;
pub mod retriever;

pub use error::{IndexError, Result, RetrieverError};
pub use index::{IndexedRecord, Metadata, QueryMatch, QueryResult, VectorIndex};
pub use pool::WorkerPool;
pub use retriever::{IngestReport, IngestWarning, RetrievedChunk, Retriever, RetrieverConfig};
