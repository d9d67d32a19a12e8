//! # ragline-context
//!
//! Splits raw document text into overlapping word or character windows that
//! are embedded and indexed by `ragline-retriever`. See [`text`] for the
//! windowing rules.

pub mod error;
pub mod text;

// Re-export the main chunking types for external use
pub use error::{ChunkError, Result};
pub use text::{Chunk, ChunkConfig, ChunkUnit, Chunker, chunk_text};
