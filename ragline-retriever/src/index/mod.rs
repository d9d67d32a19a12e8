//! Vector index abstraction
//!
//! A [`VectorIndex`] stores [`IndexedRecord`]s (id, vector, metadata) and
//! answers top-K cosine-similarity queries over them. Two backends implement
//! it:
//!
//! - [`memory::MemoryIndex`]: a linear scan over records held in process
//! - [`remote::RemoteIndex`]: a client for a Pinecone-style REST service
//!
//! Both are used through `Arc<dyn VectorIndex>` so the retriever does not
//! care which one it talks to.
//!
//! ## Contract
//!
//! - All vectors in one index share a single dimension. The first accepted
//!   record fixes it unless the backend was configured with one.
//! - `upsert` validates the whole batch before applying any of it and
//!   overwrites records with the same id.
//! - `query` returns at most `top_k` matches in descending score order, fails
//!   with [`IndexError::InvalidTopK`] for `top_k == 0` and with
//!   [`IndexError::EmptyIndex`] when there is nothing to search.

use crate::error::{IndexError, IndexResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod memory;
pub mod remote;

/// Free-form record metadata, kept in key order so serialized records are stable.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key holding the chunk text of a record.
pub const TEXT_KEY: &str = "originalText";
/// Metadata key holding the byte offset where the chunk starts in its source.
pub const OFFSET_START_KEY: &str = "sourceOffsetStart";
/// Metadata key holding the byte offset where the chunk ends in its source.
pub const OFFSET_END_KEY: &str = "sourceOffsetEnd";

/// A vector stored in the index together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub id: String,
    #[serde(rename = "values")]
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl IndexedRecord {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The chunk text stored under [`TEXT_KEY`], if any.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(|v| v.as_str())
    }
}

/// One ranked hit of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl QueryMatch {
    pub fn text(&self) -> Option<&str> {
        self.metadata.get(TEXT_KEY).and_then(|v| v.as_str())
    }
}

/// Matches in descending score order.
pub type QueryResult = Vec<QueryMatch>;

/// Storage and similarity search for embedding vectors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records. Either every record is accepted or none is.
    async fn upsert(&self, records: Vec<IndexedRecord>) -> IndexResult<()>;

    /// The `top_k` records most similar to `vector`.
    async fn query(&self, vector: &[f32], top_k: usize) -> IndexResult<QueryResult>;

    /// Number of stored records
    async fn len(&self) -> IndexResult<usize>;

    async fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Dimension shared by all stored vectors, once established
    fn dimension(&self) -> Option<usize>;

    /// Short name of the backend, for logs and diagnostics
    fn backend_name(&self) -> &str;
}

/// L2 norm of `v`, accumulated in f64 so finite f32 components never
/// overflow or underflow the sum of squares.
pub fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

/// Cosine similarity of two vectors of equal length.
///
/// Fails with [`IndexError::DimensionMismatch`] when the lengths differ and
/// with [`IndexError::DegenerateVector`] when either operand has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> IndexResult<f32> {
    if a.len() != b.len() {
        return Err(IndexError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let norm_a = l2_norm(a);
    if norm_a == 0.0 {
        return Err(IndexError::DegenerateVector { id: "lhs".into() });
    }
    let norm_b = l2_norm(b);
    if norm_b == 0.0 {
        return Err(IndexError::DegenerateVector { id: "rhs".into() });
    }
    Ok(cosine_from_parts(dot(a, b), norm_a, norm_b))
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum()
}

/// Divide in f64 and narrow once. Both norms must be non-zero.
pub(crate) fn cosine_from_parts(dot: f64, norm_a: f64, norm_b: f64) -> f32 {
    (dot / (norm_a * norm_b)) as f32
}

/// Reject `top_k == 0` and vectors of the wrong length before touching a backend.
pub(crate) fn check_query(vector: &[f32], top_k: usize, dimension: Option<usize>) -> IndexResult<()> {
    if top_k == 0 {
        return Err(IndexError::InvalidTopK);
    }
    if let Some(expected) = dimension {
        if vector.len() != expected {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }
    Ok(())
}

/// Check that every record in a batch has the same non-zero length, and that
/// it matches `dimension` when one is already set. Returns the batch dimension.
pub(crate) fn check_batch(records: &[IndexedRecord], dimension: Option<usize>) -> IndexResult<Option<usize>> {
    let mut expected = dimension;
    for record in records {
        if record.vector.is_empty() {
            return Err(IndexError::DegenerateVector {
                id: record.id.clone(),
            });
        }
        match expected {
            Some(d) if d != record.vector.len() => {
                return Err(IndexError::DimensionMismatch {
                    expected: d,
                    actual: record.vector.len(),
                });
            }
            Some(_) => {}
            None => expected = Some(record.vector.len()),
        }
    }
    Ok(expected)
}
