//! In-process vector index with an exhaustive cosine scan

use super::{
    IndexedRecord, QueryMatch, QueryResult, VectorIndex, check_batch, check_query, cosine_from_parts, dot,
    l2_norm,
};
use crate::error::{IndexError, IndexResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::Mutex;

struct Entry {
    record: IndexedRecord,
    norm: f64,
    /// Position in insertion order; ties in score rank by this.
    seq: u64,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    next_seq: u64,
    dimension: Option<usize>,
}

/// Vector index held entirely in memory.
///
/// Queries compare against every stored record, so cost grows linearly with
/// the number of records times their dimension. Readers and writers share a
/// single lock.
#[derive(Default)]
pub struct MemoryIndex {
    state: Mutex<State>,
    /// Mirror of `State::dimension` readable without the lock; 0 means unset.
    dimension: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index whose dimension is fixed up front.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            state: Mutex::new(State {
                dimension: (dimension > 0).then_some(dimension),
                ..State::default()
            }),
            dimension: AtomicUsize::new(dimension),
        }
    }

    /// Stored record with the given id.
    pub async fn get(&self, id: &str) -> Option<IndexedRecord> {
        let state = self.state.lock().await;
        state.entries.get(id).map(|e| e.record.clone())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: Vec<IndexedRecord>) -> IndexResult<()> {
        let mut state = self.state.lock().await;
        let dimension = check_batch(&records, state.dimension)?;

        let count = records.len();
        for record in records {
            let norm = l2_norm(&record.vector);
            if let Some(existing) = state.entries.get_mut(&record.id) {
                existing.record = record;
                existing.norm = norm;
                continue;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state
                .entries
                .insert(record.id.clone(), Entry { record, norm, seq });
        }

        if state.dimension.is_none() {
            if let Some(d) = dimension {
                state.dimension = Some(d);
                self.dimension.store(d, AtomicOrdering::Release);
            }
        }
        tracing::debug!(
            "Upserted {} records into memory index ({} total)",
            count,
            state.entries.len()
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> IndexResult<QueryResult> {
        let state = self.state.lock().await;
        check_query(vector, top_k, state.dimension)?;
        if state.entries.is_empty() {
            return Err(IndexError::EmptyIndex);
        }

        let query_norm = l2_norm(vector);
        if query_norm == 0.0 {
            return Err(IndexError::DegenerateVector { id: "query".into() });
        }

        let mut scored: Vec<(f32, u64, &IndexedRecord)> = Vec::with_capacity(state.entries.len());
        for entry in state.entries.values() {
            if entry.norm == 0.0 {
                tracing::warn!(
                    "Skipping record '{}' with zero-norm vector during query",
                    entry.record.id
                );
                continue;
            }
            let score = cosine_from_parts(dot(vector, &entry.record.vector), query_norm, entry.norm);
            scored.push((score, entry.seq, &entry.record));
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, _, record)| QueryMatch {
                id: record.id.clone(),
                score,
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn len(&self) -> IndexResult<usize> {
        Ok(self.state.lock().await.entries.len())
    }

    fn dimension(&self) -> Option<usize> {
        match self.dimension.load(AtomicOrdering::Acquire) {
            0 => None,
            d => Some(d),
        }
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
