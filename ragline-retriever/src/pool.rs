//! Bounded concurrency for calls to external services

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Caps the number of futures in flight at once.
///
/// The limit holds across every caller sharing the pool (clones share
/// permits), not only within a single [`map`](WorkerPool::map) call.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl WorkerPool {
    /// A pool running at most `limit` futures at once. A limit of 0 is raised to 1.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a free slot, then drive `fut` to completion while holding it.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        // the semaphore is never closed, so acquire only fails if that changes
        let _permit = self.semaphore.acquire().await.ok();
        fut.await
    }

    /// Apply `f` to every item with at most `limit` calls in flight.
    ///
    /// Results come back in completion order.
    pub async fn map<I, T, F, Fut>(&self, items: I, mut f: F) -> Vec<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        stream::iter(items)
            .map(|item| self.run(f(item)))
            .buffer_unordered(self.limit)
            .collect()
            .await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(5)
    }
}
