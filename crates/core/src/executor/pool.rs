use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::debug;

use super::types::{BatchReport, PoolStatus, Settlement};

/// Tracks statistics for the pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Runs batches of tasks under a concurrency ceiling.
///
/// The ceiling is shared by every batch run on the same executor. Slots are
/// handed out first come first served, so with a limit of 1 tasks run
/// strictly in submission order.
pub struct BoundedExecutor {
    name: String,
    limit: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl BoundedExecutor {
    /// A limit of 0 is treated as 1.
    pub fn new(name: impl Into<String>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            name: name.into(),
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(&self.name, self.limit)
    }

    /// Run `task` for every item and wait until all have settled.
    ///
    /// `task` should do its work inside the returned future; it is invoked
    /// for every item up front and the futures are only polled once a slot
    /// is free. `on_settled` is called after each task finishes.
    pub async fn run<T, R, E, F, Fut, S>(
        &self,
        items: Vec<T>,
        task: F,
        mut on_settled: S,
    ) -> BatchReport<R, E>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
        S: FnMut(Settlement<'_, R, E>),
    {
        let total = items.len();
        debug!(pool = %self.name, total, limit = self.limit, "Starting batch");

        let mut pending: FuturesUnordered<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let future = task(index, item);
                let semaphore = Arc::clone(&self.semaphore);
                let stats = Arc::clone(&self.stats);
                stats.queued.fetch_add(1, Ordering::Relaxed);
                async move {
                    // The semaphore is never closed.
                    let permit = semaphore.acquire_owned().await.ok();
                    stats.queued.fetch_sub(1, Ordering::Relaxed);
                    stats.active.fetch_add(1, Ordering::Relaxed);

                    let result = future.await;

                    stats.active.fetch_sub(1, Ordering::Relaxed);
                    stats.total_processed.fetch_add(1, Ordering::Relaxed);
                    if result.is_err() {
                        stats.total_failed.fetch_add(1, Ordering::Relaxed);
                    }
                    drop(permit);
                    (index, result)
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(total);
        let mut succeeded = 0;
        while let Some((index, outcome)) = pending.next().await {
            if outcome.is_ok() {
                succeeded += 1;
            }
            on_settled(Settlement {
                index,
                settled: outcomes.len() + 1,
                total,
                outcome: &outcome,
            });
            outcomes.push((index, outcome));
        }
        outcomes.sort_by_key(|(index, _)| *index);

        debug!(pool = %self.name, total, succeeded, "Batch settled");
        BatchReport {
            total,
            succeeded,
            failed: total - succeeded,
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        }
    }
}
