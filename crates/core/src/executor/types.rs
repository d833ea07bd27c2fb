//! Types for the executor module.

use serde::{Deserialize, Serialize};

/// Status of an executor pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name (e.g., "media").
    pub name: String,
    /// Number of tasks currently running.
    pub active_jobs: usize,
    /// Maximum concurrent tasks.
    pub max_concurrent: usize,
    /// Tasks submitted but waiting for a slot.
    pub queued_jobs: usize,
    /// Total tasks settled since startup.
    pub total_processed: u64,
    /// Total tasks failed since startup.
    pub total_failed: u64,
}

/// Passed to the settlement callback after each task finishes.
#[derive(Debug)]
pub struct Settlement<'a, R, E> {
    /// Submission index of the task.
    pub index: usize,
    /// Number of tasks settled so far, including this one.
    pub settled: usize,
    pub total: usize,
    pub outcome: &'a Result<R, E>,
}

/// Result of a whole batch. `outcomes` is in submission order.
#[derive(Debug)]
pub struct BatchReport<R, E> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<Result<R, E>>,
}

impl<R, E> BatchReport<R, E> {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
