//! Bounded-concurrency batch execution.
//!
//! Runs a batch of independent tasks with at most `limit` in flight. A failed
//! task never cancels its siblings, and [`BoundedExecutor::run`] resolves only
//! once every task has settled.

mod pool;
mod types;

pub use pool::BoundedExecutor;
pub use types::{BatchReport, PoolStatus, Settlement};
