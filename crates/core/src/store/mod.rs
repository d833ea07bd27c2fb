//! Result store for a generation run.
//!
//! Holds everything produced so far (brief, wardrobe, narration, content
//! plan) as a copy-on-write snapshot. Writers submit reducer closures that
//! run against the latest state; readers get an `Arc` snapshot that never
//! changes under them.

mod plan;
mod result_store;
mod results;

pub use plan::ContentPlan;
pub use result_store::ResultStore;
pub use results::GenerationResults;

use thiserror::Error;

use crate::model::{ItemStatus, PlanItemId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No content plan exists yet")]
    NoPlan,

    #[error("Week {0} not found")]
    WeekNotFound(usize),

    #[error("Item {item} of week {week} not found")]
    ItemNotFoundAt { week: usize, item: usize },

    #[error("Plan item not found: {0}")]
    ItemNotFound(PlanItemId),

    #[error("Invalid status transition for item {id}: {from} -> {to}")]
    InvalidTransition {
        id: PlanItemId,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("Write belongs to a run that is no longer current")]
    StaleRun,
}
