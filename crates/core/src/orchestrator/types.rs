//! Types for the generation pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ContentType, GenerationPhase, PersonaParameters};
use crate::retry::GenerationError;
use crate::store::StoreError;

/// Errors returned by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Another guarded operation is still running.
    #[error("pipeline is busy")]
    Busy,

    /// The operation is not allowed in the current phase.
    #[error("cannot {operation} while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: GenerationPhase,
    },

    #[error("invalid persona parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// The identity anchor has not been produced yet.
    #[error("no identity anchor available")]
    MissingAnchor,

    /// The targeted item is not in a state the operation accepts.
    #[error("item not eligible: {0}")]
    NotReady(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the caller was rejected because of the run's state rather
    /// than the request itself.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            PipelineError::Busy
                | PipelineError::InvalidPhase { .. }
                | PipelineError::MissingAnchor
                | PipelineError::NotReady(_)
                | PipelineError::Store(StoreError::NoPlan)
                | PipelineError::Store(StoreError::InvalidTransition { .. })
        )
    }

    /// Whether the request named a week or item that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::Store(
                StoreError::WeekNotFound(_)
                    | StoreError::ItemNotFoundAt { .. }
                    | StoreError::ItemNotFound(_)
            )
        )
    }
}

/// A guarded pipeline operation.
///
/// Week and item indices are 0-based positions in the content plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Start(Box<PersonaParameters>),
    Approve,
    RegenerateIdentity,
    RegenerateItem {
        week: usize,
        item: usize,
    },
    ExtendVideo {
        week: usize,
        item: usize,
    },
    /// Talking-head selfie reading the item's script or caption.
    RecordSelfie {
        week: usize,
        item: usize,
    },
    /// Animate the still of a ready image item.
    AnimatePhoto {
        week: usize,
        item: usize,
    },
    AddWardrobeItem {
        description: String,
    },
    RegenerateWeek {
        week: usize,
        theme: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    AddContent {
        week: usize,
        content_type: ContentType,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start(_) => "start",
            Command::Approve => "approve",
            Command::RegenerateIdentity => "regenerate_identity",
            Command::RegenerateItem { .. } => "regenerate_item",
            Command::ExtendVideo { .. } => "extend_video",
            Command::RecordSelfie { .. } => "record_selfie",
            Command::AnimatePhoto { .. } => "animate_photo",
            Command::AddWardrobeItem { .. } => "add_wardrobe_item",
            Command::RegenerateWeek { .. } => "regenerate_week",
            Command::AddContent { .. } => "add_content",
        }
    }

    /// Whether the command is accepted in `phase`. Commands that also
    /// depend on captured parameters or item state are checked again at
    /// dispatch.
    pub fn allowed_in(&self, phase: GenerationPhase) -> bool {
        use GenerationPhase::*;
        match self {
            Command::Start(_) => phase.can_start(),
            Command::Approve => phase == ReviewIdentity,
            Command::RegenerateIdentity => matches!(phase, ReviewIdentity | Failed),
            Command::AddWardrobeItem { .. } => matches!(phase, ReviewIdentity | Complete),
            Command::RegenerateItem { .. }
            | Command::ExtendVideo { .. }
            | Command::RecordSelfie { .. }
            | Command::AnimatePhoto { .. }
            | Command::RegenerateWeek { .. }
            | Command::AddContent { .. } => phase == Complete,
        }
    }
}
