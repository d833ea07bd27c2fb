//! Domain model shared by every stage of the generation pipeline.

mod media;
mod persona;
mod plan;
mod run;

pub use media::{AspectRatio, Asset, AssetKind, MediaBlob, MediaError, VideoHandle};
pub use persona::{CreativeBrief, PersonaParameters, WardrobeLook, WardrobePrompts};
pub use plan::{
    ContentType, ItemEdit, ItemStatus, PlanItem, PlanItemDraft, PlanItemId, WeekDraft, WeeklyPlan,
};
pub use run::{CredentialAlert, GenerationPhase, LogEntry, LogLevel, RunId, RunStatus};
