//! Generation pipeline: the run state machine and its command dispatcher.
//!
//! A run moves through its phases one guarded command at a time:
//! - **Identity**: creative brief, anchor portrait and wardrobe
//! - **Review**: the operator approves or regenerates the identity
//! - **Campaign**: content plan, narration and automatic media for the
//!   leading weeks
//! - **Complete**: per-item follow-ups until the next start or reset

mod config;
mod export;
mod runner;
mod types;

pub use config::PipelineConfig;
pub use export::{PersonaCard, PERSONA_CARD_VERSION};
pub use runner::GenerationPipeline;
pub use types::{Command, PipelineError};
