//! HTTP and WebSocket front end for the PersonaForge generation pipeline.

pub mod api;
pub mod metrics;
pub mod state;
