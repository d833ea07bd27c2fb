use personaforge_core::{Config, GenerationPipeline, SanitizedConfig};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    pipeline: GenerationPipeline,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(config: Config, pipeline: GenerationPipeline, ws_broadcaster: WsBroadcaster) -> Self {
        Self {
            config,
            pipeline,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// The session's generation pipeline.
    pub fn pipeline(&self) -> &GenerationPipeline {
        &self.pipeline
    }

    /// Get the WebSocket broadcaster.
    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
