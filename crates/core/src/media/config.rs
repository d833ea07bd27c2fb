//! Video synthesis settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the asynchronous video path and its slideshow fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// How often to poll a pending video operation (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Polls before the operation is given up and the slideshow is used.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    /// Output resolution requested from the video model.
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Pause between consecutive slideshow frames (milliseconds).
    #[serde(default = "default_slide_spacing")]
    pub slide_spacing_ms: u64,
}

fn default_poll_interval() -> u64 {
    5000 // 5 seconds
}

fn default_max_polls() -> u32 {
    60 // 5 minutes at the default interval
}

fn default_resolution() -> String {
    "720p".to_string()
}

fn default_slide_spacing() -> u64 {
    1000
}

impl VideoSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn slide_spacing(&self) -> Duration {
        Duration::from_millis(self.slide_spacing_ms)
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
            resolution: default_resolution(),
            slide_spacing_ms: default_slide_spacing(),
        }
    }
}
