//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::media::VideoSettings;
use crate::retry::RetryPolicy;

/// Configuration for the generation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum plan items produced at the same time during a batch.
    /// 1 produces items strictly in plan order.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Backoff for rate-limited provider calls.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Video polling and slideshow fallback.
    #[serde(default)]
    pub video: VideoSettings,
}

fn default_batch_concurrency() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_concurrency: default_batch_concurrency(),
            retry: RetryPolicy::default(),
            video: VideoSettings::default(),
        }
    }
}
