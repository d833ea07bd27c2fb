//! Capability traits and request types.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::ProviderError;
use crate::model::{AspectRatio, ContentType, MediaBlob, VideoHandle};

/// Identity of a provider backend, shared by every capability it implements.
pub trait ProviderIdentity: Send + Sync {
    /// Provider name (e.g., "gemini", "mock").
    fn provider(&self) -> &str;
}

// ============================================================================
// Text
// ============================================================================

/// What a text request is for. Used for metrics labels and by test doubles
/// to produce well-formed responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextTask {
    CreativeBrief,
    ContentPlan { weeks: u32 },
    WeekRewrite { content_types: Vec<ContentType> },
    SingleItem { content_type: ContentType },
}

impl TextTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTask::CreativeBrief => "creative_brief",
            TextTask::ContentPlan { .. } => "content_plan",
            TextTask::WeekRewrite { .. } => "week_rewrite",
            TextTask::SingleItem { .. } => "single_item",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model: String,
    pub task: TextTask,
    /// System instruction.
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the provider for a JSON document.
    pub json_output: bool,
}

impl TextRequest {
    pub fn new(model: impl Into<String>, task: TextTask, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            task,
            system: None,
            prompt: prompt.into(),
            json_output: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

#[async_trait]
pub trait TextGenerator: ProviderIdentity {
    async fn generate_text(&self, request: TextRequest) -> Result<String, ProviderError>;
}

// ============================================================================
// Image
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    /// Identity reference the output must stay consistent with.
    pub reference: Option<MediaBlob>,
    pub aspect_ratio: AspectRatio,
}

#[async_trait]
pub trait ImageGenerator: ProviderIdentity {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaBlob, ProviderError>;
}

// ============================================================================
// Video
// ============================================================================

/// Input of a video operation.
#[derive(Debug, Clone)]
pub enum VideoSource {
    /// Animate a still frame.
    Frame(MediaBlob),
    /// Continue a previously generated clip.
    Extend(VideoHandle),
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub model: String,
    pub prompt: String,
    pub source: VideoSource,
    pub aspect_ratio: AspectRatio,
    pub resolution: String,
}

/// Handle to a pending long-running video operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOperation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPoll {
    Pending,
    Done(VideoHandle),
}

/// Asynchronous video synthesis: submit, poll, download.
#[async_trait]
pub trait VideoGenerator: ProviderIdentity {
    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, ProviderError>;

    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoPoll, ProviderError>;

    async fn download_video(&self, handle: &VideoHandle) -> Result<MediaBlob, ProviderError>;
}

// ============================================================================
// Speech
// ============================================================================

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub model: String,
    pub text: String,
    pub voice: String,
}

/// Raw little-endian signed 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmAudio {
    pub sample_rate: u32,
    pub channels: u16,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait SpeechSynthesizer: ProviderIdentity {
    async fn synthesize(&self, request: SpeechRequest) -> Result<PcmAudio, ProviderError>;
}

// ============================================================================
// Bundle
// ============================================================================

/// The set of capability clients handed to the pipeline.
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub video: Arc<dyn VideoGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
}

impl Providers {
    /// Use one backend for every capability.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: TextGenerator + ImageGenerator + VideoGenerator + SpeechSynthesizer + 'static,
    {
        Self {
            text: backend.clone(),
            image: backend.clone(),
            video: backend.clone(),
            speech: backend,
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("text", &self.text.provider())
            .field("image", &self.image.provider())
            .field("video", &self.video.provider())
            .field("speech", &self.speech.provider())
            .finish()
    }
}
