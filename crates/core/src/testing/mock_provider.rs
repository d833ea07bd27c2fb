//! Mock generative backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::model::{ContentType, MediaBlob, VideoHandle};
use crate::provider::{
    ImageGenerator, ImageRequest, PcmAudio, ProviderError, ProviderIdentity, SpeechRequest,
    SpeechSynthesizer, TextGenerator, TextRequest, TextTask, VideoGenerator, VideoOperation,
    VideoPoll, VideoRequest,
};

/// Capability of a provider backend, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Text,
    Image,
    Video,
    Speech,
}

/// Mock implementation of every provider capability.
///
/// Provides controllable behavior for testing:
/// - Well-formed default text responses per [`TextTask`]
/// - Persistent failures per capability or per model
/// - One-shot scripted failures consumed in order
/// - Video operations that stay pending for a set number of polls
/// - Simulated latency and peak concurrency tracking
/// - Recorded requests for assertions
///
/// # Example
///
/// ```rust,ignore
/// use personaforge_core::testing::{Capability, MockProvider};
///
/// let mock = Arc::new(MockProvider::new());
/// mock.push_failure(Capability::Image, ProviderError::Http("down".into())).await;
/// mock.set_video_polls(3).await;
///
/// let providers = Providers::from_backend(mock.clone());
/// // ...run the pipeline...
///
/// assert_eq!(mock.image_calls().await.len(), 4);
/// ```
pub struct MockProvider {
    /// Text overrides keyed by task name ("creative_brief", "content_plan", ...).
    text_responses: Arc<RwLock<HashMap<String, String>>>,
    /// Failures returned by every call of a capability.
    capability_errors: Arc<RwLock<HashMap<Capability, ProviderError>>>,
    /// Failures returned by every call naming a model.
    model_errors: Arc<RwLock<HashMap<String, ProviderError>>>,
    /// One-shot failures, consumed by the next calls of a capability.
    scripted: Arc<RwLock<HashMap<Capability, VecDeque<ProviderError>>>>,
    /// Image calls after the first `n` fail with the error.
    image_fail_after: Arc<RwLock<Option<(usize, ProviderError)>>>,
    /// Polls a video operation stays pending before it completes.
    video_polls_until_done: Arc<RwLock<u32>>,
    /// Simulated duration of every call.
    latency: Arc<RwLock<Duration>>,
    /// Poll count per pending operation.
    operations: Arc<RwLock<HashMap<String, u32>>>,
    text_calls: Arc<RwLock<Vec<TextRequest>>>,
    image_calls: Arc<RwLock<Vec<ImageRequest>>>,
    video_calls: Arc<RwLock<Vec<VideoRequest>>>,
    speech_calls: Arc<RwLock<Vec<SpeechRequest>>>,
    total_polls: AtomicU32,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("text_responses", &"<responses>")
            .field("capability_errors", &"<errors>")
            .field("model_errors", &"<errors>")
            .field("scripted", &"<scripted>")
            .field("total_polls", &self.total_polls.load(Ordering::SeqCst))
            .field("peak", &self.peak.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active call counter when a call finishes.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockProvider {
    /// Create a mock that succeeds at everything, with videos ready on the
    /// first poll.
    pub fn new() -> Self {
        Self {
            text_responses: Arc::new(RwLock::new(HashMap::new())),
            capability_errors: Arc::new(RwLock::new(HashMap::new())),
            model_errors: Arc::new(RwLock::new(HashMap::new())),
            scripted: Arc::new(RwLock::new(HashMap::new())),
            image_fail_after: Arc::new(RwLock::new(None)),
            video_polls_until_done: Arc::new(RwLock::new(1)),
            latency: Arc::new(RwLock::new(Duration::ZERO)),
            operations: Arc::new(RwLock::new(HashMap::new())),
            text_calls: Arc::new(RwLock::new(Vec::new())),
            image_calls: Arc::new(RwLock::new(Vec::new())),
            video_calls: Arc::new(RwLock::new(Vec::new())),
            speech_calls: Arc::new(RwLock::new(Vec::new())),
            total_polls: AtomicU32::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Override the text returned for a task (see [`TextTask::as_str`]).
    pub async fn set_text_response(&self, task: &str, response: impl Into<String>) {
        self.text_responses
            .write()
            .await
            .insert(task.to_string(), response.into());
    }

    /// Fail every call of a capability.
    pub async fn fail_capability(&self, capability: Capability, error: ProviderError) {
        self.capability_errors
            .write()
            .await
            .insert(capability, error);
    }

    /// Fail every call that names `model`.
    pub async fn fail_model(&self, model: &str, error: ProviderError) {
        self.model_errors
            .write()
            .await
            .insert(model.to_string(), error);
    }

    /// Fail the next call of a capability once. Queued failures are consumed
    /// in order.
    pub async fn push_failure(&self, capability: Capability, error: ProviderError) {
        self.scripted
            .write()
            .await
            .entry(capability)
            .or_default()
            .push_back(error);
    }

    /// Let the first `successes` image calls through, fail all later ones.
    pub async fn fail_image_after(&self, successes: usize, error: ProviderError) {
        *self.image_fail_after.write().await = Some((successes, error));
    }

    /// Number of polls a video operation stays pending. `u32::MAX` never
    /// completes.
    pub async fn set_video_polls(&self, polls: u32) {
        *self.video_polls_until_done.write().await = polls;
    }

    /// Simulated duration of every call.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    /// Remove every injected failure.
    pub async fn clear_failures(&self) {
        self.capability_errors.write().await.clear();
        self.model_errors.write().await.clear();
        self.scripted.write().await.clear();
        *self.image_fail_after.write().await = None;
    }

    // ========================================================================
    // Recorded calls
    // ========================================================================

    pub async fn text_calls(&self) -> Vec<TextRequest> {
        self.text_calls.read().await.clone()
    }

    pub async fn image_calls(&self) -> Vec<ImageRequest> {
        self.image_calls.read().await.clone()
    }

    pub async fn video_calls(&self) -> Vec<VideoRequest> {
        self.video_calls.read().await.clone()
    }

    pub async fn speech_calls(&self) -> Vec<SpeechRequest> {
        self.speech_calls.read().await.clone()
    }

    /// Total polls across all video operations.
    pub fn video_polls(&self) -> u32 {
        self.total_polls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Simulate latency while counting the call as in flight.
    async fn simulate_call(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.active);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Injected failure for this call, if any. Scripted failures win over
    /// persistent ones.
    async fn injected_error(&self, capability: Capability, model: &str) -> Option<ProviderError> {
        if let Some(queue) = self.scripted.write().await.get_mut(&capability) {
            if let Some(error) = queue.pop_front() {
                return Some(error);
            }
        }
        if let Some(error) = self.capability_errors.read().await.get(&capability) {
            return Some(error.clone());
        }
        self.model_errors.read().await.get(model).cloned()
    }

    async fn text_for(&self, task: &TextTask) -> String {
        if let Some(response) = self.text_responses.read().await.get(task.as_str()) {
            return response.clone();
        }
        default_text(task)
    }
}

/// Well-formed JSON for each task.
fn default_text(task: &TextTask) -> String {
    match task {
        TextTask::CreativeBrief => serde_json::json!({
            "avatarPrompt": "Photorealistic close-up portrait, soft studio light",
            "wardrobePrompts": {
                "casual": "White tee and denim jacket",
                "active": "Black running set",
                "glam": "Emerald evening dress"
            },
            "voiceScript": "Hi, I'm here to share my everyday adventures!"
        })
        .to_string(),
        TextTask::ContentPlan { weeks } => {
            let weeks: Vec<_> = (1..=*weeks)
                .map(|week| {
                    serde_json::json!({
                        "weekNumber": week,
                        "theme": format!("Week {} vibes", week),
                        "items": [
                            draft_json(1, ContentType::Post, week),
                            draft_json(3, ContentType::Reel, week),
                            draft_json(5, ContentType::Story, week),
                        ]
                    })
                })
                .collect();
            serde_json::Value::Array(weeks).to_string()
        }
        TextTask::WeekRewrite { content_types } => {
            let items: Vec<_> = content_types
                .iter()
                .enumerate()
                .map(|(i, t)| draft_json(i as u32 + 1, *t, 0))
                .collect();
            serde_json::Value::Array(items).to_string()
        }
        TextTask::SingleItem { content_type } => draft_json(4, *content_type, 0).to_string(),
    }
}

fn draft_json(day: u32, content_type: ContentType, week: u32) -> serde_json::Value {
    let mut draft = serde_json::json!({
        "day": day,
        "type": content_type.as_str(),
        "title": format!("{} for day {} of week {}", content_type, day, week),
        "description": format!("Morning {} at the beach", content_type),
        "caption": format!("Loving this {}!", content_type),
        "hashtags": ["#daily", "#life"],
    });
    if content_type.is_video() {
        draft["script"] = serde_json::json!("Come with me to the beach today!");
    }
    draft
}

impl ProviderIdentity for MockProvider {
    fn provider(&self) -> &str {
        "mock"
    }
}

#[async_trait]
impl TextGenerator for MockProvider {
    async fn generate_text(&self, request: TextRequest) -> Result<String, ProviderError> {
        self.text_calls.write().await.push(request.clone());
        self.simulate_call().await;

        if let Some(error) = self.injected_error(Capability::Text, &request.model).await {
            return Err(error);
        }
        Ok(self.text_for(&request.task).await)
    }
}

#[async_trait]
impl ImageGenerator for MockProvider {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaBlob, ProviderError> {
        let index = {
            let mut calls = self.image_calls.write().await;
            calls.push(request.clone());
            calls.len() - 1
        };
        self.simulate_call().await;

        if let Some(error) = self.injected_error(Capability::Image, &request.model).await {
            return Err(error);
        }
        if let Some((successes, error)) = self.image_fail_after.read().await.as_ref() {
            if index >= *successes {
                return Err(error.clone());
            }
        }

        // Unique bytes per call so tests can tell images apart.
        let mut data = b"\x89PNG".to_vec();
        data.extend_from_slice(&(index as u32).to_be_bytes());
        Ok(MediaBlob::new("image/png", data))
    }
}

#[async_trait]
impl VideoGenerator for MockProvider {
    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, ProviderError> {
        let index = {
            let mut calls = self.video_calls.write().await;
            calls.push(request.clone());
            calls.len()
        };
        self.simulate_call().await;

        if let Some(error) = self.injected_error(Capability::Video, &request.model).await {
            return Err(error);
        }
        let name = format!("operations/mock-{}", index);
        self.operations.write().await.insert(name.clone(), 0);
        Ok(VideoOperation { name })
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoPoll, ProviderError> {
        self.total_polls.fetch_add(1, Ordering::SeqCst);
        let polls = {
            let mut operations = self.operations.write().await;
            let count = operations.get_mut(&operation.name).ok_or_else(|| ProviderError::Api {
                status: 404,
                message: format!("Operation {} not found", operation.name),
            })?;
            *count += 1;
            *count
        };

        if polls >= *self.video_polls_until_done.read().await {
            let id = operation.name.trim_start_matches("operations/");
            Ok(VideoPoll::Done(VideoHandle(format!("files/{}-video", id))))
        } else {
            Ok(VideoPoll::Pending)
        }
    }

    async fn download_video(&self, handle: &VideoHandle) -> Result<MediaBlob, ProviderError> {
        self.simulate_call().await;
        let mut data = b"\x00\x00\x00\x18ftypmp42".to_vec();
        data.extend_from_slice(handle.as_str().as_bytes());
        Ok(MediaBlob::new("video/mp4", data))
    }
}

#[async_trait]
impl SpeechSynthesizer for MockProvider {
    async fn synthesize(&self, request: SpeechRequest) -> Result<PcmAudio, ProviderError> {
        self.speech_calls.write().await.push(request.clone());
        self.simulate_call().await;

        if let Some(error) = self.injected_error(Capability::Speech, &request.model).await {
            return Err(error);
        }
        Ok(PcmAudio {
            sample_rate: 24_000,
            channels: 1,
            data: vec![0u8; 480],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AspectRatio;

    fn image_request(model: &str) -> ImageRequest {
        ImageRequest {
            model: model.to_string(),
            prompt: "p".to_string(),
            reference: None,
            aspect_ratio: AspectRatio::Square,
        }
    }

    #[tokio::test]
    async fn test_default_plan_matches_requested_weeks() {
        let mock = MockProvider::new();
        let text = mock
            .generate_text(TextRequest::new(
                "m",
                TextTask::ContentPlan { weeks: 2 },
                "plan",
            ))
            .await
            .unwrap();
        let weeks: Vec<crate::model::WeekDraft> = serde_json::from_str(&text).unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[1].week_number, 2);
        assert_eq!(weeks[0].items[1].content_type, ContentType::Reel);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let mock = MockProvider::new();
        mock.push_failure(Capability::Image, ProviderError::Http("first".into()))
            .await;

        assert!(mock.generate_image(image_request("m")).await.is_err());
        assert!(mock.generate_image(image_request("m")).await.is_ok());
        assert_eq!(mock.image_calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_only_hits_that_model() {
        let mock = MockProvider::new();
        mock.fail_model("bad", ProviderError::Http("nope".into())).await;

        assert!(mock.generate_image(image_request("bad")).await.is_err());
        assert!(mock.generate_image(image_request("good")).await.is_ok());
    }

    #[tokio::test]
    async fn test_video_pending_until_poll_count() {
        let mock = MockProvider::new();
        mock.set_video_polls(2).await;
        let op = mock
            .start_video(VideoRequest {
                model: "veo".to_string(),
                prompt: "p".to_string(),
                source: crate::provider::VideoSource::Extend(VideoHandle("files/x".into())),
                aspect_ratio: AspectRatio::Vertical,
                resolution: "720p".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(mock.poll_video(&op).await.unwrap(), VideoPoll::Pending);
        assert!(matches!(
            mock.poll_video(&op).await.unwrap(),
            VideoPoll::Done(_)
        ));
        assert_eq!(mock.video_polls(), 2);
    }
}
