//! Visual and audio synthesis with capability fallbacks.

use std::future::Future;

use tracing::{debug, info, warn};

use super::config::VideoSettings;
use super::prompts::{self, SceneHints};
use super::voice::{wav_from_pcm, VoiceProfile};
use crate::config::ModelConfig;
use crate::metrics;
use crate::model::{
    AspectRatio, Asset, ContentType, CreativeBrief, CredentialAlert, LogLevel, MediaBlob,
    PersonaParameters, PlanItem, VideoHandle, WardrobeLook,
};
use crate::provider::{
    ImageRequest, ProviderError, Providers, SpeechRequest, VideoPoll, VideoRequest, VideoSource,
};
use crate::retry::{with_retry_notify, GenerationError, RetryEvent, RetryPolicy};

/// Where a run reports progress while media is being produced.
///
/// Any `Fn(LogLevel, &str)` closure is a sink that ignores alerts.
pub trait RunSink: Send + Sync {
    /// Append a user-facing message to the run log.
    fn log(&self, level: LogLevel, message: &str);

    /// A step that degrades instead of failing hit a credential problem.
    fn credential_alert(&self, _alert: CredentialAlert) {}
}

impl<F> RunSink for F
where
    F: Fn(LogLevel, &str) + Send + Sync,
{
    fn log(&self, level: LogLevel, message: &str) {
        self(level, message)
    }
}

pub type RunLog = dyn RunSink;

/// Label of the anchor look.
pub const ANCHOR_LABEL: &str = "Portrait";

/// Label of the anchor when it was imported from a reference image.
pub const REFERENCE_LABEL: &str = "Reference";

/// Produces every media artifact of a run.
///
/// Each provider call goes through the retry governor. Fallbacks:
/// - image: secondary model once when the primary reports exhausted quota
/// - video: slideshow when any step after the base frame fails
#[derive(Debug, Clone)]
pub struct MediaProducer {
    providers: Providers,
    models: ModelConfig,
    retry: RetryPolicy,
    video: VideoSettings,
}

impl MediaProducer {
    pub fn new(
        providers: Providers,
        models: ModelConfig,
        retry: RetryPolicy,
        video: VideoSettings,
    ) -> Self {
        Self {
            providers,
            models,
            retry,
            video,
        }
    }

    pub fn models(&self) -> &ModelConfig {
        &self.models
    }

    pub(super) fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Run one provider call under the retry policy, reporting backoffs to
    /// the run log.
    pub(super) async fn call<T, F, Fut>(
        &self,
        operation: &str,
        log: &RunLog,
        op: F,
    ) -> Result<T, GenerationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let notify = |event: &RetryEvent<'_>| {
            log.log(
                LogLevel::Warning,
                &format!(
                    "Rate limited, retrying in {}s (attempt {}/{})",
                    event.delay.as_secs(),
                    event.attempt,
                    event.max_attempts
                ),
            );
        };
        with_retry_notify(&self.retry, operation, notify, op).await
    }

    // ========================================================================
    // Images
    // ========================================================================

    /// Generate one image, switching to the secondary model once if the
    /// primary reports exhausted quota. When both fail, the secondary's
    /// error is returned.
    pub async fn image(
        &self,
        prompt: String,
        reference: Option<MediaBlob>,
        aspect_ratio: AspectRatio,
        log: &RunLog,
    ) -> Result<MediaBlob, GenerationError> {
        let request = ImageRequest {
            model: self.models.image_primary.clone(),
            prompt,
            reference,
            aspect_ratio,
        };
        let image = self.providers.image.as_ref();

        let primary = self
            .call("image", log, || image.generate_image(request.clone()))
            .await;

        match primary {
            Err(err) if err.is_quota_exhausted() => {
                let Some(secondary) = self.models.image_secondary.clone() else {
                    return Err(err);
                };
                warn!(
                    primary = %request.model,
                    secondary = %secondary,
                    "Primary image model out of quota, using secondary"
                );
                log.log(
                    LogLevel::Warning,
                    &format!("Image quota exhausted, retrying with {}", secondary),
                );
                metrics::FALLBACKS
                    .with_label_values(&["secondary_image_model"])
                    .inc();

                let request = ImageRequest {
                    model: secondary,
                    ..request
                };
                self.call("image_secondary", log, || {
                    image.generate_image(request.clone())
                })
                .await
            }
            other => other,
        }
    }

    /// Close-up portrait that anchors the persona's identity.
    pub async fn portrait(
        &self,
        brief: &CreativeBrief,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<WardrobeLook, GenerationError> {
        log.log(LogLevel::Info, "Generating anchor portrait...");
        let image = self
            .image(
                prompts::portrait_prompt(brief, params),
                None,
                AspectRatio::Vertical,
                log,
            )
            .await?;
        Ok(WardrobeLook::new(ANCHOR_LABEL, image))
    }

    /// One outfit of the anchored persona.
    pub async fn look(
        &self,
        label: &str,
        outfit: &str,
        anchor: &MediaBlob,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<WardrobeLook, GenerationError> {
        log.log(LogLevel::Info, &format!("Generating look: {}", label));
        let image = self
            .image(
                prompts::look_prompt(outfit, params),
                Some(anchor.clone()),
                AspectRatio::Vertical,
                log,
            )
            .await?;
        Ok(WardrobeLook::new(label, image))
    }

    // ========================================================================
    // Plan items
    // ========================================================================

    /// Produce the asset of a plan item, conditioned on the anchor.
    ///
    /// Posts are 3:4 stills and stories 9:16 stills. Reels take the video
    /// path, which only fails if its base frame cannot be produced.
    pub async fn produce_item(
        &self,
        item: &PlanItem,
        anchor: &MediaBlob,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<Asset, GenerationError> {
        let hints = SceneHints::from_description(&item.description);
        let prompt = prompts::scene_prompt(item, params, hints);

        match item.content_type {
            ContentType::Reel => {
                log.log(
                    LogLevel::Info,
                    &format!("Starting video workflow for: {}", item.title),
                );
                log.log(LogLevel::Info, "Step 1/2: Generating scene base frame...");
                let frame = self
                    .image(prompt, Some(anchor.clone()), AspectRatio::Vertical, log)
                    .await?;
                Ok(self
                    .video_or_slideshow(item, anchor, frame, params, hints, log)
                    .await)
            }
            ContentType::Post | ContentType::Story => {
                let aspect_ratio = item.content_type.aspect_ratio();
                log.log(
                    LogLevel::Info,
                    &format!(
                        "Generating image for: {} ({})",
                        item.title,
                        aspect_ratio.as_str()
                    ),
                );
                let image = self
                    .image(prompt, Some(anchor.clone()), aspect_ratio, log)
                    .await?;
                Ok(Asset::image(image))
            }
        }
    }

    /// Animate `frame`; on any failure fall back to a narrated slideshow.
    /// Never fails.
    pub async fn video_or_slideshow(
        &self,
        item: &PlanItem,
        anchor: &MediaBlob,
        frame: MediaBlob,
        params: &PersonaParameters,
        hints: SceneHints,
        log: &RunLog,
    ) -> Asset {
        log.log(LogLevel::Info, "Step 2/2: Animating scene...");
        let request = VideoRequest {
            model: self.models.video.clone(),
            prompt: prompts::motion_prompt(item, hints),
            source: VideoSource::Frame(frame.clone()),
            aspect_ratio: AspectRatio::Vertical,
            resolution: self.video.resolution.clone(),
        };

        match self.animate(request, log).await {
            Ok((video, handle)) => {
                let mut asset = Asset::video(video, handle);
                if let Some(script) = item.script.as_deref() {
                    asset.narration = self.narrate(script, params, log).await;
                }
                asset
            }
            Err(e) => {
                warn!(item = %item.id, error = %e, "Video synthesis failed, falling back to slideshow");
                log.log(
                    LogLevel::Warning,
                    &format!("Video generation failed ({}), falling back to slideshow", e),
                );
                metrics::FALLBACKS.with_label_values(&["slideshow"]).inc();
                raise_alert(log, &e);
                self.slideshow(item, anchor, &frame, params, log).await
            }
        }
    }

    /// Three stills plus narration. A failed still is replaced by `frame`,
    /// so the slideshow always has three slides.
    async fn slideshow(
        &self,
        item: &PlanItem,
        anchor: &MediaBlob,
        frame: &MediaBlob,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Asset {
        let mut slides = Vec::with_capacity(prompts::SLIDE_SHOTS.len());

        for (index, prompt) in prompts::slide_prompts(item, params).into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.video.slide_spacing()).await;
            }
            match self
                .image(prompt, Some(anchor.clone()), AspectRatio::Vertical, log)
                .await
            {
                Ok(slide) => slides.push(slide),
                Err(e) => {
                    warn!(item = %item.id, slide = index + 1, error = %e, "Slide failed, reusing base frame");
                    metrics::FALLBACKS
                        .with_label_values(&["slide_substitute"])
                        .inc();
                    raise_alert(log, &e);
                    slides.push(frame.clone());
                }
            }
        }

        let narration = match item.narration_text() {
            Some(text) => self.narrate(text, params, log).await,
            None => None,
        };

        Asset::slideshow(slides, narration).unwrap_or_else(|| Asset::image(frame.clone()))
    }

    /// Submit a video operation, poll it to completion and download the clip.
    async fn animate(
        &self,
        request: VideoRequest,
        log: &RunLog,
    ) -> Result<(MediaBlob, VideoHandle), GenerationError> {
        let video = self.providers.video.as_ref();
        let operation = self
            .call("video_start", log, || video.start_video(request.clone()))
            .await?;
        log.log(LogLevel::Info, "Video generation started. Waiting for render...");

        let interval = self.video.poll_interval();
        let mut polls = 0u32;
        let handle = loop {
            if polls >= self.video.max_polls {
                return Err(GenerationError::Provider(ProviderError::Timeout(
                    interval * self.video.max_polls,
                )));
            }
            tokio::time::sleep(interval).await;
            polls += 1;

            match self
                .call("video_poll", log, || video.poll_video(&operation))
                .await?
            {
                VideoPoll::Done(handle) => break handle,
                VideoPoll::Pending => {
                    debug!(operation = %operation.name, polls, "Video still rendering");
                }
            }
        };

        let clip = self
            .call("video_download", log, || video.download_video(&handle))
            .await?;
        info!(operation = %operation.name, polls, bytes = clip.len(), "Video ready");
        Ok((clip, handle))
    }

    /// Continue a ready reel. The previous narration is kept; there is no
    /// fallback.
    pub async fn extend_video(
        &self,
        item: &PlanItem,
        handle: &VideoHandle,
        previous: &Asset,
        log: &RunLog,
    ) -> Result<Asset, GenerationError> {
        log.log(LogLevel::Info, &format!("Extending video: {}", item.title));
        let request = VideoRequest {
            model: self.models.video_extend.clone(),
            prompt: prompts::extension_prompt(item),
            source: VideoSource::Extend(handle.clone()),
            aspect_ratio: AspectRatio::Vertical,
            resolution: self.video.resolution.clone(),
        };
        let (clip, handle) = self.animate(request, log).await?;
        let mut asset = Asset::video(clip, handle);
        asset.narration = previous.narration.clone();
        Ok(asset)
    }

    /// Talking-head selfie reading `script`: a front-camera still of the
    /// anchored persona, animated, with the script as narration. There is no
    /// slideshow fallback.
    pub async fn selfie(
        &self,
        script: &str,
        anchor: &MediaBlob,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<Asset, GenerationError> {
        log.log(LogLevel::Info, "Starting selfie generation...");
        let narration = self.narrate(script, params, log).await;

        log.log(LogLevel::Info, "Step 1/2: Generating selfie base frame...");
        let frame = self
            .image(
                prompts::selfie_prompt(params),
                Some(anchor.clone()),
                AspectRatio::Vertical,
                log,
            )
            .await?;

        log.log(LogLevel::Info, "Step 2/2: Animating selfie video...");
        let request = VideoRequest {
            model: self.models.video.clone(),
            prompt: prompts::selfie_motion_prompt(script),
            source: VideoSource::Frame(frame),
            aspect_ratio: AspectRatio::Vertical,
            resolution: self.video.resolution.clone(),
        };
        let (clip, handle) = self.animate(request, log).await?;
        let mut asset = Asset::video(clip, handle);
        asset.narration = narration;
        Ok(asset)
    }

    /// Turn a finished still into a clip. The result can be extended like
    /// any other video.
    pub async fn animate_photo(
        &self,
        item: &PlanItem,
        photo: &MediaBlob,
        log: &RunLog,
    ) -> Result<Asset, GenerationError> {
        log.log(LogLevel::Info, &format!("Animating photo: {}", item.title));
        let request = VideoRequest {
            model: self.models.video.clone(),
            prompt: prompts::photo_motion_prompt(item),
            source: VideoSource::Frame(photo.clone()),
            aspect_ratio: AspectRatio::Vertical,
            resolution: self.video.resolution.clone(),
        };
        let (clip, handle) = self.animate(request, log).await?;
        Ok(Asset::video(clip, handle))
    }

    // ========================================================================
    // Speech
    // ========================================================================

    /// Speak `text` in the persona's voice as WAV.
    pub async fn speech(
        &self,
        text: &str,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Result<MediaBlob, GenerationError> {
        let voice = VoiceProfile::for_persona(params);
        let request = SpeechRequest {
            model: self.models.speech.clone(),
            text: text.to_string(),
            voice: voice.name().to_string(),
        };
        let speech = self.providers.speech.as_ref();
        let pcm = self
            .call("speech", log, || speech.synthesize(request.clone()))
            .await?;
        wav_from_pcm(&pcm).map_err(GenerationError::Provider)
    }

    /// Like [`speech`](Self::speech), but a failure only costs the audio.
    pub async fn narrate(
        &self,
        text: &str,
        params: &PersonaParameters,
        log: &RunLog,
    ) -> Option<MediaBlob> {
        match self.speech(text, params, log).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!(error = %e, "Narration failed");
                log.log(LogLevel::Warning, &format!("Narration failed: {}", e));
                raise_alert(log, &e);
                None
            }
        }
    }
}

/// Report a credential problem from a step whose failure was absorbed.
fn raise_alert(log: &RunLog, error: &GenerationError) {
    if let Some(alert) = error.credential_alert() {
        log.credential_alert(alert);
    }
}
