//! Gemini REST backend implementing every capability.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use super::error::ProviderError;
use super::traits::{
    ImageGenerator, ImageRequest, PcmAudio, ProviderIdentity, SpeechRequest, SpeechSynthesizer,
    TextGenerator, TextRequest, VideoGenerator, VideoOperation, VideoPoll, VideoRequest,
    VideoSource,
};
use crate::config::ProviderConfig;
use crate::credentials::CredentialProvider;
use crate::model::{MediaBlob, VideoHandle};

/// Service name under which the Gemini API key is looked up.
pub const GEMINI_CREDENTIAL: &str = "gemini";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_SPEECH_RATE: u32 = 24_000;

/// Gemini API client.
///
/// The API key is resolved once when the client is built. A client without a
/// key can still be constructed; every call then fails with
/// [`ProviderError::MissingCredential`].
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn from_config(
        config: &ProviderConfig,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: credentials.credential(GEMINI_CREDENTIAL),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(GEMINI_CREDENTIAL.to_string()))
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<R, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.key()?)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    async fn get_json<R: DeserializeOwned>(&self, url: String) -> Result<R, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("x-goog-api-key", self.key()?)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ProviderError> {
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &error_text));
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Json(e.to_string()))
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);
        debug!(model, "Gemini generateContent");
        self.post_json(url, request).await
    }
}

/// Build an API error, keeping the status string and any retry hint in the
/// message so classification works on it.
fn api_error(status: u16, body: &str) -> ProviderError {
    let Ok(parsed) = serde_json::from_str::<GeminiErrorEnvelope>(body) else {
        return ProviderError::Api {
            status,
            message: body.to_string(),
        };
    };

    let mut message = match parsed.error.status {
        Some(code) => format!("{}: {}", code, parsed.error.message),
        None => parsed.error.message,
    };
    let retry_delay = parsed
        .error
        .details
        .iter()
        .find_map(|d| d.get("retryDelay").and_then(|v| v.as_str()));
    if let Some(delay) = retry_delay {
        message.push_str(&format!(" (retry in {})", delay));
    }
    ProviderError::Api { status, message }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn media(blob: &MediaBlob) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: blob.mime_type().to_string(),
                data: blob.to_base64(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    fn text(&self) -> String {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    fn inline_data(&self) -> Option<&InlineData> {
        self.parts().find_map(|p| p.inline_data.as_ref())
    }

    /// Why no usable output came back.
    fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked: {}", reason);
        }
        match self.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            Some(reason) => format!("finish reason {}", reason),
            None => "no candidates".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<VideoInstance>,
    parameters: VideoParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoInstance {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video: Option<VideoRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    bytes_base64_encoded: String,
    mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct VideoRef {
    uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoParameters {
    aspect_ratio: String,
    resolution: String,
    number_of_videos: u32,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    #[serde(default)]
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSample {
    #[serde(default)]
    video: Option<VideoRef>,
}

impl Operation {
    fn into_poll(self) -> Result<VideoPoll, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::Api {
                status: error.code.unwrap_or(500),
                message: error.message,
            });
        }
        if !self.done {
            return Ok(VideoPoll::Pending);
        }
        self.response
            .and_then(|r| r.generate_video_response)
            .and_then(|r| r.generated_samples.into_iter().find_map(|s| s.video))
            .map(|v| VideoPoll::Done(VideoHandle(v.uri)))
            .ok_or_else(|| {
                ProviderError::EmptyResponse(format!("operation {} finished without a video", self.name))
            })
    }
}

/// Sample rate from a MIME type like `audio/L16;codec=pcm;rate=24000`.
fn sample_rate_from_mime(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("rate="))
        .find_map(|r| r.parse().ok())
        .unwrap_or(DEFAULT_SPEECH_RATE)
}

// ============================================================================
// Capability Implementations
// ============================================================================

impl ProviderIdentity for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(&self, request: TextRequest) -> Result<String, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![Content::text(request.prompt)],
            system_instruction: request.system.map(Content::text),
            generation_config: request.json_output.then(|| GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                ..Default::default()
            }),
        };

        let response = self.generate_content(&request.model, &body).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse(response.empty_reason()));
        }
        Ok(text)
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaBlob, ProviderError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(reference) = &request.reference {
            parts.push(Part::media(reference));
        }
        parts.push(Part::text(request.prompt));

        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string()]),
                image_config: Some(ImageConfig {
                    aspect_ratio: request.aspect_ratio.as_str().to_string(),
                }),
                ..Default::default()
            }),
        };

        let response = self.generate_content(&request.model, &body).await?;
        let data = response
            .inline_data()
            .ok_or_else(|| ProviderError::EmptyResponse(response.empty_reason()))?;
        MediaBlob::from_base64(data.mime_type.clone(), &data.data)
            .map_err(|e| ProviderError::InvalidMedia(e.to_string()))
    }
}

#[async_trait]
impl VideoGenerator for GeminiClient {
    async fn start_video(&self, request: VideoRequest) -> Result<VideoOperation, ProviderError> {
        let (image, video) = match &request.source {
            VideoSource::Frame(frame) => (
                Some(ImagePayload {
                    bytes_base64_encoded: frame.to_base64(),
                    mime_type: frame.mime_type().to_string(),
                }),
                None,
            ),
            VideoSource::Extend(handle) => (
                None,
                Some(VideoRef {
                    uri: handle.as_str().to_string(),
                }),
            ),
        };

        let body = PredictRequest {
            instances: vec![VideoInstance {
                prompt: request.prompt,
                image,
                video,
            }],
            parameters: VideoParameters {
                aspect_ratio: request.aspect_ratio.as_str().to_string(),
                resolution: request.resolution,
                number_of_videos: 1,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:predictLongRunning",
            self.api_base, request.model
        );
        let operation: Operation = self.post_json(url, &body).await?;
        debug!(operation = %operation.name, "Started video operation");
        Ok(VideoOperation {
            name: operation.name,
        })
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<VideoPoll, ProviderError> {
        let url = format!("{}/v1beta/{}", self.api_base, operation.name);
        let operation: Operation = self.get_json(url).await?;
        operation.into_poll()
    }

    async fn download_video(&self, handle: &VideoHandle) -> Result<MediaBlob, ProviderError> {
        let response = self
            .client
            .get(handle.as_str())
            .header("x-goog-api-key", self.key()?)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &error_text));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyResponse(format!(
                "video download from {} returned no data",
                handle
            )));
        }
        Ok(MediaBlob::new(mime_type, bytes.to_vec()))
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, request: SpeechRequest) -> Result<PcmAudio, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![Content::text(request.text)],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: request.voice,
                        },
                    },
                }),
                ..Default::default()
            }),
        };

        let response = self.generate_content(&request.model, &body).await?;
        let data = response
            .inline_data()
            .ok_or_else(|| ProviderError::EmptyResponse(response.empty_reason()))?;
        let pcm = MediaBlob::from_base64(data.mime_type.clone(), &data.data)
            .map_err(|e| ProviderError::InvalidMedia(e.to_string()))?;

        Ok(PcmAudio {
            sample_rate: sample_rate_from_mime(&data.mime_type),
            channels: 1,
            data: pcm.data().to_vec(),
        })
    }
}
