//! Binary media payloads and produced assets.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors decoding media payloads.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),
}

// ============================================================================
// Media Blob
// ============================================================================

/// An immutable blob of media bytes with its MIME type.
///
/// The bytes are reference counted so snapshots of the result store can be
/// cloned without copying image or video data.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaBlob {
    mime_type: String,
    data: Arc<[u8]>,
}

impl MediaBlob {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Decode a base64 payload.
    pub fn from_base64(mime_type: impl Into<String>, encoded: &str) -> Result<Self, MediaError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| MediaError::InvalidBase64(e.to_string()))?;
        Ok(Self::new(mime_type, bytes))
    }

    /// Parse a `data:<mime>;base64,<payload>` URL. A bare base64 string is
    /// accepted and assumed to be a JPEG image.
    pub fn parse(value: &str) -> Result<Self, MediaError> {
        let Some(rest) = value.strip_prefix("data:") else {
            return Self::from_base64("image/jpeg", value);
        };
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| MediaError::InvalidDataUrl("missing ',' separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| MediaError::InvalidDataUrl("only base64 data URLs are supported".to_string()))?;
        if mime_type.is_empty() {
            return Err(MediaError::InvalidDataUrl("missing MIME type".to_string()));
        }
        Self::from_base64(mime_type, payload)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBlob")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

impl Serialize for MediaBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for MediaBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        MediaBlob::parse(&value).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Aspect Ratio
// ============================================================================

/// Frame aspect ratio requested from image and video providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "9:16")]
    Vertical,
    #[serde(rename = "16:9")]
    Landscape,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Vertical => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Assets
// ============================================================================

/// Opaque provider resource handle for a generated video.
///
/// Kept on video assets so the clip can later be extended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoHandle(pub String);

impl VideoHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which synthesis path produced an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Video,
    Slideshow,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Slideshow => "slideshow",
        }
    }
}

/// A produced media asset.
///
/// The shape is the same for every synthesis path; only `kind` tells a
/// renderer how to present it. `media` is the image, the video clip, or the
/// first slide of a slideshow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub kind: AssetKind,
    pub media: MediaBlob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_handle: Option<VideoHandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slides: Vec<MediaBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<MediaBlob>,
}

impl Asset {
    pub fn image(image: MediaBlob) -> Self {
        Self {
            kind: AssetKind::Image,
            media: image,
            video_handle: None,
            slides: Vec::new(),
            narration: None,
        }
    }

    pub fn video(video: MediaBlob, handle: VideoHandle) -> Self {
        Self {
            kind: AssetKind::Video,
            media: video,
            video_handle: Some(handle),
            slides: Vec::new(),
            narration: None,
        }
    }

    /// Build a slideshow. Returns `None` when no slides are given.
    pub fn slideshow(slides: Vec<MediaBlob>, narration: Option<MediaBlob>) -> Option<Self> {
        let media = slides.first()?.clone();
        Some(Self {
            kind: AssetKind::Slideshow,
            media,
            video_handle: None,
            slides,
            narration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_roundtrip_preserves_mime() {
        let blob = MediaBlob::new("image/png", vec![1u8, 2, 3, 4]);
        let url = blob.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(MediaBlob::parse(&url).unwrap(), blob);
    }

    #[test]
    fn test_bare_base64_defaults_to_jpeg() {
        let blob = MediaBlob::parse("AQID").unwrap();
        assert_eq!(blob.mime_type(), "image/jpeg");
        assert_eq!(blob.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_invalid_data_url() {
        assert!(matches!(
            MediaBlob::parse("data:image/png,AQID"),
            Err(MediaError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            MediaBlob::parse("data:image/png;base64,@@@"),
            Err(MediaError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let blob = MediaBlob::new("audio/wav", vec![0u8; 1024]);
        let debug = format!("{:?}", blob);
        assert!(debug.contains("len: 1024"));
    }

    #[test]
    fn test_slideshow_uses_first_slide_as_media() {
        let a = MediaBlob::new("image/png", vec![1u8]);
        let b = MediaBlob::new("image/png", vec![2u8]);
        let asset = Asset::slideshow(vec![a.clone(), b], None).unwrap();
        assert_eq!(asset.kind, AssetKind::Slideshow);
        assert_eq!(asset.media, a);
        assert_eq!(asset.slides.len(), 2);
        assert!(Asset::slideshow(Vec::new(), None).is_none());
    }

    #[test]
    fn test_asset_serializes_kind_snake_case() {
        let asset = Asset::image(MediaBlob::new("image/png", vec![7u8]));
        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["kind"], "image");
        assert!(json.get("slides").is_none());
    }
}
