//! Generative-media provider clients.
//!
//! One async trait per capability (text, image, video, speech). A single
//! backend may implement several of them; the pipeline receives them bundled
//! in [`Providers`].

mod error;
mod gemini;
mod traits;

pub use error::{retry_after_hint, ErrorCategory, ProviderError};
pub use gemini::{GeminiClient, GEMINI_CREDENTIAL};
pub use traits::{
    ImageGenerator, ImageRequest, PcmAudio, ProviderIdentity, Providers, SpeechRequest,
    SpeechSynthesizer, TextGenerator, TextRequest, TextTask, VideoGenerator, VideoOperation,
    VideoPoll, VideoRequest, VideoSource,
};
