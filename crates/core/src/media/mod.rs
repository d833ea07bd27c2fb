//! Media production: prompts, provider calls and capability fallbacks.
//!
//! [`MediaProducer`] turns persona parameters and plan items into images,
//! video clips, slideshows, narration and text, each provider call running
//! under the retry governor.

mod config;
mod copywriter;
mod producer;
pub mod prompts;
mod voice;

pub use config::VideoSettings;
pub use producer::{MediaProducer, RunLog, RunSink, ANCHOR_LABEL, REFERENCE_LABEL};
pub use prompts::SceneHints;
pub use voice::{wav_from_pcm, VoiceProfile};
