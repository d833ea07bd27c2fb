//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides a mock of every provider capability, allowing the
//! whole generation pipeline to run without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use personaforge_core::testing::{fixtures, MockProvider};
//!
//! let mock = Arc::new(MockProvider::new());
//! mock.set_video_polls(2).await;
//!
//! let pipeline = fixtures::pipeline(mock.clone());
//! pipeline.start(fixtures::persona_parameters()).await?;
//! ```

mod mock_provider;

pub use mock_provider::{Capability, MockProvider};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::MockProvider;
    use crate::config::ModelConfig;
    use crate::media::{MediaProducer, VideoSettings};
    use crate::model::{
        ContentType, CreativeBrief, MediaBlob, PersonaParameters, PlanItem, PlanItemDraft,
        WardrobePrompts,
    };
    use crate::orchestrator::{GenerationPipeline, PipelineConfig};
    use crate::provider::Providers;
    use crate::retry::RetryPolicy;

    /// Persona with reasonable defaults: one week, no automatic media.
    pub fn persona_parameters() -> PersonaParameters {
        PersonaParameters {
            gender: "female".to_string(),
            ethnicity: "Mediterranean".to_string(),
            age: 27,
            style: "fitness".to_string(),
            audience: "young professionals".to_string(),
            custom_theme: None,
            body_type: Some("athletic".to_string()),
            personality: Some("energetic".to_string()),
            traits: vec!["freckles".to_string()],
            output_language: "English".to_string(),
            reference_image: None,
            plan_weeks: 1,
            auto_generate_weeks: 0,
        }
    }

    pub fn brief() -> CreativeBrief {
        CreativeBrief {
            avatar_prompt: "Close-up portrait".to_string(),
            wardrobe_prompts: WardrobePrompts {
                casual: "Jeans".to_string(),
                active: "Running gear".to_string(),
                glam: "Gown".to_string(),
            },
            voice_script: "Welcome to my channel!".to_string(),
        }
    }

    /// A plan item with status `Empty`.
    pub fn plan_item(content_type: ContentType) -> PlanItem {
        PlanItem::from_draft(PlanItemDraft {
            day: 2,
            content_type,
            title: format!("Test {}", content_type),
            description: "Morning stretch in the park".to_string(),
            caption: "Start the day right".to_string(),
            hashtags: vec!["#morning".to_string()],
            script: None,
        })
    }

    pub fn image_blob() -> MediaBlob {
        MediaBlob::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0])
    }

    pub fn video_blob() -> MediaBlob {
        MediaBlob::new("video/mp4", b"\x00\x00\x00\x18ftypmp42".to_vec())
    }

    /// Pipeline settings: sequential batch, default retry and video timing.
    pub fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            batch_concurrency: 1,
            retry: RetryPolicy::default(),
            video: VideoSettings::default(),
        }
    }

    /// Media producer backed by `mock` with default models.
    pub fn media_producer(mock: Arc<MockProvider>) -> MediaProducer {
        let config = pipeline_config();
        MediaProducer::new(
            Providers::from_backend(mock),
            ModelConfig::default(),
            config.retry,
            config.video,
        )
    }

    /// Pipeline backed by `mock`.
    pub fn pipeline(mock: Arc<MockProvider>) -> GenerationPipeline {
        pipeline_with_config(mock, pipeline_config())
    }

    pub fn pipeline_with_config(
        mock: Arc<MockProvider>,
        config: PipelineConfig,
    ) -> GenerationPipeline {
        GenerationPipeline::new(
            Providers::from_backend(mock),
            ModelConfig::default(),
            config,
        )
    }
}
