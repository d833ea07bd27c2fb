pub mod config;
pub mod credentials;
pub mod executor;
pub mod media;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use credentials::{create_credential_provider, CredentialProvider};
pub use executor::{BoundedExecutor, PoolStatus};
pub use model::{
    ContentType, GenerationPhase, ItemEdit, PersonaParameters, RunStatus,
};
pub use orchestrator::{Command, GenerationPipeline, PersonaCard, PipelineConfig, PipelineError};
pub use provider::{GeminiClient, Providers};
pub use store::GenerationResults;
