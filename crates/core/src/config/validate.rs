use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Provider section exists (enforced by serde)
/// - Server port is not 0
/// - Batch concurrency is at least 1
/// - Retry policy allows at least one attempt
/// - Video polling interval and poll budget are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Pipeline validation
    let pipeline = &config.pipeline;
    if pipeline.batch_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.batch_concurrency must be at least 1".to_string(),
        ));
    }
    if pipeline.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if pipeline.video.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.video.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if pipeline.video.max_polls == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.video.max_polls cannot be 0".to_string(),
        ));
    }

    if config.provider.api_base.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "provider.api_base cannot be empty".to_string(),
        ));
    }

    Ok(())
}
