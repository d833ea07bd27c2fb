use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::orchestrator::PipelineConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Generative backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub backend: ProviderBackend,
    /// Base URL of the REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Per-request timeout in seconds (default: 120)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderBackend {
    Gemini,
}

impl ProviderBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderBackend::Gemini => "gemini",
        }
    }
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Where the provider API key comes from.
///
/// Environment variables listed in `api_key_env` win over `gemini_api_key`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Vec<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_key_env() -> Vec<String> {
    vec!["GEMINI_API_KEY".to_string(), "GOOGLE_API_KEY".to_string()]
}

/// Model identifiers per capability.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// Creative brief, week rewrites and single items.
    #[serde(default = "default_text_model")]
    pub text: String,
    /// Multi-week content plan.
    #[serde(default = "default_planner_model")]
    pub planner: String,
    #[serde(default = "default_image_primary")]
    pub image_primary: String,
    /// Used once when the primary image model reports exhausted quota.
    #[serde(default = "default_image_secondary")]
    pub image_secondary: Option<String>,
    #[serde(default = "default_video_model")]
    pub video: String,
    #[serde(default = "default_video_extend_model")]
    pub video_extend: String,
    #[serde(default = "default_speech_model")]
    pub speech: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            text: default_text_model(),
            planner: default_planner_model(),
            image_primary: default_image_primary(),
            image_secondary: default_image_secondary(),
            video: default_video_model(),
            video_extend: default_video_extend_model(),
            speech: default_speech_model(),
        }
    }
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_planner_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_image_primary() -> String {
    "gemini-3-pro-image-preview".to_string()
}

fn default_image_secondary() -> Option<String> {
    Some("gemini-2.5-flash-image".to_string())
}

fn default_video_model() -> String {
    "veo-3.1-fast-generate-preview".to_string()
}

fn default_video_extend_model() -> String {
    "veo-3.1-generate-preview".to_string()
}

fn default_speech_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub provider: ProviderConfig,
    pub server: ServerConfig,
    pub credentials: SanitizedCredentialsConfig,
    pub models: ModelConfig,
    pub pipeline: PipelineConfig,
}

/// Sanitized credentials (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCredentialsConfig {
    pub api_key_configured: bool,
    pub api_key_env: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            provider: config.provider.clone(),
            server: config.server.clone(),
            credentials: SanitizedCredentialsConfig {
                api_key_configured: config
                    .credentials
                    .gemini_api_key
                    .as_deref()
                    .is_some_and(|k| !k.trim().is_empty()),
                api_key_env: config.credentials.api_key_env.clone(),
            },
            models: config.models.clone(),
            pipeline: config.pipeline.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[provider]
backend = "gemini"

[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.provider.backend, ProviderBackend::Gemini);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let toml = r#"
[provider]
backend = "gemini"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(
            config.provider.api_base,
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(config.provider.timeout_secs, 120);
        assert_eq!(config.models, ModelConfig::default());
        assert_eq!(
            config.credentials.api_key_env,
            vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        );
        assert!(config.credentials.gemini_api_key.is_none());
        assert_eq!(config.pipeline.batch_concurrency, 1);
        assert_eq!(config.pipeline.retry.max_attempts, 4);
        assert_eq!(config.pipeline.video.max_polls, 60);
    }

    #[test]
    fn test_deserialize_missing_provider_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_unknown_backend_fails() {
        let toml = r#"
[provider]
backend = "openai"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_model_overrides() {
        let toml = r#"
[provider]
backend = "gemini"

[models]
text = "gemini-2.0-flash"
image_secondary = "imagen-4"

[pipeline]
batch_concurrency = 3

[pipeline.retry]
max_attempts = 2
base_delay_ms = 500

[pipeline.video]
poll_interval_ms = 2000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.models.text, "gemini-2.0-flash");
        assert_eq!(config.models.planner, "gemini-2.5-pro");
        assert_eq!(config.models.image_secondary.as_deref(), Some("imagen-4"));
        assert_eq!(config.pipeline.batch_concurrency, 3);
        assert_eq!(config.pipeline.retry.max_attempts, 2);
        assert_eq!(config.pipeline.retry.base_delay_ms, 500);
        assert_eq!(config.pipeline.retry.max_delay_ms, 60_000);
        assert_eq!(config.pipeline.video.poll_interval_ms, 2000);
        assert_eq!(config.pipeline.video.resolution, "720p");
    }

    #[test]
    fn test_sanitized_config_hides_key() {
        let toml = r#"
[provider]
backend = "gemini"

[credentials]
gemini_api_key = "secret-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.credentials.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(json.contains("\"backend\":\"gemini\""));
    }

    #[test]
    fn test_sanitized_config_without_key() {
        let toml = r#"
[provider]
backend = "gemini"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.credentials.api_key_configured);
        assert_eq!(sanitized.server.port, 8080);
    }
}
