use thiserror::Error;

use crate::model::CredentialAlert;
use crate::provider::{ErrorCategory, ProviderError};

/// Outcome of a provider call after retry handling.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Authentication failed: {0}")]
    Authentication(ProviderError),

    #[error("Quota/Billing limit reached: {0}")]
    QuotaExhausted(ProviderError),

    #[error("Rate limited after {attempts} attempts: {source}")]
    RateLimited {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Provider(ProviderError),
}

impl GenerationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GenerationError::Authentication(_) => ErrorCategory::Authentication,
            GenerationError::QuotaExhausted(_) => ErrorCategory::QuotaExhausted,
            GenerationError::RateLimited { .. } => ErrorCategory::RateLimited,
            GenerationError::Provider(_) => ErrorCategory::Unavailable,
        }
    }

    /// The underlying provider error.
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            GenerationError::Authentication(e)
            | GenerationError::QuotaExhausted(e)
            | GenerationError::Provider(e) => e,
            GenerationError::RateLimited { source, .. } => source,
        }
    }

    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, GenerationError::QuotaExhausted(_))
    }

    /// Credential action the operator should take, if any.
    pub fn credential_alert(&self) -> Option<CredentialAlert> {
        match self {
            GenerationError::Authentication(_) => Some(CredentialAlert::Reconfigure),
            GenerationError::QuotaExhausted(_) => Some(CredentialAlert::ReplaceKey),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_alerts() {
        let err = ProviderError::Http("x".to_string());
        assert_eq!(
            GenerationError::Authentication(err.clone()).credential_alert(),
            Some(CredentialAlert::Reconfigure)
        );
        assert_eq!(
            GenerationError::QuotaExhausted(err.clone()).credential_alert(),
            Some(CredentialAlert::ReplaceKey)
        );
        assert_eq!(GenerationError::Provider(err).credential_alert(), None);
    }

    #[test]
    fn test_provider_error_passthrough_display() {
        let err = GenerationError::Provider(ProviderError::Api {
            status: 500,
            message: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "API error: 500 - boom");
        assert_eq!(err.category(), ErrorCategory::Unavailable);
    }
}
