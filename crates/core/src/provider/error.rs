//! Provider errors and their classification.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use thiserror::Error;

/// Error returned by a provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Empty response: {0}")]
    EmptyResponse(String),

    #[error("Invalid media payload: {0}")]
    InvalidMedia(String),

    #[error("No credential configured for {0}")]
    MissingCredential(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// How the pipeline reacts to a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credential missing or rejected. Fatal, never retried.
    Authentication,
    /// Transient throttling. Retried with backoff.
    RateLimited,
    /// Explicit zero-limit billing signal. Fails fast.
    QuotaExhausted,
    /// Anything else.
    Unavailable,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::QuotaExhausted => "quota_exhausted",
            ErrorCategory::Unavailable => "unavailable",
        }
    }
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Classify the failure.
    ///
    /// A zero-limit signal wins over the generic rate-limit markers because
    /// quota responses carry both.
    pub fn category(&self) -> ErrorCategory {
        if matches!(self, ProviderError::MissingCredential(_)) {
            return ErrorCategory::Authentication;
        }
        if matches!(self.status(), Some(401) | Some(403)) {
            return ErrorCategory::Authentication;
        }

        let text = self.to_string().to_lowercase();
        if text.contains("api key not valid")
            || text.contains("permission_denied")
            || text.contains("unauthenticated")
            || text.contains("not authenticated")
        {
            return ErrorCategory::Authentication;
        }
        if text.contains("limit: 0") || text.contains("limit of 0") {
            return ErrorCategory::QuotaExhausted;
        }
        if matches!(self.status(), Some(429) | Some(503))
            || HTTP_429.is_match(&text)
            || text.contains("quota")
            || text.contains("resource_exhausted")
        {
            return ErrorCategory::RateLimited;
        }
        ErrorCategory::Unavailable
    }

    /// Provider supplied "retry after" hint, if the message carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        retry_after_hint(&self.to_string())
    }
}

static HTTP_429: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b429\b").expect("valid 429 regex"));

static RETRY_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)retry in\s+(\d+(?:\.\d+)?)\s*(ms|s)\b").expect("valid retry-in regex")
});

static RETRY_DELAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)retryDelay"?\s*[:=]\s*"?(\d+(?:\.\d+)?)s"#).expect("valid retryDelay regex")
});

/// Extract a "retry in N s" or `retryDelay: "Ns"` hint from an error message.
pub fn retry_after_hint(message: &str) -> Option<Duration> {
    if let Some(caps) = RETRY_IN.captures(message) {
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2).map(|m| m.as_str().to_lowercase());
        return match unit.as_deref() {
            Some("ms") => Duration::try_from_secs_f64(value / 1000.0).ok(),
            _ => Duration::try_from_secs_f64(value).ok(),
        };
    }
    let caps = RETRY_DELAY.captures(message)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    // Values too large for a Duration are treated as no hint
    Duration::try_from_secs_f64(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> ProviderError {
        ProviderError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_zero_limit_is_quota_exhausted() {
        let err = api(
            429,
            "RESOURCE_EXHAUSTED: Quota exceeded for metric generate_requests, limit: 0",
        );
        assert_eq!(err.category(), ErrorCategory::QuotaExhausted);

        let err = ProviderError::Http("you have a limit of 0 requests".to_string());
        assert_eq!(err.category(), ErrorCategory::QuotaExhausted);
    }

    #[test]
    fn test_rate_limit_markers() {
        assert_eq!(api(429, "slow down").category(), ErrorCategory::RateLimited);
        assert_eq!(api(503, "overloaded").category(), ErrorCategory::RateLimited);
        assert_eq!(
            api(400, "RESOURCE_EXHAUSTED: try later").category(),
            ErrorCategory::RateLimited
        );
        assert_eq!(
            ProviderError::Http("quota exceeded".to_string()).category(),
            ErrorCategory::RateLimited
        );
    }

    #[test]
    fn test_authentication() {
        assert_eq!(
            ProviderError::MissingCredential("gemini".to_string()).category(),
            ErrorCategory::Authentication
        );
        assert_eq!(api(401, "nope").category(), ErrorCategory::Authentication);
        assert_eq!(
            api(400, "API key not valid. Please pass a valid API key.").category(),
            ErrorCategory::Authentication
        );
    }

    #[test]
    fn test_everything_else_is_unavailable() {
        assert_eq!(api(500, "internal").category(), ErrorCategory::Unavailable);
        assert_eq!(
            ProviderError::Json("bad json".to_string()).category(),
            ErrorCategory::Unavailable
        );
        assert_eq!(
            ProviderError::EmptyResponse("no image".to_string()).category(),
            ErrorCategory::Unavailable
        );
    }

    #[test]
    fn test_retry_hint_parsing() {
        assert_eq!(
            retry_after_hint("Please retry in 23.5s."),
            Some(Duration::from_secs_f64(23.5))
        );
        assert_eq!(
            retry_after_hint("Retry in 750ms"),
            Some(Duration::from_millis(750))
        );
        assert_eq!(
            retry_after_hint(r#"{"retryDelay": "12s"}"#),
            Some(Duration::from_secs(12))
        );
        assert_eq!(retry_after_hint("try again later"), None);
    }

    #[test]
    fn test_429_inside_other_numbers_is_not_rate_limited() {
        assert_eq!(
            api(500, "internal error, request id 84291").category(),
            ErrorCategory::Unavailable
        );
        assert_eq!(
            ProviderError::Http("upstream said 429 Too Many Requests".to_string()).category(),
            ErrorCategory::RateLimited
        );
    }

    #[test]
    fn test_oversized_retry_hint_is_ignored() {
        assert_eq!(
            retry_after_hint("RESOURCE_EXHAUSTED retry in 99999999999999999999s"),
            None
        );
        assert_eq!(
            retry_after_hint(r#"{"retryDelay": "99999999999999999999s"}"#),
            None
        );
        assert_eq!(
            retry_after_hint("retry in 99999999999999999999999ms"),
            None
        );
    }

    #[test]
    fn test_retry_after_on_error() {
        let err = api(429, "RESOURCE_EXHAUSTED: busy (retry in 4s)");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(4)));
    }
}
