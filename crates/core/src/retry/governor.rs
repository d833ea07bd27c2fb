use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::GenerationError;
use super::policy::RetryPolicy;
use crate::metrics;
use crate::provider::{ErrorCategory, ProviderError};

/// Notification sent before each backoff sleep.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    pub operation: &'a str,
    /// Attempt that just failed (1-based).
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub error: &'a ProviderError,
}

/// Run `op` under `policy`.
///
/// - Rate limited: sleep (hint or exponential backoff) and try again.
/// - Quota exhausted or authentication: return at once, no delay.
/// - Anything else: returned untouched as [`GenerationError::Provider`].
///
/// Exhausting `max_attempts` returns the last rate-limit error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    with_retry_notify(policy, operation, |_: &RetryEvent<'_>| {}, op).await
}

/// Like [`with_retry`], calling `notify` before every backoff sleep.
pub async fn with_retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    operation: &str,
    mut notify: N,
    mut op: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
    N: FnMut(&RetryEvent<'_>),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let started = Instant::now();
        let result = op().await;
        metrics::PROVIDER_DURATION
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());

        let error = match result {
            Ok(value) => {
                metrics::PROVIDER_REQUESTS
                    .with_label_values(&[operation, "success"])
                    .inc();
                if attempt > 1 {
                    debug!(operation, attempt, "Provider call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        metrics::PROVIDER_REQUESTS
            .with_label_values(&[operation, "error"])
            .inc();
        let category = error.category();
        metrics::PROVIDER_FAILURES
            .with_label_values(&[operation, category.as_str()])
            .inc();

        match category {
            ErrorCategory::Authentication => {
                warn!(operation, error = %error, "Provider rejected credentials");
                return Err(GenerationError::Authentication(error));
            }
            ErrorCategory::QuotaExhausted => {
                warn!(operation, error = %error, "Quota exhausted, not retrying");
                return Err(GenerationError::QuotaExhausted(error));
            }
            ErrorCategory::Unavailable => {
                return Err(GenerationError::Provider(error));
            }
            ErrorCategory::RateLimited => {
                if attempt >= max_attempts {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "Rate limited, retries exhausted"
                    );
                    return Err(GenerationError::RateLimited {
                        attempts: attempt,
                        source: error,
                    });
                }

                let delay = policy.delay_for(attempt - 1, error.retry_after());
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                metrics::RETRY_ATTEMPTS.with_label_values(&[operation]).inc();
                notify(&RetryEvent {
                    operation,
                    attempt,
                    max_attempts,
                    delay,
                    error: &error,
                });
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ProviderError {
        ProviderError::Api {
            status: 429,
            message: "RESOURCE_EXHAUSTED: too many requests".to_string(),
        }
    }

    fn quota() -> ProviderError {
        ProviderError::Api {
            status: 429,
            message: "Quota exceeded, limit: 0".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_success() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let mut calls = Vec::new();

        let result = with_retry(&policy, "test", || {
            calls.push(tokio::time::Instant::now());
            let n = calls.len();
            async move {
                if n <= 2 {
                    Err(rate_limited())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_secs(2));
        assert!(calls[2] - calls[1] >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hint_is_honored() {
        let policy = RetryPolicy::new(2, Duration::from_secs(30));
        let mut calls = Vec::new();

        let result = with_retry(&policy, "test", || {
            calls.push(tokio::time::Instant::now());
            let first = calls.len() == 1;
            async move {
                if first {
                    Err(ProviderError::Api {
                        status: 429,
                        message: "RESOURCE_EXHAUSTED (retry in 5s)".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        let gap = calls[1] - calls[0];
        assert!(gap >= Duration::from_secs(5));
        assert!(gap < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_hint_falls_back_to_backoff() {
        let policy = RetryPolicy::new(2, Duration::from_secs(2));
        let mut calls = Vec::new();

        let result = with_retry(&policy, "test", || {
            calls.push(tokio::time::Instant::now());
            let first = calls.len() == 1;
            async move {
                if first {
                    Err(ProviderError::Api {
                        status: 429,
                        message: "retry in 99999999999999999999s".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        let gap = calls[1] - calls[0];
        assert!(gap >= Duration::from_secs(2));
        assert!(gap <= policy.max_delay());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_fails_fast_without_delay() {
        let policy = RetryPolicy::new(5, Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();

        let counter = calls.clone();
        let result: Result<(), _> = with_retry(&policy, "test", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(quota()) }
        })
        .await;

        assert!(matches!(result, Err(GenerationError::QuotaExhausted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_returned_untouched() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = with_retry(&policy, "test", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ProviderError::Api {
                    status: 400,
                    message: "invalid argument".to_string(),
                })
            }
        })
        .await;

        match result {
            Err(GenerationError::Provider(ProviderError::Api { status, message })) => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid argument");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_is_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let result: Result<(), _> = with_retry(&policy, "test", || async {
            Err(ProviderError::MissingCredential("gemini".to_string()))
        })
        .await;
        assert!(matches!(result, Err(GenerationError::Authentication(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = with_retry(&policy, "test", || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                Err(ProviderError::Api {
                    status: 429,
                    message: format!("attempt {}", n),
                })
            }
        })
        .await;

        match result {
            Err(GenerationError::RateLimited { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("attempt 3"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_called_before_each_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let mut events = Vec::new();

        let _: Result<(), _> = with_retry_notify(
            &policy,
            "notify",
            |event: &RetryEvent<'_>| events.push((event.attempt, event.delay)),
            || async { Err(rate_limited()) },
        )
        .await;

        assert_eq!(
            events,
            vec![
                (1, Duration::from_millis(100)),
                (2, Duration::from_millis(200))
            ]
        );
    }
}
