use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff policy for rate-limited provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each subsequent retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, including provider hints.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_base_delay_ms() -> u64 {
    3_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay before retry number `retry_index` (0-based).
    ///
    /// A provider hint replaces the exponential delay. Both are capped at
    /// `max_delay`.
    pub fn delay_for(&self, retry_index: u32, hint: Option<Duration>) -> Duration {
        let delay = hint.unwrap_or_else(|| {
            let factor = 2u64.saturating_pow(retry_index);
            Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
        });
        delay.min(self.max_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2, None), Duration::from_millis(400));
    }

    #[test]
    fn test_hint_replaces_backoff_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        };
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(120))),
            Duration::from_secs(10)
        );
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_partial() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 2").unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay_ms, 3_000);
    }
}
