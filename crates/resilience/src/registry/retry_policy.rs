//! Delay and eligibility rules for retrying a failed call.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::errors::{ErrorKind, RecoveryStrategy};

/// Multiplier applied to the base delay for quota exhaustion.
const QUOTA_WAIT_FACTOR: u32 = 5;

/// Upper bound on any computed delay.
const MAX_DELAY: Duration = Duration::from_secs(3600);

/// Deterministic retry policy derived from a [`RetryConfig`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    base_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            base_delay,
            backoff_multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.backoff_multiplier)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn next_delay(&self, strategy: RecoveryStrategy, attempt: u32) -> Duration {
        let attempt = attempt.max(1);

        let delay = match strategy {
            RecoveryStrategy::ExponentialBackoff => {
                let factor = self.backoff_multiplier.powi((attempt - 1) as i32);
                let secs = self.base_delay.as_secs_f64() * factor;
                if secs.is_finite() && secs < MAX_DELAY.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    MAX_DELAY
                }
            }
            RecoveryStrategy::RetryWithBackoff => self.base_delay.saturating_mul(attempt),
            RecoveryStrategy::WaitAndRetry => self.base_delay.saturating_mul(QUOTA_WAIT_FACTOR),
            // The caller widens its own timeout; the wait itself stays flat.
            RecoveryStrategy::RetryWithTimeoutIncrease => self.base_delay,
            _ => self.base_delay,
        };

        delay.min(MAX_DELAY)
    }

    /// Whether attempt number `attempt` may be followed by another one.
    pub fn is_retryable(kind: ErrorKind, attempt: u32, max_retries: u32) -> bool {
        kind.is_retryable() && attempt < max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
