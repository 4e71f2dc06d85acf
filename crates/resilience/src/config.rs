//! Retry, fallback and circuit breaker configuration.
//!
//! Defaults apply when nothing is configured. [`ResilienceConfig::from_env`]
//! overlays environment variables (a `.env` file is honored), and the retry
//! settings can be changed at runtime through
//! [`ResilienceOrchestrator::update_config`](crate::registry::ResilienceOrchestrator::update_config).

use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

/// Default number of attempts per call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default number of failed calls before a circuit opens.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time a circuit stays open.
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(60);

pub const ENV_ENABLE_FALLBACKS: &str = "ENABLE_DATA_FALLBACKS";
pub const ENV_FALLBACK_TO_CACHED: &str = "FALLBACK_TO_CACHED_DATA";
pub const ENV_FALLBACK_TO_PLACEHOLDER: &str = "FALLBACK_TO_PLACEHOLDER_DATA";
pub const ENV_MAX_RETRIES: &str = "RESILIENCE_MAX_RETRIES";
pub const ENV_BASE_DELAY_MS: &str = "RESILIENCE_BASE_DELAY_MS";
pub const ENV_BACKOFF_MULTIPLIER: &str = "RESILIENCE_BACKOFF_MULTIPLIER";
pub const ENV_FAILURE_THRESHOLD: &str = "RESILIENCE_FAILURE_THRESHOLD";
pub const ENV_OPEN_DURATION_SECS: &str = "RESILIENCE_OPEN_DURATION_SECS";

/// Process-wide retry and fallback settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Attempts per call, including the first one.
    pub max_retries: u32,
    /// Base delay between attempts, in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor for exponential backoff.
    pub backoff_multiplier: f64,
    /// Walk the fallback chain after retries are exhausted.
    pub enable_fallbacks: bool,
    /// Allow the cache tier of the fallback chain.
    pub fallback_to_cached: bool,
    /// Allow the placeholder tier of the fallback chain.
    pub fallback_to_placeholder: bool,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Apply a partial update, rejecting values that would disable retries
    /// or shrink backoff.
    pub fn apply(&mut self, update: &RetryConfigUpdate) -> Result<(), String> {
        let mut next = self.clone();

        if let Some(max_retries) = update.max_retries {
            next.max_retries = max_retries;
        }
        if let Some(base_delay_ms) = update.base_delay_ms {
            next.base_delay_ms = base_delay_ms;
        }
        if let Some(multiplier) = update.backoff_multiplier {
            next.backoff_multiplier = multiplier;
        }
        if let Some(enabled) = update.enable_fallbacks {
            next.enable_fallbacks = enabled;
        }
        if let Some(enabled) = update.fallback_to_cached {
            next.fallback_to_cached = enabled;
        }
        if let Some(enabled) = update.fallback_to_placeholder {
            next.fallback_to_placeholder = enabled;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("maxRetries must be at least 1".to_string());
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoffMultiplier must be a finite number >= 1, got {}",
                self.backoff_multiplier
            ));
        }
        Ok(())
    }

    /// Replace the fields [`validate`](Self::validate) would reject with
    /// their defaults.
    pub fn sanitized(mut self) -> Self {
        if self.max_retries == 0 {
            warn!(
                "maxRetries of 0 would never call the provider, using {}",
                DEFAULT_MAX_RETRIES
            );
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            warn!(
                "Invalid backoffMultiplier {}, using {}",
                self.backoff_multiplier, DEFAULT_BACKOFF_MULTIPLIER
            );
            self.backoff_multiplier = DEFAULT_BACKOFF_MULTIPLIER;
        }
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            enable_fallbacks: true,
            fallback_to_cached: true,
            fallback_to_placeholder: true,
        }
    }
}

/// Partial retry configuration for runtime updates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfigUpdate {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub enable_fallbacks: Option<bool>,
    pub fallback_to_cached: Option<bool>,
    pub fallback_to_placeholder: Option<bool>,
}

/// Circuit breaker configuration, shared by every provider.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakerConfig {
    /// Failed calls in a row before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls.
    pub open_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            open_duration: DEFAULT_OPEN_DURATION,
        }
    }
}

/// Complete resilience configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

impl ResilienceConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let retry = RetryConfig {
            max_retries: parse_var::<_, u32>(&lookup, ENV_MAX_RETRIES)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.retry.max_retries),
            base_delay_ms: parse_var::<_, u64>(&lookup, ENV_BASE_DELAY_MS)
                .unwrap_or(defaults.retry.base_delay_ms),
            backoff_multiplier: parse_var::<_, f64>(&lookup, ENV_BACKOFF_MULTIPLIER)
                .filter(|m| m.is_finite() && *m >= 1.0)
                .unwrap_or(defaults.retry.backoff_multiplier),
            enable_fallbacks: flag_var(&lookup, ENV_ENABLE_FALLBACKS)
                .unwrap_or(defaults.retry.enable_fallbacks),
            fallback_to_cached: flag_var(&lookup, ENV_FALLBACK_TO_CACHED)
                .unwrap_or(defaults.retry.fallback_to_cached),
            fallback_to_placeholder: flag_var(&lookup, ENV_FALLBACK_TO_PLACEHOLDER)
                .unwrap_or(defaults.retry.fallback_to_placeholder),
        };

        let breaker = BreakerConfig {
            failure_threshold: parse_var::<_, u32>(&lookup, ENV_FAILURE_THRESHOLD)
                .filter(|n| *n > 0)
                .unwrap_or(defaults.breaker.failure_threshold),
            open_duration: parse_var::<_, u64>(&lookup, ENV_OPEN_DURATION_SECS)
                .map(Duration::from_secs)
                .unwrap_or(defaults.breaker.open_duration),
        };

        Self { retry, breaker }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: '{}'", name, raw);
            None
        }
    }
}

fn flag_var<F>(lookup: &F, name: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring invalid flag for {}: '{}'", name, raw);
            None
        }
    }
}
