//! Entry point composing breakers, retries and fallbacks around one call.
//!
//! For every call the orchestrator:
//! 1. Asks the provider's circuit breaker for admission
//! 2. Runs the operation up to `max_retries` times, classifying each failure
//!    and sleeping according to the failure's recovery strategy
//! 3. Records one breaker outcome for the whole call
//! 4. Hands exhausted calls to the fallback chain

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::time::Instant;

use super::{Admission, CircuitBreakerRegistry, ErrorStats, RetryPolicy};
use crate::config::{ResilienceConfig, RetryConfig, RetryConfigUpdate};
use crate::errors::{ClassifiedError, ErrorClassifier, ErrorKind, RawError, ResilienceError};
use crate::fallback::{FallbackChainResolver, FallbackPriority};
use crate::health::{
    error_rates, overall_status, AdminResult, ConfigUpdateResult, ErrorStatsReport, HealthReport,
};
use crate::models::{CallOptions, ServiceResponse};

/// Providers registered by [`ResilienceOrchestrator::default`].
pub const DEFAULT_PROVIDERS: &[&str] = &["disease.sh", "cdc", "who", "fda", "fhir", "blockchain"];

/// Releases a HalfOpen trial admission if the call is dropped before it
/// settles the breaker. Inert for calls admitted while Closed, which never
/// own the trial flag.
struct TrialGuard<'a> {
    breakers: &'a CircuitBreakerRegistry,
    provider: &'a str,
    armed: bool,
}

impl<'a> TrialGuard<'a> {
    fn new(breakers: &'a CircuitBreakerRegistry, provider: &'a str, admission: Admission) -> Self {
        Self {
            breakers,
            provider,
            armed: admission == Admission::Trial,
        }
    }

    fn settle(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.breakers.release_trial(self.provider);
        }
    }
}

/// Call protection for outbound provider requests.
///
/// Shared between concurrent callers, typically behind an `Arc`.
pub struct ResilienceOrchestrator {
    breakers: CircuitBreakerRegistry,
    fallback: FallbackChainResolver,
    classifier: ErrorClassifier,
    stats: ErrorStats,
    config: RwLock<RetryConfig>,
}

impl ResilienceOrchestrator {
    /// Create an orchestrator for a fixed provider set with default settings.
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(providers, ResilienceConfig::default())
    }

    /// Create an orchestrator with custom configuration.
    ///
    /// Retry settings that a runtime update would reject are replaced with
    /// their defaults.
    pub fn with_config<I, S>(providers: I, config: ResilienceConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            breakers: CircuitBreakerRegistry::with_config(providers, config.breaker),
            fallback: FallbackChainResolver::default(),
            classifier: ErrorClassifier::new(),
            stats: ErrorStats::new(),
            config: RwLock::new(config.retry.sanitized()),
        }
    }

    pub fn with_fallback_priority(mut self, priorities: FallbackPriority) -> Self {
        self.fallback = FallbackChainResolver::new(priorities);
        self
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn read_config(&self) -> RwLockReadGuard<'_, RetryConfig> {
        self.config.read().unwrap_or_else(|poisoned| {
            warn!("Retry config lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, RetryConfig> {
        self.config.write().unwrap_or_else(|poisoned| {
            warn!("Retry config lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `operation` against `provider` under breaker, retry and fallback
    /// protection.
    ///
    /// Callers observe either a result (possibly served by a fallback
    /// source) or a single terminal error; per-attempt failures only show
    /// up in logs and stats.
    pub async fn handle_service_call<F, Fut>(
        &self,
        provider: &str,
        mut operation: F,
        options: &CallOptions,
    ) -> Result<ServiceResponse, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Value, RawError>>,
    {
        let started = Instant::now();

        let admission = self.breakers.admit(provider, started)?;
        if !admission.is_admitted() {
            self.stats.record(ErrorKind::ApiUnavailable, provider);
            warn!("Circuit open for '{}', call rejected", provider);
            return Err(ResilienceError::CircuitOpen {
                provider: provider.to_string(),
            });
        }
        let mut trial = TrialGuard::new(&self.breakers, provider, admission);

        // Snapshot so a concurrent update cannot change the rules mid-call.
        let config = self.read_config().clone();
        let policy = RetryPolicy::from_config(&config);
        // A deadline too far out to represent is no deadline at all.
        let deadline = options.deadline.and_then(|d| started.checked_add(d));

        let mut last_failure: Option<ClassifiedError> = None;

        for attempt in 1..=config.max_retries {
            let outcome = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, operation())
                    .await
                    .unwrap_or_else(|_| {
                        Err(RawError::tagged(
                            ErrorKind::TimeoutError,
                            "call deadline exceeded",
                        ))
                    }),
                None => operation().await,
            };

            let raw = match outcome {
                Ok(data) => {
                    self.breakers.record_success(provider)?;
                    trial.settle();
                    if attempt > 1 {
                        info!("'{}' succeeded on attempt {}", provider, attempt);
                    }
                    return Ok(ServiceResponse::primary(provider, data));
                }
                Err(raw) => raw,
            };

            let kind = self.classifier.classify(&raw);
            self.stats.record(kind, provider);
            let message = (!raw.message.is_empty()).then_some(raw.message.as_str());
            let failure = ClassifiedError::new(kind, message).for_provider(provider);

            warn!(
                "'{}' attempt {}/{} failed: {}",
                provider, attempt, config.max_retries, failure
            );

            last_failure = Some(failure);

            if !RetryPolicy::is_retryable(kind, attempt, config.max_retries) {
                break;
            }

            let delay = policy.next_delay(kind.strategy(), attempt);
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    info!(
                        "Not retrying '{}': next attempt would pass the call deadline",
                        provider
                    );
                    break;
                }
            }

            debug!(
                "Retrying '{}' in {:?} ({})",
                provider,
                delay,
                kind.strategy()
            );
            tokio::time::sleep(delay).await;
        }

        self.breakers.record_failure(provider, Instant::now())?;
        trial.settle();

        let failure = last_failure.unwrap_or_else(|| {
            ClassifiedError::new(ErrorKind::ApiUnavailable, None).for_provider(provider)
        });

        self.fallback
            .resolve(provider, &failure, options, &config)
            .await
    }

    /// Build a classified error, defaulting to the kind's message.
    pub fn create_error(&self, kind: ErrorKind, message: Option<&str>) -> ClassifiedError {
        ClassifiedError::new(kind, message)
    }

    pub fn get_error_stats(&self) -> ErrorStatsReport {
        let circuit_breaker_states: BTreeMap<String, _> = self
            .breakers
            .snapshots()
            .into_iter()
            .map(|s| (s.provider, s.state))
            .collect();

        ErrorStatsReport {
            error_counts: self.stats.entries(),
            circuit_breaker_states,
            total_errors: self.stats.total(),
        }
    }

    /// Clear every error counter. Breaker state is untouched.
    pub fn reset_error_stats(&self) {
        info!("Error statistics reset");
        self.stats.reset();
    }

    /// Force a provider's circuit back to Closed.
    pub fn reset_circuit_breaker(&self, provider: &str) -> AdminResult {
        match self.breakers.reset(provider) {
            Ok(()) => AdminResult {
                success: true,
                message: format!("Circuit breaker reset for {}", provider),
            },
            Err(e) => AdminResult {
                success: false,
                message: e.to_string(),
            },
        }
    }

    /// Apply a partial retry configuration update.
    ///
    /// Invalid updates are rejected as a whole and leave the configuration
    /// unchanged.
    pub fn update_config(&self, update: &RetryConfigUpdate) -> ConfigUpdateResult {
        let mut config = self.write_config();
        match config.apply(update) {
            Ok(()) => {
                info!("Retry configuration updated: {:?}", *config);
                ConfigUpdateResult {
                    success: true,
                    config: config.clone(),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Rejected retry configuration update: {}", e);
                ConfigUpdateResult {
                    success: false,
                    config: config.clone(),
                    error: Some(e),
                }
            }
        }
    }

    pub fn health_check(&self) -> HealthReport {
        let snapshots = self.breakers.snapshots();
        let status = overall_status(&snapshots);

        HealthReport {
            status,
            circuit_breakers: snapshots
                .into_iter()
                .map(|s| (s.provider.clone(), s))
                .collect(),
            error_rates: error_rates(&self.stats),
            configuration: self.config(),
        }
    }

    pub fn config(&self) -> RetryConfig {
        self.read_config().clone()
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn stats(&self) -> &ErrorStats {
        &self.stats
    }
}

impl Default for ResilienceOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDERS.iter().copied())
    }
}
