//! Per-provider circuit breakers for fault tolerance.
//!
//! Implements the circuit breaker pattern to stop calling a provider that
//! has recently failed repeatedly. Each circuit has three states:
//!
//! - **Closed**: Normal operation, calls are allowed through.
//! - **Open**: Provider is failing, calls are rejected until `reopen_at`.
//! - **HalfOpen**: One trial call is admitted to test recovery.
//!
//! Circuits are created once for a fixed provider set and live in memory;
//! they reset when the process restarts. Every circuit has its own lock so
//! independent providers never contend with each other.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::errors::ResilienceError;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - calls are allowed.
    Closed,
    /// Testing recovery - a single trial call is allowed.
    HalfOpen,
    /// Provider is failing - calls are rejected.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
            Self::Open => write!(f, "OPEN"),
        }
    }
}

/// How a call was let through (or not) by its circuit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Admission {
    /// The circuit is Closed.
    Normal,
    /// The single HalfOpen trial. Must be settled by a recorded outcome or
    /// [`CircuitBreakerRegistry::release_trial`].
    Trial,
    /// The circuit is Open, or a trial is already in flight.
    Rejected,
}

impl Admission {
    pub fn is_admitted(self) -> bool {
        self != Self::Rejected
    }
}

/// Internal circuit state for a single provider.
#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    /// Failed calls since the last success.
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// Set whenever the circuit is Open.
    reopen_at: Option<Instant>,
    /// A HalfOpen trial call has been admitted and not yet settled.
    trial_in_flight: bool,
    /// Number of state transitions since creation.
    transitions: u64,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            reopen_at: None,
            trial_in_flight: false,
            transitions: 0,
        }
    }

    fn transition(&mut self, provider: &str, to: CircuitState) {
        info!(
            "Circuit breaker: '{}' transitioning from {} to {}",
            provider, self.state, to
        );
        self.state = to;
        self.transitions += 1;
    }

    fn open(&mut self, provider: &str, now: Instant, open_duration: Duration) {
        self.transition(provider, CircuitState::Open);
        self.reopen_at = Some(now + open_duration);
        self.trial_in_flight = false;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.reopen_at = None;
        self.trial_in_flight = false;
    }
}

/// Point-in-time view of one provider's circuit.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub provider: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
    /// Milliseconds until an open circuit admits a trial call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopens_in_ms: Option<u64>,
    pub trial_in_flight: bool,
    pub transitions: u64,
    #[serde(skip)]
    pub last_failure_at: Option<Instant>,
    #[serde(skip)]
    pub reopen_at: Option<Instant>,
}

/// Registry owning one circuit per provider.
///
/// The provider set is fixed at construction; asking about any other name
/// fails with [`ResilienceError::UnknownProvider`].
pub struct CircuitBreakerRegistry {
    circuits: HashMap<String, Mutex<Circuit>>,
    config: BreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create a registry with default settings.
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(providers, BreakerConfig::default())
    }

    /// Create a registry with custom configuration.
    pub fn with_config<I, S>(providers: I, config: BreakerConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let circuits = providers
            .into_iter()
            .map(|provider| (provider.into(), Mutex::new(Circuit::new())))
            .collect();

        Self { circuits, config }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Lock a provider's circuit, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is a slightly stale circuit
    /// state, which is better than panicking.
    fn lock(&self, provider: &str) -> Result<MutexGuard<'_, Circuit>, ResilienceError> {
        let circuit = self
            .circuits
            .get(provider)
            .ok_or_else(|| ResilienceError::UnknownProvider(provider.to_string()))?;

        Ok(circuit.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Circuit breaker mutex for '{}' was poisoned, recovering",
                provider
            );
            poisoned.into_inner()
        }))
    }

    /// Check if a call to `provider` may proceed at `now`.
    ///
    /// Shorthand for [`admit`](Self::admit) when the kind of admission does
    /// not matter.
    pub fn can_attempt(&self, provider: &str, now: Instant) -> Result<bool, ResilienceError> {
        Ok(self.admit(provider, now)?.is_admitted())
    }

    /// Admit or reject a call to `provider` at `now`.
    ///
    /// Handles the Open -> HalfOpen transition once `now >= reopen_at`.
    /// While HalfOpen exactly one [`Admission::Trial`] is handed out; further
    /// callers are rejected until the trial is settled by
    /// [`record_success`](Self::record_success),
    /// [`record_failure`](Self::record_failure) or
    /// [`release_trial`](Self::release_trial).
    pub fn admit(&self, provider: &str, now: Instant) -> Result<Admission, ResilienceError> {
        let mut circuit = self.lock(provider)?;

        let admission = match circuit.state {
            CircuitState::Closed => Admission::Normal,
            CircuitState::HalfOpen if circuit.trial_in_flight => Admission::Rejected,
            CircuitState::HalfOpen => {
                circuit.trial_in_flight = true;
                Admission::Trial
            }
            CircuitState::Open => match circuit.reopen_at {
                Some(reopen_at) if now >= reopen_at => {
                    circuit.transition(provider, CircuitState::HalfOpen);
                    circuit.trial_in_flight = true;
                    Admission::Trial
                }
                _ => Admission::Rejected,
            },
        };

        if admission == Admission::Rejected {
            debug!("Circuit breaker: rejecting call to '{}' ({})", provider, circuit.state);
        }
        Ok(admission)
    }

    /// Record a successful call.
    ///
    /// In Closed state: resets the failure count.
    /// In HalfOpen state: closes the circuit.
    pub fn record_success(&self, provider: &str) -> Result<(), ResilienceError> {
        let mut circuit = self.lock(provider)?;

        match circuit.state {
            CircuitState::Closed => {
                if circuit.consecutive_failures > 0 {
                    debug!(
                        "Circuit breaker: success for '{}', failure count reset",
                        provider
                    );
                }
                circuit.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                circuit.transition(provider, CircuitState::Closed);
                circuit.close();
            }
            CircuitState::Open => {
                // A call admitted before a concurrent trial reopened the circuit.
                debug!(
                    "Circuit breaker: late success for '{}' while Open, ignored",
                    provider
                );
            }
        }
        Ok(())
    }

    /// Record a failed call at `now`.
    ///
    /// Opens the circuit once the failure threshold is reached. In HalfOpen
    /// state any failure reopens the circuit with a fresh `reopen_at`.
    pub fn record_failure(&self, provider: &str, now: Instant) -> Result<(), ResilienceError> {
        let mut circuit = self.lock(provider)?;

        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        circuit.last_failure_at = Some(now);

        match circuit.state {
            CircuitState::Closed => {
                if circuit.consecutive_failures >= self.config.failure_threshold {
                    circuit.open(provider, now, self.config.open_duration);
                } else {
                    debug!(
                        "Circuit breaker: failure for '{}' ({}/{})",
                        provider, circuit.consecutive_failures, self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                circuit.open(provider, now, self.config.open_duration);
            }
            CircuitState::Open => {
                debug!(
                    "Circuit breaker: additional failure for '{}' (already open)",
                    provider
                );
            }
        }
        Ok(())
    }

    /// Give up a HalfOpen trial admission without an outcome.
    ///
    /// Used when an admitted call is cancelled before it finishes.
    pub fn release_trial(&self, provider: &str) -> Result<(), ResilienceError> {
        let mut circuit = self.lock(provider)?;
        if circuit.state == CircuitState::HalfOpen && circuit.trial_in_flight {
            debug!("Circuit breaker: trial for '{}' released", provider);
            circuit.trial_in_flight = false;
        }
        Ok(())
    }

    /// Force the circuit for a provider back to Closed.
    pub fn reset(&self, provider: &str) -> Result<(), ResilienceError> {
        let mut circuit = self.lock(provider)?;

        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            provider
        );
        if circuit.state != CircuitState::Closed {
            circuit.transitions += 1;
        }
        circuit.close();
        circuit.last_failure_at = None;
        Ok(())
    }

    /// Current view of a provider's circuit.
    pub fn get(&self, provider: &str) -> Result<CircuitSnapshot, ResilienceError> {
        let circuit = self.lock(provider)?;
        Ok(self.snapshot(provider, &circuit, Instant::now()))
    }

    pub fn state(&self, provider: &str) -> Result<CircuitState, ResilienceError> {
        Ok(self.lock(provider)?.state)
    }

    /// Snapshots of every circuit, ordered by provider name.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<CircuitSnapshot> = self
            .providers()
            .into_iter()
            .filter_map(|provider| {
                self.lock(provider)
                    .ok()
                    .map(|circuit| self.snapshot(provider, &circuit, now))
            })
            .collect();
        snapshots.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshots
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self.circuits.keys().map(String::as_str).collect();
        providers.sort_unstable();
        providers
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.circuits.contains_key(provider)
    }

    fn snapshot(&self, provider: &str, circuit: &Circuit, now: Instant) -> CircuitSnapshot {
        let reopens_in_ms = match (circuit.state, circuit.reopen_at) {
            (CircuitState::Open, Some(reopen_at)) => {
                Some(reopen_at.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };

        CircuitSnapshot {
            provider: provider.to_string(),
            state: circuit.state,
            consecutive_failures: circuit.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            open_duration_ms: self.config.open_duration.as_millis() as u64,
            reopens_in_ms,
            trial_in_flight: circuit.trial_in_flight,
            transitions: circuit.transitions,
            last_failure_at: circuit.last_failure_at,
            reopen_at: circuit.reopen_at,
        }
    }
}
