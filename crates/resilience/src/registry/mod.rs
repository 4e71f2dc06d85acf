//! Provider call protection.
//!
//! This module provides the runtime half of the resilience layer:
//! - Circuit breaking per provider
//! - Retry delays per recovery strategy
//! - Error occurrence counters
//! - The orchestrator composing these with the fallback chain

mod circuit_breaker;
mod orchestrator;
mod retry_policy;
mod stats;

pub use circuit_breaker::{Admission, CircuitBreakerRegistry, CircuitSnapshot, CircuitState};
pub use orchestrator::{ResilienceOrchestrator, DEFAULT_PROVIDERS};
pub use retry_policy::RetryPolicy;
pub use stats::ErrorStats;
