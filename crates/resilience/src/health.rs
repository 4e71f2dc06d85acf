//! Operator-facing reports produced by the orchestrator.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::RetryConfig;
use crate::errors::ErrorKind;
use crate::registry::{CircuitSnapshot, CircuitState, ErrorStats};

/// Smallest denominator used for error rates, so sparse traffic does not
/// produce alarming percentages.
pub const MIN_RATE_DENOMINATOR: u64 = 100;

/// Overall status derived from circuit states.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every circuit is closed.
    Healthy,
    /// At least one circuit is open or probing.
    Degraded,
}

/// Result of [`get_error_stats`](crate::registry::ResilienceOrchestrator::get_error_stats).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStatsReport {
    /// Occurrences keyed as `"KIND:provider"`.
    pub error_counts: BTreeMap<String, u64>,
    pub circuit_breaker_states: BTreeMap<String, CircuitState>,
    pub total_errors: u64,
}

/// Result of [`health_check`](crate::registry::ResilienceOrchestrator::health_check).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub circuit_breakers: BTreeMap<String, CircuitSnapshot>,
    /// Per-kind share of errors, keyed by error code.
    pub error_rates: BTreeMap<String, f64>,
    pub configuration: RetryConfig,
}

/// Outcome of an admin action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AdminResult {
    pub success: bool,
    pub message: String,
}

/// Outcome of a configuration update.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigUpdateResult {
    pub success: bool,
    /// Configuration in effect after the update.
    pub config: RetryConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-kind error rates over `max(total, MIN_RATE_DENOMINATOR)`.
pub fn error_rates(stats: &ErrorStats) -> BTreeMap<String, f64> {
    let by_kind = stats.by_kind();
    let total: u64 = by_kind.values().sum();
    let denominator = total.max(MIN_RATE_DENOMINATOR) as f64;

    ErrorKind::ALL
        .iter()
        .map(|kind| {
            let count = by_kind.get(kind).copied().unwrap_or(0);
            (kind.code().to_string(), count as f64 / denominator)
        })
        .collect()
}

pub fn overall_status(snapshots: &[CircuitSnapshot]) -> HealthStatus {
    if snapshots.iter().all(|s| s.state == CircuitState::Closed) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}
