//! Integration tests for the resilience orchestrator.
//!
//! Time is paused in every async test, so retry delays and open durations
//! elapse instantly and can be asserted exactly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use healthdata_resilience::{
    BreakerConfig, CachedEntry, CallOptions, CircuitState, Collaborators, DataQuality, DataSource,
    ErrorKind, HealthStatus, Provenance, RawError, ResilienceConfig, ResilienceError,
    ResilienceOrchestrator, RetryConfig, RetryConfigUpdate, SourceRequest,
};
use serde_json::{json, Value};
use tokio::time::Instant;

// =============================================================================
// Helpers
// =============================================================================

const PROVIDERS: [&str; 6] = ["disease.sh", "cdc", "who", "fda", "fhir", "blockchain"];

/// Orchestrator with a single attempt per call, so breaker timing is exact.
fn single_attempt() -> ResilienceOrchestrator {
    ResilienceOrchestrator::with_config(
        PROVIDERS,
        ResilienceConfig {
            retry: RetryConfig {
                max_retries: 1,
                ..Default::default()
            },
            breaker: BreakerConfig::default(),
        },
    )
}

async fn fail_once(orch: &ResilienceOrchestrator, provider: &str) {
    let _ = orch
        .handle_service_call(
            provider,
            || async { Err::<Value, _>(RawError::with_status(503, "Service Unavailable")) },
            &CallOptions::new(),
        )
        .await;
}

struct Recorder {
    id: &'static str,
    fail: bool,
    cache: Option<CachedEntry>,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Recorder {
    fn live(id: &'static str, fail: bool, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
        Arc::new(Self {
            id,
            fail,
            cache: None,
            log: log.clone(),
        })
    }
}

#[async_trait]
impl DataSource for Recorder {
    async fn query(&self, _request: &SourceRequest) -> Result<Value, RawError> {
        self.log.lock().unwrap().push(self.id);
        if self.fail {
            Err(RawError::new("ECONNREFUSED"))
        } else {
            Ok(json!({ "source": self.id, "cases": 42 }))
        }
    }

    fn cached(&self, _cache_key: &str) -> Option<CachedEntry> {
        self.cache.clone()
    }
}

// =============================================================================
// Circuit breaking
// =============================================================================

#[tokio::test(start_paused = true)]
async fn five_failed_calls_open_the_circuit() {
    let orch = single_attempt();

    for _ in 0..5 {
        fail_once(&orch, "cdc").await;
    }
    assert_eq!(orch.breakers().state("cdc").unwrap(), CircuitState::Open);

    let invoked = AtomicU32::new(0);
    let result = orch
        .handle_service_call(
            "cdc",
            || async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            },
            &CallOptions::new(),
        )
        .await;

    assert_eq!(
        result.unwrap_err(),
        ResilienceError::CircuitOpen {
            provider: "cdc".to_string()
        }
    );
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    // Other providers are unaffected.
    assert_eq!(orch.breakers().state("who").unwrap(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn four_failures_then_success_keeps_circuit_closed() {
    let orch = single_attempt();

    for _ in 0..4 {
        fail_once(&orch, "fda").await;
    }
    orch.handle_service_call("fda", || async { Ok(json!({})) }, &CallOptions::new())
        .await
        .unwrap();
    fail_once(&orch, "fda").await;

    let snapshot = orch.breakers().get("fda").unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn open_circuit_admits_trial_only_after_open_duration() {
    let orch = single_attempt();
    for _ in 0..5 {
        fail_once(&orch, "who").await;
    }

    tokio::time::advance(Duration::from_secs(60) - Duration::from_millis(1)).await;
    let early = orch
        .handle_service_call("who", || async { Ok(json!({})) }, &CallOptions::new())
        .await;
    assert!(matches!(early, Err(ResilienceError::CircuitOpen { .. })));

    tokio::time::advance(Duration::from_millis(1)).await;
    let trial = orch
        .handle_service_call("who", || async { Ok(json!({ "ok": true })) }, &CallOptions::new())
        .await
        .unwrap();

    assert_eq!(trial.data, json!({ "ok": true }));
    assert_eq!(orch.breakers().state("who").unwrap(), CircuitState::Closed);
    assert_eq!(orch.breakers().get("who").unwrap().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_reopens_the_circuit() {
    let orch = single_attempt();
    for _ in 0..5 {
        fail_once(&orch, "fhir").await;
    }

    tokio::time::advance(Duration::from_secs(60)).await;
    fail_once(&orch, "fhir").await;

    let snapshot = orch.breakers().get("fhir").unwrap();
    assert_eq!(snapshot.state, CircuitState::Open);
    assert_eq!(snapshot.reopens_in_ms, Some(60_000));
}

#[tokio::test(start_paused = true)]
async fn half_open_admits_a_single_trial() {
    let orch = Arc::new(single_attempt());
    for _ in 0..5 {
        fail_once(&orch, "cdc").await;
    }
    tokio::time::advance(Duration::from_secs(60)).await;

    let trial = tokio::spawn({
        let orch = orch.clone();
        async move {
            orch.handle_service_call(
                "cdc",
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(json!({ "trial": true }))
                },
                &CallOptions::new(),
            )
            .await
        }
    });

    // Let the trial get admitted and park in its sleep.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(orch.breakers().state("cdc").unwrap(), CircuitState::HalfOpen);

    let concurrent = orch
        .handle_service_call("cdc", || async { Ok(json!({})) }, &CallOptions::new())
        .await;
    assert!(matches!(concurrent, Err(ResilienceError::CircuitOpen { .. })));

    let trial = trial.await.unwrap().unwrap();
    assert!(!trial.is_fallback());
    assert_eq!(orch.breakers().state("cdc").unwrap(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancelled_trial_releases_admission() {
    let orch = single_attempt();
    for _ in 0..5 {
        fail_once(&orch, "cdc").await;
    }
    tokio::time::advance(Duration::from_secs(60)).await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        orch.handle_service_call(
            "cdc",
            || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(json!({}))
            },
            &CallOptions::new(),
        ),
    )
    .await;
    assert!(abandoned.is_err());

    let snapshot = orch.breakers().get("cdc").unwrap();
    assert_eq!(snapshot.state, CircuitState::HalfOpen);
    assert!(!snapshot.trial_in_flight);

    orch.handle_service_call("cdc", || async { Ok(json!({})) }, &CallOptions::new())
        .await
        .unwrap();
    assert_eq!(orch.breakers().state("cdc").unwrap(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn cancelled_closed_call_leaves_trial_in_flight() {
    let orch = Arc::new(ResilienceOrchestrator::with_config(
        ["cdc"],
        ResilienceConfig {
            retry: RetryConfig {
                max_retries: 1,
                ..Default::default()
            },
            breaker: BreakerConfig {
                failure_threshold: 1,
                open_duration: Duration::from_secs(10),
            },
        },
    ));
    let slow = || async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<Value, RawError>(json!({}))
    };

    // Admitted while Closed, still running when the circuit opens.
    let closed_call = tokio::spawn({
        let orch = orch.clone();
        async move { orch.handle_service_call("cdc", slow, &CallOptions::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    fail_once(&orch, "cdc").await;
    assert_eq!(orch.breakers().state("cdc").unwrap(), CircuitState::Open);

    tokio::time::advance(Duration::from_secs(10)).await;
    let trial = tokio::spawn({
        let orch = orch.clone();
        async move { orch.handle_service_call("cdc", slow, &CallOptions::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(orch.breakers().get("cdc").unwrap().trial_in_flight);

    closed_call.abort();
    assert!(closed_call.await.unwrap_err().is_cancelled());

    let snapshot = orch.breakers().get("cdc").unwrap();
    assert_eq!(snapshot.state, CircuitState::HalfOpen);
    assert!(snapshot.trial_in_flight);

    let second = orch
        .handle_service_call("cdc", || async { Ok(json!({})) }, &CallOptions::new())
        .await;
    assert!(matches!(second, Err(ResilienceError::CircuitOpen { .. })));

    trial.await.unwrap().unwrap();
    assert_eq!(orch.breakers().state("cdc").unwrap(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn reset_circuit_breaker_closes_open_circuit() {
    let orch = single_attempt();
    for _ in 0..5 {
        fail_once(&orch, "cdc").await;
    }

    let result = orch.reset_circuit_breaker("cdc");
    assert!(result.success);
    assert_eq!(result.message, "Circuit breaker reset for cdc");

    let snapshot = orch.breakers().get("cdc").unwrap();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.consecutive_failures, 0);

    let invoked = AtomicU32::new(0);
    orch.handle_service_call(
        "cdc",
        || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        },
        &CallOptions::new(),
    )
    .await
    .unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Retries
// =============================================================================

#[tokio::test(start_paused = true)]
async fn rate_limited_call_is_attempted_three_times_with_exponential_delays() {
    let orch = ResilienceOrchestrator::default();
    let started = Instant::now();
    let attempts: Mutex<Vec<Duration>> = Mutex::new(Vec::new());

    let response = orch
        .handle_service_call(
            "disease.sh",
            || async {
                attempts.lock().unwrap().push(started.elapsed());
                Err::<Value, _>(RawError::with_status(429, "Too Many Requests"))
            },
            &CallOptions::new().subject("measles"),
        )
        .await
        .unwrap();

    let attempts = attempts.into_inner().unwrap();
    assert_eq!(
        attempts,
        vec![
            Duration::ZERO,
            Duration::from_millis(1000),
            Duration::from_millis(3000),
        ]
    );
    assert_eq!(orch.stats().count(ErrorKind::RateLimited, "disease.sh"), 3);
    assert_eq!(response.data_quality(), DataQuality::Placeholder);

    // One call, one breaker failure.
    assert_eq!(
        orch.breakers().get("disease.sh").unwrap().consecutive_failures,
        1
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_api_key_fails_fast() {
    let orch = ResilienceOrchestrator::default();
    let invoked = AtomicU32::new(0);

    orch.handle_service_call(
        "fda",
        || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Err::<Value, _>(RawError::with_status(403, "Forbidden"))
        },
        &CallOptions::new().subject("drug-safety"),
    )
    .await
    .unwrap();

    assert_eq!(invoked.load(Ordering::SeqCst), 1);
    assert_eq!(orch.stats().count(ErrorKind::InvalidApiKey, "fda"), 1);
}

#[tokio::test(start_paused = true)]
async fn updated_retry_count_applies_to_next_call() {
    let orch = ResilienceOrchestrator::default();
    let result = orch.update_config(&RetryConfigUpdate {
        max_retries: Some(2),
        base_delay_ms: Some(10),
        ..Default::default()
    });
    assert!(result.success);

    let invoked = AtomicU32::new(0);
    orch.handle_service_call(
        "who",
        || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Err::<Value, _>(RawError::new("socket timed out"))
        },
        &CallOptions::new(),
    )
    .await
    .unwrap();

    assert_eq!(invoked.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Fallbacks
// =============================================================================

#[tokio::test(start_paused = true)]
async fn hiv_chain_skips_failed_provider_and_walks_in_order() {
    let orch = single_attempt();
    let log = Arc::new(Mutex::new(Vec::new()));

    let collaborators = Collaborators::new()
        .with_source("disease.sh", Recorder::live("disease.sh", false, &log))
        .with_source("cdc", Recorder::live("cdc", true, &log))
        .with_source("who", Recorder::live("who", false, &log));

    let response = orch
        .handle_service_call(
            "disease.sh",
            || async { Err::<Value, _>(RawError::with_status(502, "Bad Gateway")) },
            &CallOptions::new()
                .subject("hiv")
                .collaborators(collaborators),
        )
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["cdc", "who"]);
    assert_eq!(
        response.provenance,
        Provenance::Fallback {
            original_service: "disease.sh".to_string(),
            fallback_source: "who".to_string(),
            original_error: "Bad Gateway".to_string(),
        }
    );
    assert_eq!(response.data["source"], "who");
}

#[tokio::test(start_paused = true)]
async fn cache_tier_serves_latest_entry() {
    let orch = single_attempt();
    let log = Arc::new(Mutex::new(Vec::new()));
    let cached_at = chrono::Utc::now() - chrono::Duration::minutes(10);

    let cache = Arc::new(Recorder {
        id: "cache-holder",
        fail: true,
        cache: Some(CachedEntry::new(json!({ "cases": 7 }), cached_at)),
        log: log.clone(),
    });

    let response = orch
        .handle_service_call(
            "cdc",
            || async { Err::<Value, _>(RawError::new("ENOTFOUND cdc.gov")) },
            &CallOptions::new()
                .subject("unknown-subject")
                .cache_key("cdc:unknown-subject")
                .collaborators(Collaborators::new().with_source("cache-holder", cache)),
        )
        .await
        .unwrap();

    assert_eq!(response.data, json!({ "cases": 7 }));
    assert_eq!(response.data_quality(), DataQuality::Cached);
    match response.provenance {
        Provenance::Cache {
            cached_at: at,
            cache_age,
            ..
        } => {
            assert_eq!(at, cached_at);
            assert!(cache_age >= 600);
        }
        other => panic!("expected cache provenance, got {:?}", other),
    }
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_chain_fails_with_data_unavailable() {
    let orch = single_attempt();
    orch.update_config(&RetryConfigUpdate {
        fallback_to_placeholder: Some(false),
        ..Default::default()
    });

    let result = orch
        .handle_service_call(
            "disease.sh",
            || async { Err::<Value, _>(RawError::with_status(404, "Not Found")) },
            &CallOptions::new().subject("hiv"),
        )
        .await;

    match result.unwrap_err() {
        ResilienceError::DataUnavailable {
            provider,
            kind,
            subject,
            trail,
            ..
        } => {
            assert_eq!(provider, "disease.sh");
            assert_eq!(kind, ErrorKind::DataNotFound);
            assert_eq!(subject, "hiv");
            assert_eq!(trail.queried().count(), 0);
            assert_eq!(
                trail.to_string(),
                "disease.sh skipped (failed provider), cdc skipped (not registered), \
                 who skipped (not registered), cache skipped (cache miss), \
                 placeholder skipped (disabled)"
            );
        }
        other => panic!("expected DataUnavailable, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn placeholder_marks_data_quality() {
    let orch = single_attempt();

    let response = orch
        .handle_service_call(
            "blockchain",
            || async { Err::<Value, _>(RawError::new("unexpected token < in JSON")) },
            &CallOptions::new()
                .subject("malaria")
                .placeholder(json!({ "cases": 0, "region": "global" })),
        )
        .await
        .unwrap();

    assert_eq!(response.data_quality(), DataQuality::Placeholder);
    assert_eq!(response.data["cases"], 0);
    assert_eq!(response.data["region"], "global");
    assert_eq!(response.data["dataQuality"], "placeholder");
    assert_eq!(orch.stats().count(ErrorKind::ParseError, "blockchain"), 1);
}

// =============================================================================
// Reporting
// =============================================================================

#[tokio::test(start_paused = true)]
async fn error_stats_totals_match_counts() {
    let orch = single_attempt();
    fail_once(&orch, "cdc").await;
    fail_once(&orch, "cdc").await;
    fail_once(&orch, "who").await;

    let report = orch.get_error_stats();
    assert_eq!(report.total_errors, 3);
    assert_eq!(report.error_counts.values().sum::<u64>(), report.total_errors);
    assert_eq!(report.error_counts["API_UNAVAILABLE:cdc"], 2);
    assert_eq!(report.circuit_breaker_states.len(), PROVIDERS.len());

    orch.reset_error_stats();
    assert_eq!(orch.get_error_stats().total_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn health_check_reports_degraded_when_circuit_open() {
    let orch = single_attempt();
    assert_eq!(orch.health_check().status, HealthStatus::Healthy);

    for _ in 0..5 {
        fail_once(&orch, "fda").await;
    }

    let report = orch.health_check();
    assert_eq!(report.status, HealthStatus::Degraded);
    assert_eq!(report.circuit_breakers["fda"].state, CircuitState::Open);
    assert_eq!(report.error_rates["API_UNAVAILABLE"], 0.05);
    assert_eq!(report.configuration.max_retries, 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["circuitBreakers"]["fda"]["state"], "OPEN");
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_share_one_orchestrator() {
    let orch = Arc::new(ResilienceOrchestrator::with_config(
        PROVIDERS,
        ResilienceConfig {
            retry: RetryConfig {
                max_retries: 1,
                ..Default::default()
            },
            breaker: BreakerConfig {
                failure_threshold: 100,
                ..Default::default()
            },
        },
    ));
    let mut handles = Vec::new();

    for i in 0..40 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let provider = PROVIDERS[i % PROVIDERS.len()];
            orch.handle_service_call(
                provider,
                move || async move {
                    if i % 2 == 0 {
                        Ok(json!({ "i": i }))
                    } else {
                        Err(RawError::with_status(500, "Internal Server Error"))
                    }
                },
                &CallOptions::new(),
            )
            .await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(orch.stats().total(), 20);
    assert_eq!(orch.get_error_stats().total_errors, 20);
}
