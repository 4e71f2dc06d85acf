//! Health Data Resilience Crate
//!
//! This crate protects outbound calls to public-health data providers
//! (disease.sh, CDC, WHO, FDA, FHIR servers and similar).
//!
//! # Overview
//!
//! The resilience layer supports:
//! - Classification of provider failures into a fixed error taxonomy
//! - Per-provider circuit breaking
//! - Strategy-driven retries with exponential, linear or flat delays
//! - Ordered fallback chains per data subject, ending in cache and placeholder
//! - Error statistics, health reports and runtime configuration updates
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |      Caller      |  (provider client code)
//! +------------------+
//!          |
//!          v
//! +------------------------+     +------------------------+
//! | ResilienceOrchestrator | --> | CircuitBreakerRegistry |  (admission)
//! +------------------------+     +------------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |    operation     | --> | ErrorClassifier  |  (per failed attempt)
//! +------------------+     +------------------+
//!          |                        |
//!          |                        v
//!          |               +------------------+
//!          |               |   RetryPolicy    |  (delay per strategy)
//!          |               +------------------+
//!          v
//! +-----------------------+
//! | FallbackChainResolver |  (alternate providers, cache, placeholder)
//! +-----------------------+
//!          |
//!          v
//! +------------------+
//! | ServiceResponse  |  (data + provenance)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`ResilienceOrchestrator`] - Entry point wrapping a provider call
//! - [`ErrorKind`] - Failure taxonomy with recovery strategies
//! - [`CallOptions`] - Subject, cache key, collaborators and deadline of a call
//! - [`ServiceResponse`] - Result annotated with where it came from
//! - [`DataSource`] - Contract implemented by fallback collaborators

pub mod config;
pub mod errors;
pub mod fallback;
pub mod health;
pub mod models;
pub mod registry;
pub mod source;

pub use config::{BreakerConfig, ResilienceConfig, RetryConfig, RetryConfigUpdate};

pub use errors::{
    classify, ClassifiedError, ErrorClassifier, ErrorKind, RawError, RecoveryStrategy,
    ResilienceError,
};

pub use fallback::{
    FallbackChainResolver, FallbackPriority, FallbackTrail, SkipReason, StepOutcome, TrailStep,
};

pub use health::{
    AdminResult, ConfigUpdateResult, ErrorStatsReport, HealthReport, HealthStatus,
};

pub use models::{
    CachedEntry, CallOptions, DataQuality, ProviderId, Provenance, ServiceResponse, SourceId,
    SourceRequest,
};

pub use registry::{
    Admission, CircuitBreakerRegistry, CircuitSnapshot, CircuitState, ErrorStats,
    ResilienceOrchestrator, RetryPolicy, DEFAULT_PROVIDERS,
};

pub use source::{Collaborators, DataSource};
