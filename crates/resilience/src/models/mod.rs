//! Resilience layer models
//!
//! This module contains the data types shared by the registry and the
//! fallback resolver:
//! - `types` - Provider and fallback source identifiers (ProviderId, SourceId)
//! - `request` - Per-call options and the request handed to collaborators
//! - `response` - Annotated results (ServiceResponse, Provenance, CachedEntry)

mod request;
mod response;
mod types;

pub use request::{CallOptions, SourceRequest};
pub use response::{CachedEntry, DataQuality, Provenance, ServiceResponse};
pub use types::{ProviderId, SourceId};
