use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::source::Collaborators;

/// Subject used when a call does not name one.
pub const DEFAULT_SUBJECT: &str = "default";

/// Per-call options for
/// [`ResilienceOrchestrator::handle_service_call`](crate::registry::ResilienceOrchestrator::handle_service_call).
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Logical entity requested (e.g. a disease identifier). Selects the
    /// fallback chain.
    pub subject_key: Option<String>,

    /// Key used for cache lookups. Defaults to the subject key.
    pub cache_key: Option<String>,

    /// Query parameters forwarded to fallback collaborators.
    pub params: Value,

    /// Alternate sources available to the fallback chain.
    pub collaborators: Collaborators,

    /// Payload returned for the placeholder tier instead of the generic one.
    pub placeholder: Option<Value>,

    /// Optional end-to-end bound on the retry loop. `None` leaves the loop
    /// unbounded; each attempt is then responsible for its own timeout.
    pub deadline: Option<Duration>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject_key: impl Into<String>) -> Self {
        self.subject_key = Some(subject_key.into());
        self
    }

    pub fn cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn placeholder(mut self, payload: Value) -> Self {
        self.placeholder = Some(payload);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn subject_or_default(&self) -> &str {
        self.subject_key.as_deref().unwrap_or(DEFAULT_SUBJECT)
    }

    /// Build the request handed to fallback collaborators.
    pub fn source_request(&self) -> SourceRequest {
        let subject_key = self.subject_or_default().to_string();
        SourceRequest {
            cache_key: self.cache_key.clone().unwrap_or_else(|| subject_key.clone()),
            subject_key,
            params: self.params.clone(),
        }
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("subject_key", &self.subject_key)
            .field("cache_key", &self.cache_key)
            .field("params", &self.params)
            .field("collaborators", &self.collaborators.ids())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// The request a fallback collaborator is asked to satisfy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRequest {
    pub subject_key: String,
    pub cache_key: String,
    pub params: Value,
}
