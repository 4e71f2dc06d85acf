use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached result as exposed by a collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(data: Value, timestamp: DateTime<Utc>) -> Self {
        Self { data, timestamp }
    }
}

/// Quality marker for returned data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// Fresh data from a live provider.
    Live,
    /// Data served from a cache.
    Cached,
    /// Synthesized zero-valued data.
    Placeholder,
}

/// Where a [`ServiceResponse`] came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum Provenance {
    /// The requested provider answered.
    #[serde(rename_all = "camelCase")]
    Primary { provider: String },

    /// An alternate live provider answered.
    #[serde(rename_all = "camelCase")]
    Fallback {
        original_service: String,
        fallback_source: String,
        original_error: String,
    },

    /// A cached result was served.
    #[serde(rename_all = "camelCase")]
    Cache {
        original_service: String,
        cached_at: DateTime<Utc>,
        /// Age of the cached entry in seconds at the time it was served.
        cache_age: i64,
        original_error: String,
    },

    /// A placeholder was synthesized.
    #[serde(rename_all = "camelCase")]
    Placeholder {
        original_service: String,
        original_error: String,
    },
}

/// Result of a protected call, annotated with its provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub data: Value,
    pub provenance: Provenance,
}

impl ServiceResponse {
    pub fn primary(provider: impl Into<String>, data: Value) -> Self {
        Self {
            data,
            provenance: Provenance::Primary {
                provider: provider.into(),
            },
        }
    }

    /// True when the data did not come from the requested provider.
    pub fn is_fallback(&self) -> bool {
        !matches!(self.provenance, Provenance::Primary { .. })
    }

    pub fn data_quality(&self) -> DataQuality {
        match self.provenance {
            Provenance::Primary { .. } | Provenance::Fallback { .. } => DataQuality::Live,
            Provenance::Cache { .. } => DataQuality::Cached,
            Provenance::Placeholder { .. } => DataQuality::Placeholder,
        }
    }

    /// Name of the source that produced the data.
    pub fn source_name(&self) -> &str {
        match &self.provenance {
            Provenance::Primary { provider } => provider,
            Provenance::Fallback {
                fallback_source, ..
            } => fallback_source,
            Provenance::Cache { .. } => "cache",
            Provenance::Placeholder { .. } => "placeholder",
        }
    }
}
