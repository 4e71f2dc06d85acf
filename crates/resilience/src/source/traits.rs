use async_trait::async_trait;
use serde_json::Value;

use crate::errors::RawError;
use crate::models::{CachedEntry, SourceRequest};

/// Trait for data sources usable as fallback tiers.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use healthdata_resilience::source::DataSource;
///
/// struct WhoClient { http: reqwest::Client }
///
/// #[async_trait]
/// impl DataSource for WhoClient {
///     async fn query(&self, request: &SourceRequest) -> Result<Value, RawError> {
///         let url = format!("https://ghoapi.azureedge.net/api/{}", request.subject_key);
///         Ok(self.http.get(url).send().await?.error_for_status()?.json().await?)
///     }
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch data for the request from this source.
    async fn query(&self, request: &SourceRequest) -> Result<Value, RawError>;

    /// Most recent cached result for `cache_key`, if this source keeps one.
    fn cached(&self, cache_key: &str) -> Option<CachedEntry> {
        let _ = cache_key;
        None
    }
}
