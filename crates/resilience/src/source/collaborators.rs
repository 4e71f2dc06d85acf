use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{CachedEntry, ProviderId};

use super::DataSource;

/// The set of alternate sources available to one call.
///
/// Sources are looked up by provider id when the fallback chain reaches a
/// live entry; every registered source is consulted for cache lookups.
#[derive(Clone, Default)]
pub struct Collaborators {
    sources: HashMap<ProviderId, Arc<dyn DataSource>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, id: impl Into<ProviderId>, source: Arc<dyn DataSource>) -> Self {
        self.sources.insert(id.into(), source);
        self
    }

    pub fn insert(&mut self, id: impl Into<ProviderId>, source: Arc<dyn DataSource>) {
        self.sources.insert(id.into(), source);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn DataSource>> {
        self.sources.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sources.keys().map(|id| id.as_ref()).collect();
        ids.sort_unstable();
        ids
    }

    /// Most recent cache hit for `cache_key` across all sources.
    ///
    /// Returns the id of the source that held it alongside the entry.
    pub fn latest_cached(&self, cache_key: &str) -> Option<(&str, CachedEntry)> {
        self.sources
            .iter()
            .filter_map(|(id, source)| source.cached(cache_key).map(|entry| (id.as_ref(), entry)))
            .max_by_key(|(_, entry)| entry.timestamp)
    }
}
