//! Error occurrence counters.
//!
//! Counts are keyed by `(ErrorKind, provider)` and only ever grow, until the
//! process restarts or [`ErrorStats::reset`] is called.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use log::warn;

use crate::errors::ErrorKind;

/// Thread-safe error counters shared by all callers.
#[derive(Debug, Default)]
pub struct ErrorStats {
    counts: Mutex<HashMap<(ErrorKind, String), u64>>,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_counts(&self) -> MutexGuard<'_, HashMap<(ErrorKind, String), u64>> {
        self.counts.lock().unwrap_or_else(|poisoned| {
            warn!("Error stats mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn record(&self, kind: ErrorKind, provider: &str) {
        let mut counts = self.lock_counts();
        *counts.entry((kind, provider.to_string())).or_insert(0) += 1;
    }

    pub fn count(&self, kind: ErrorKind, provider: &str) -> u64 {
        self.lock_counts()
            .get(&(kind, provider.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.lock_counts().values().sum()
    }

    /// Counts summed over providers.
    pub fn by_kind(&self) -> BTreeMap<ErrorKind, u64> {
        let mut by_kind = BTreeMap::new();
        for ((kind, _), count) in self.lock_counts().iter() {
            *by_kind.entry(*kind).or_insert(0) += count;
        }
        by_kind
    }

    /// Counts keyed as `"KIND:provider"`.
    pub fn entries(&self) -> BTreeMap<String, u64> {
        self.lock_counts()
            .iter()
            .map(|((kind, provider), count)| (format!("{}:{}", kind.code(), provider), *count))
            .collect()
    }

    pub fn reset(&self) {
        self.lock_counts().clear();
    }
}
