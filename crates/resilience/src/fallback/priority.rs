use std::collections::HashMap;

use crate::models::SourceId;

/// Built-in chains for common subjects.
const DEFAULT_CHAINS: &[(&str, &[&str])] = &[
    ("hiv", &["disease.sh", "cdc", "who", "cache", "placeholder"]),
    ("covid-19", &["disease.sh", "who", "cdc", "cache", "placeholder"]),
    ("influenza", &["cdc", "who", "cache", "placeholder"]),
    ("tuberculosis", &["who", "cdc", "cache", "placeholder"]),
    ("malaria", &["who", "cache", "placeholder"]),
    ("measles", &["cdc", "who", "cache", "placeholder"]),
    ("drug-safety", &["fda", "cache", "placeholder"]),
    ("patient-records", &["fhir", "cache"]),
];

/// Subject key to ordered fallback sources.
#[derive(Clone, Debug)]
pub struct FallbackPriority {
    chains: HashMap<String, Vec<SourceId>>,
    default_chain: Vec<SourceId>,
}

impl FallbackPriority {
    /// Table with the built-in chains.
    pub fn new() -> Self {
        let mut priority = Self::empty();
        for (subject, chain) in DEFAULT_CHAINS {
            priority.set(*subject, chain.iter().map(|s| SourceId::from(*s)).collect());
        }
        priority
    }

    /// Table with no subject-specific chains.
    pub fn empty() -> Self {
        Self {
            chains: HashMap::new(),
            default_chain: vec![SourceId::Cache, SourceId::Placeholder],
        }
    }

    pub fn with_chain(mut self, subject: &str, chain: Vec<SourceId>) -> Self {
        self.set(subject, chain);
        self
    }

    /// Add or replace the chain for `subject`. Subjects are case-insensitive.
    pub fn set(&mut self, subject: &str, chain: Vec<SourceId>) {
        self.chains.insert(subject.to_lowercase(), chain);
    }

    /// Chain for `subject`, or the default `[cache, placeholder]`.
    pub fn chain_for(&self, subject: &str) -> &[SourceId] {
        self.chains
            .get(&subject.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(self.default_chain.as_slice())
    }

    pub fn subjects(&self) -> Vec<&str> {
        let mut subjects: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        subjects.sort_unstable();
        subjects
    }
}

impl Default for FallbackPriority {
    fn default() -> Self {
        Self::new()
    }
}
