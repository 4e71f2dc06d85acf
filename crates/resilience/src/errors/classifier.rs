//! Best-effort classification of untagged provider failures.
//!
//! Rules are evaluated in table order and the first match wins. A rule
//! matches when the HTTP status falls into one of its ranges or the
//! lower-cased message contains one of its needles.

use super::{ErrorKind, RawError};

/// One row of the classification table.
#[derive(Clone, Copy, Debug)]
pub struct ClassificationRule {
    pub kind: ErrorKind,
    /// Inclusive HTTP status ranges.
    pub statuses: &'static [(u16, u16)],
    /// Lower-case substrings looked up in the message.
    pub needles: &'static [&'static str],
}

impl ClassificationRule {
    fn matches(&self, status: Option<u16>, message: &str) -> bool {
        let status_hit = status.is_some_and(|code| {
            self.statuses
                .iter()
                .any(|(low, high)| (*low..=*high).contains(&code))
        });

        status_hit || self.needles.iter().any(|needle| message.contains(needle))
    }
}

/// Default rule table.
pub const DEFAULT_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        kind: ErrorKind::RateLimited,
        statuses: &[(429, 429)],
        needles: &["rate limit", "too many requests", "429"],
    },
    ClassificationRule {
        kind: ErrorKind::InvalidApiKey,
        statuses: &[(401, 401), (403, 403)],
        needles: &["unauthorized", "forbidden", "invalid api key", "401", "403"],
    },
    ClassificationRule {
        kind: ErrorKind::TimeoutError,
        statuses: &[(408, 408)],
        needles: &["timeout", "timed out", "etimedout", "aborted"],
    },
    ClassificationRule {
        kind: ErrorKind::NetworkError,
        statuses: &[],
        needles: &[
            "econnrefused",
            "connection refused",
            "econnreset",
            "enotfound",
            "getaddrinfo",
            "dns",
        ],
    },
    ClassificationRule {
        kind: ErrorKind::DataNotFound,
        statuses: &[(404, 404)],
        needles: &["404", "not found"],
    },
    ClassificationRule {
        kind: ErrorKind::ParseError,
        statuses: &[],
        needles: &["parse", "json", "xml", "unexpected token"],
    },
    ClassificationRule {
        kind: ErrorKind::QuotaExceeded,
        statuses: &[],
        needles: &["quota", "limit exceeded"],
    },
    ClassificationRule {
        kind: ErrorKind::ApiUnavailable,
        statuses: &[(500, 599)],
        needles: &[
            "internal server error",
            "bad gateway",
            "service unavailable",
            "gateway timeout",
            "500",
            "502",
            "503",
        ],
    },
];

/// Maps raw failures onto [`ErrorKind`]s.
///
/// Classification never fails: when nothing matches the result is
/// [`ErrorKind::ApiUnavailable`].
#[derive(Clone, Copy, Debug)]
pub struct ErrorClassifier {
    rules: &'static [ClassificationRule],
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES,
        }
    }

    pub fn with_rules(rules: &'static [ClassificationRule]) -> Self {
        Self { rules }
    }

    pub fn classify(&self, error: &RawError) -> ErrorKind {
        if let Some(kind) = error.kind {
            return kind;
        }

        let message = error.message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(error.status, &message))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::ApiUnavailable)
    }

    pub fn rules(&self) -> &'static [ClassificationRule] {
        self.rules
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify with the default table.
pub fn classify(error: &RawError) -> ErrorKind {
    ErrorClassifier::new().classify(error)
}
