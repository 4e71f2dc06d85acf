//! Error types and failure classification for the resilience layer.
//!
//! This module provides:
//! - [`ErrorKind`]: The fixed taxonomy of provider failures
//! - [`RawError`]: A failure as reported by a collaborator
//! - [`ErrorClassifier`]: Ordered rule table mapping raw failures to kinds
//! - [`ClassifiedError`]: A kind together with its context
//! - [`ResilienceError`]: The terminal errors callers can observe

mod classifier;
mod kind;
mod raw;

pub use classifier::{classify, ClassificationRule, ErrorClassifier, DEFAULT_RULES};
pub use kind::{ErrorKind, RecoveryStrategy};
pub use raw::RawError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fallback::FallbackTrail;

/// A failure mapped onto the error taxonomy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub strategy: RecoveryStrategy,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ClassifiedError {
    /// Build an error of `kind`, using the kind's human message when no
    /// message is given.
    pub fn new(kind: ErrorKind, message: Option<&str>) -> Self {
        Self {
            kind,
            code: kind.code().to_string(),
            message: message.unwrap_or(kind.human_message()).to_string(),
            strategy: kind.strategy(),
            retryable: kind.is_retryable(),
            provider: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "[{}] {}: {}", self.code, provider, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Errors returned to callers of the resilience layer.
///
/// Intermediate attempt failures never surface here; a caller sees either a
/// result or exactly one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    /// The provider's circuit is open. The operation was not invoked.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// Retries and every fallback source were exhausted.
    #[error("Data unavailable for '{subject}' from {provider} ({kind}): {message}")]
    DataUnavailable {
        /// The provider that was originally called
        provider: String,
        /// Classification of the original failure
        kind: ErrorKind,
        /// The subject key that selected the fallback chain
        subject: String,
        /// Message of the original failure
        message: String,
        /// What each source of the fallback chain did
        trail: FallbackTrail,
    },

    /// The provider was not registered when the registry was built.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl ResilienceError {
    /// The error kind a caller should treat this error as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CircuitOpen { .. } | Self::UnknownProvider(_) => ErrorKind::ApiUnavailable,
            Self::DataUnavailable { kind, .. } => *kind,
        }
    }

    /// Terminal errors are never retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Structured form suitable for display or logging.
    pub fn to_classified(&self) -> ClassifiedError {
        let message = self.to_string();
        let classified = ClassifiedError::new(self.kind(), Some(&message));
        let classified = ClassifiedError {
            retryable: false,
            ..classified
        };
        match self {
            Self::CircuitOpen { provider } | Self::DataUnavailable { provider, .. } => {
                classified.for_provider(provider.clone())
            }
            Self::UnknownProvider(_) => classified,
        }
    }
}
