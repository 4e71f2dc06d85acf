use serde::{Deserialize, Serialize};

/// Recovery strategy attached to each [`ErrorKind`].
///
/// The strategy drives the delay computed by
/// [`RetryPolicy::next_delay`](crate::registry::RetryPolicy::next_delay).
/// Whether a retry happens at all is decided separately by
/// [`ErrorKind::is_retryable`].
///
/// | Strategy | Delay before attempt `n + 1` |
/// |----------|------------------------------|
/// | `ExponentialBackoff` | `base * multiplier^(n-1)` |
/// | `RetryWithBackoff` | `base * n` |
/// | `RetryWithTimeoutIncrease` | `base` |
/// | `WaitAndRetry` | `base * 5` |
/// | everything else | `base` |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    FallbackWithCache,
    ExponentialBackoff,
    DegradeToPublic,
    FallbackToAlternative,
    RetryWithBackoff,
    RetryWithTimeoutIncrease,
    LogAndFallback,
    WaitAndRetry,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FallbackWithCache => "fallback_with_cache",
            Self::ExponentialBackoff => "exponential_backoff",
            Self::DegradeToPublic => "degrade_to_public",
            Self::FallbackToAlternative => "fallback_to_alternative",
            Self::RetryWithBackoff => "retry_with_backoff",
            Self::RetryWithTimeoutIncrease => "retry_with_timeout_increase",
            Self::LogAndFallback => "log_and_fallback",
            Self::WaitAndRetry => "wait_and_retry",
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a provider failure.
///
/// Every failure observed by the orchestrator is mapped to exactly one kind.
/// The kind fixes a stable code, a human readable message, a recovery
/// strategy and whether the failure may be retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Provider is down or answered with a server error.
    ApiUnavailable,
    /// Provider throttled the request (HTTP 429).
    RateLimited,
    /// Credentials were rejected (HTTP 401/403). Never retried.
    InvalidApiKey,
    /// The requested record does not exist at this provider.
    DataNotFound,
    /// Connection refused, DNS failure and similar transport errors.
    NetworkError,
    /// The request exceeded its timeout or was aborted.
    TimeoutError,
    /// The response could not be decoded.
    ParseError,
    /// A usage quota was exhausted.
    QuotaExceeded,
}

impl ErrorKind {
    /// All kinds, in table order.
    pub const ALL: [ErrorKind; 8] = [
        Self::ApiUnavailable,
        Self::RateLimited,
        Self::InvalidApiKey,
        Self::DataNotFound,
        Self::NetworkError,
        Self::TimeoutError,
        Self::ParseError,
        Self::QuotaExceeded,
    ];

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ApiUnavailable => "API_UNAVAILABLE",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::DataNotFound => "DATA_NOT_FOUND",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
        }
    }

    pub fn human_message(&self) -> &'static str {
        match self {
            Self::ApiUnavailable => "External API is currently unavailable",
            Self::RateLimited => "API rate limit exceeded",
            Self::InvalidApiKey => "Invalid or missing API key",
            Self::DataNotFound => "Requested data not found",
            Self::NetworkError => "Network connectivity issue",
            Self::TimeoutError => "Request timed out",
            Self::ParseError => "Failed to parse API response",
            Self::QuotaExceeded => "API quota exceeded",
        }
    }

    pub fn strategy(&self) -> RecoveryStrategy {
        match self {
            Self::ApiUnavailable => RecoveryStrategy::FallbackWithCache,
            Self::RateLimited => RecoveryStrategy::ExponentialBackoff,
            Self::InvalidApiKey => RecoveryStrategy::DegradeToPublic,
            Self::DataNotFound => RecoveryStrategy::FallbackToAlternative,
            Self::NetworkError => RecoveryStrategy::RetryWithBackoff,
            Self::TimeoutError => RecoveryStrategy::RetryWithTimeoutIncrease,
            Self::ParseError => RecoveryStrategy::LogAndFallback,
            Self::QuotaExceeded => RecoveryStrategy::WaitAndRetry,
        }
    }

    /// Whether another attempt against the same provider may help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidApiKey)
    }

    /// Parse a stable code back into a kind.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
