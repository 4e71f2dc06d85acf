use thiserror::Error;

use super::ErrorKind;

/// A failure as reported by a data-source collaborator.
///
/// Collaborators that know what went wrong should attach a kind with
/// [`RawError::tagged`]; the classifier then trusts the tag. Untagged errors
/// are classified from their HTTP status and message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RawError {
    /// Free-form failure description.
    pub message: String,
    /// HTTP status of the failed response, when there was one.
    pub status: Option<u16>,
    /// Kind attached at the point the error was produced.
    pub kind: Option<ErrorKind>,
}

impl RawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            kind: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            kind: None,
        }
    }

    pub fn tagged(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            kind: Some(kind),
        }
    }
}

impl From<reqwest::Error> for RawError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let kind = if err.is_timeout() {
            Some(ErrorKind::TimeoutError)
        } else if err.is_connect() {
            Some(ErrorKind::NetworkError)
        } else if err.is_decode() {
            Some(ErrorKind::ParseError)
        } else {
            // Status-bearing errors go through the status rules.
            None
        };

        Self {
            message: err.to_string(),
            status,
            kind,
        }
    }
}

impl From<serde_json::Error> for RawError {
    fn from(err: serde_json::Error) -> Self {
        Self::tagged(ErrorKind::ParseError, err.to_string())
    }
}
