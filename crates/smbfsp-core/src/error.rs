//! Error types for the provider protocol

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope and option decoding errors
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid options for {function}: {reason}")]
    InvalidOptions { function: String, reason: String },

    #[error("path rejected: {0}")]
    PathTraversal(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Deserialization(e.to_string())
    }
}

/// Wire error kinds, sent back in the `error` field of a result.
///
/// The mapping from remote error codes is deliberately coarse: it is the
/// contract with the caller, not a full taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AccessDenied,
    NotFound,
    TooManyOpened,
    /// Transient network condition; the caller is expected to retry
    ShouldRetry,
    Failed,
    /// Handle or session lookups that do not resolve
    InvalidOperation,
}

impl ErrorKind {
    /// Map an OS-style error number from the remote client
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            libc::EPERM | libc::EACCES => ErrorKind::AccessDenied,
            libc::ENOENT => ErrorKind::NotFound,
            libc::EMFILE | libc::ENFILE => ErrorKind::TooManyOpened,
            libc::ECONNABORTED | libc::ECONNRESET | libc::ETIMEDOUT => ErrorKind::ShouldRetry,
            _ => ErrorKind::Failed,
        }
    }

    /// Wire spelling of this kind
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::AccessDenied => "ACCESS_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::TooManyOpened => "TOO_MANY_OPENED",
            ErrorKind::ShouldRetry => "SHOULD_RETRY",
            ErrorKind::Failed => "FAILED",
            ErrorKind::InvalidOperation => "INVALID_OPERATION",
        }
    }

    pub fn is_retryable(self) -> bool {
        self == ErrorKind::ShouldRetry
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ProtocolError> for ErrorKind {
    fn from(e: &ProtocolError) -> Self {
        match e {
            ProtocolError::PathTraversal(_) => ErrorKind::AccessDenied,
            _ => ErrorKind::Failed,
        }
    }
}
