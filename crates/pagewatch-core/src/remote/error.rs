//! Remote mirror errors

use thiserror::Error;

/// Errors returned by a remote mirror
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Request never produced a response (DNS, TLS, timeout, ...)
    #[error("Remote mirror unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Credential missing, invalid or expired
    #[error("Authentication with the remote mirror failed ({status}). Check GITHUB_TOKEN.")]
    Unauthorized { status: u16 },

    /// Branch or file moved since we read it
    #[error("Remote mirror changed underneath us: {details}")]
    Conflict { details: String },

    /// Unexpected HTTP status
    #[error("Remote mirror returned {status} for {operation}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    /// Response could not be understood
    #[error("Malformed response from remote mirror for {operation}: {details}")]
    Malformed { operation: String, details: String },

    /// Mirror settings incomplete
    #[error("Remote mirror is not configured: {0}")]
    NotConfigured(String),
}

impl RemoteError {
    pub fn conflict(details: impl Into<String>) -> Self {
        RemoteError::Conflict {
            details: details.into(),
        }
    }

    pub fn malformed(operation: impl Into<String>, details: impl ToString) -> Self {
        RemoteError::Malformed {
            operation: operation.into(),
            details: details.to_string(),
        }
    }

    /// Whether retrying against a fresh head may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict { .. })
    }
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;
