//! Gateway error types.

use thiserror::Error;
use warden_abac::ParseError;

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("registry unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

/// Errors surfaced by [`Gateway`](crate::Gateway) operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The registry answered with a non-2xx status.
    #[error("registry {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The registry answered 2xx with a body that does not match the
    /// canonical shape.
    #[error("unexpected response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl SyncError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(TransportError::Unreachable { .. } | TransportError::Timeout { .. }) => {
                true
            }
            Self::Status { status, .. } => *status >= 500,
            Self::Transport(TransportError::InvalidRequest { .. })
            | Self::Parse { .. }
            | Self::Encode(_) => false,
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, SyncError>;
