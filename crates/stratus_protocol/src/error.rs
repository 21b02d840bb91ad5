//! Broker error taxonomy.

use thiserror::Error;

/// Errors surfaced by broker operations.
///
/// Each variant maps to the HTTP status the broker adapter reports to its
/// caller (see [`BrokerError::http_status`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Missing or invalid derived configuration (client fault)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Remote resource absent when its presence was required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote resource present when its absence was required
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Non-2xx response not otherwise classified
    #[error("Provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    /// Caller broke the request contract (unknown last operation, bad payload)
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Token acquisition failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The transport itself failed (connect, timeout, decode)
    #[error("Transport error: {0}")]
    Transport(String),
}

impl BrokerError {
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        BrokerError::Provider {
            status,
            message: message.into(),
        }
    }

    /// HTTP status the broker adapter should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            BrokerError::Validation(_) => 400,
            BrokerError::NotFound(_) => 404,
            BrokerError::Conflict(_) => 409,
            BrokerError::Provider { .. } => 502,
            BrokerError::Contract(_) => 422,
            BrokerError::Auth(_) => 401,
            BrokerError::Transport(_) => 503,
        }
    }

    /// Remote status code, when the error came from a provider response.
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            BrokerError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether re-issuing the same operation may succeed.
    ///
    /// Validation and contract errors never become in-progress states.
    pub fn is_retryable(&self) -> bool {
        match self {
            BrokerError::Transport(_) => true,
            BrokerError::Provider { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Failure to parse an opaque result payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

impl From<PayloadError> for BrokerError {
    fn from(err: PayloadError) -> Self {
        BrokerError::Contract(err.to_string())
    }
}
