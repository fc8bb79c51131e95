//! Error hierarchy for the watch bridge
//!
//! Failures are grouped by the component that detects them. Only
//! configuration and validation failures ever reach a caller as hard errors;
//! store and delivery failures are contained by the retry loop and the
//! connection registry respectively.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (io, serialization, task join)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Settings could not be loaded or failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote resource store failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Operator input rejected before touching the store
    #[error("Invalid request: {0}")]
    Validation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Client or credentials are not ready yet
    #[error("Resource store unavailable: {0}")]
    Unavailable(String),

    /// The API server reported an error while a watch was open
    #[error("Watch failed with status {status}: {reason}")]
    Subscription { status: u16, reason: String },

    /// A get/list/replace request was answered with a non-success status
    #[error("API request failed with status {status}: {reason}")]
    Api { status: u16, reason: String },

    /// Request could not be sent or the stream broke mid-read
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with something we could not decode
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

/// Failure to reach a single observer; handled inside the registry and
/// never surfaced as [`Error`].
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Connection already closed")]
    Closed,

    #[error("Send failed: {0}")]
    Send(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("Failed to bind {address}: {reason}")]
    Bind { address: String, reason: String },
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(SystemError::Io(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl StoreError {
    /// Short label used for logging and the reconnect counter.
    pub fn cause(&self) -> &'static str {
        match self {
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Subscription { .. } => "subscription",
            StoreError::Api { .. } => "api",
            StoreError::Transport(_) => "transport",
            StoreError::Protocol(_) => "protocol",
            StoreError::NotFound(_) => "not_found",
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Protocol(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}
