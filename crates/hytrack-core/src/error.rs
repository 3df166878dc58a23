//! Error types for hytrack
//!
//! This module defines all error types used throughout the crate.
//!
//! [`FetchFailure`] is kept separate from [`Error`]: courier adapters return
//! it directly, and the reconciler recovers from it locally instead of
//! propagating it.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for hytrack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hytrack
#[derive(Error, Debug)]
pub enum Error {
    /// Courier fetch failed (recoverable, retried next cycle)
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchFailure),

    /// Shipment store errors
    #[error("Shipment store error: {0}")]
    Store(String),

    /// Notifier errors
    #[error("Notifier error: {0}")]
    Notify(String),

    /// Waybill discovery errors
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input (e.g. malformed waybill)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a shipment store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a notifier error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Why a courier fetch produced no usable status
///
/// Every variant means the same thing to the reconciler: skip the record for
/// this cycle, change nothing, try again next cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("network error: {0}")]
    Network(String),

    /// The courier answered with a non-success status code
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The fetch did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The response did not contain a recognizable tracking status
    #[error("unrecognized response: {0}")]
    Unrecognized(String),

    /// The headless browser session failed
    #[error("browser error: {0}")]
    Browser(String),
}

impl FetchFailure {
    /// Create a network failure
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an unrecognized-response failure
    pub fn unrecognized(msg: impl Into<String>) -> Self {
        Self::Unrecognized(msg.into())
    }

    /// Create a browser failure
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_converts_into_error() {
        let err: Error = FetchFailure::HttpStatus(503).into();
        assert!(matches!(err, Error::Fetch(FetchFailure::HttpStatus(503))));
        assert_eq!(err.to_string(), "Fetch failed: unexpected HTTP status 503");
    }
}
