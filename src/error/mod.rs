//! Client error types with error classification for retry logic.
//!
//! Every failure the engine can encounter maps onto one variant of
//! [`ClientError`]. The [`ErrorClassification`] trait lets callers decide
//! generically whether an error is worth retrying instead of matching
//! variants at every call site.

use std::time::Duration;
use thiserror::Error;

use crate::orders::OrderError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the trade-stream engine.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ClientError {
    /// Transport-level connection error (refused, reset, DNS, TLS)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation exceeded its deadline
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Server rejected the presented credential
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Established stream failed mid-flight
    #[error("Stream error: {0}")]
    Stream(String),

    /// REST request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Failed to parse a response or frame
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Order-level error surfaced through the service API
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// The engine is shutting down
    #[error("Shutting down")]
    Shutdown,
}

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient errors that may resolve on retry (network issues, timeouts)
    Transient,
    /// Permanent errors that won't resolve on retry (bad data, rejected ops)
    Permanent,
    /// Configuration errors (missing settings, stale credentials)
    Configuration,
    /// Internal errors (bugs, unexpected state)
    Internal,
}

/// Trait for errors that can classify themselves for retry logic.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed on retry
    fn is_transient(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transient)
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }
}

impl ErrorClassification for ClientError {
    fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Connection(_) => ErrorCategory::Transient,
            ClientError::Timeout(_) => ErrorCategory::Transient,
            ClientError::Stream(_) => ErrorCategory::Transient,
            ClientError::Request(_) => ErrorCategory::Transient,
            // A rejected credential needs a fresh token, not a blind retry.
            ClientError::Authentication(_) => ErrorCategory::Configuration,
            ClientError::Parse(_) => ErrorCategory::Permanent,
            ClientError::Configuration(_) => ErrorCategory::Configuration,
            ClientError::Order(_) => ErrorCategory::Permanent,
            ClientError::Shutdown => ErrorCategory::Internal,
        }
    }
}
