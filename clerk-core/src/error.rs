//! Error types for clerk operations

use crate::Lane;
use thiserror::Error;

/// Errors raised by the underlying key-value store.
///
/// These are produced by [`KeyValueStore`](crate::KeyValueStore)
/// implementations and travel unchanged through the coalescing layer to
/// every caller that shared the failed request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Request for key {key} failed: {reason}")]
    RequestFailed { key: String, reason: String },

    #[error("Store rejected request for key {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },

    #[error("No async runtime available: {reason}")]
    RuntimeUnavailable { reason: String },
}

/// Master error type for all clerk errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClerkError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The runtime dropped an admitted operation before it settled.
    #[error("Operation on the {lane} lane was dropped before it settled")]
    Interrupted { lane: Lane },
}

impl ClerkError {
    /// Get the store error, if this failure came from the store.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            ClerkError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for clerk operations.
pub type ClerkResult<T> = Result<T, ClerkError>;

// =============================================================================
// TESTS
// =============================================================================
