//! Error types for store adapters and the fallback cache manager
//!
//! Adapters report a [`StoreError`] for transport or serialization problems.
//! "Not found" is never an error; it is `Ok(None)`.
//!
//! The manager absorbs every failure that the other tier can cover. Only a
//! dual-tier failure reaches the caller, as a [`CacheError`].

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a single store adapter
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection refused, dropped or otherwise unreachable backend
    #[error("connection failure: {0}")]
    Connection(String),

    /// Call exceeded the adapter's operation timeout
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Backend accepted the connection but the operation failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this failure suggests the backend is unreachable
    ///
    /// Drains stop early on connectivity failures instead of hammering a
    /// backend that is down.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Whether retrying the same record could ever succeed
    ///
    /// A record that fails to serialize will fail the same way next time.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Serialization(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Caller-visible failure of the fallback cache
///
/// Raised only when no tier could serve the request.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Secondary rejected the write and Primary did not accept it either
    #[error("write of '{key}' failed on every tier (secondary: {secondary})")]
    WriteFailed {
        key: String,
        secondary: StoreError,
        /// `None` when Primary was skipped because it is believed down
        primary: Option<StoreError>,
    },

    /// Primary did not answer and Secondary failed the read
    #[error("read of '{key}' failed on every tier (secondary: {secondary})")]
    ReadFailed { key: String, secondary: StoreError },
}
