//! Storage error types and result alias.
//!
//! Every collaborator store (the expiring cache, the revocation ledger and the
//! user directory) maps its internal failures to [`StorageError`] so the session
//! core can classify them without knowing which backend produced them.
//!
//! Absence is not an error: lookups return `Ok(None)`. Errors mean the store
//! could not give an answer, and [`StorageError::is_transient`] separates the
//! ones worth retrying (unreachable, too slow) from the ones that will fail
//! the same way again.
//!
//! ```
//! use warden_storage::{StorageError, StorageResult};
//!
//! fn read_counter(raw: &[u8]) -> StorageResult<i64> {
//!     std::str::from_utf8(raw)
//!         .ok()
//!         .and_then(|s| s.parse().ok())
//!         .ok_or_else(|| StorageError::serialization("counter is not an integer"))
//! }
//!
//! assert_eq!(read_counter(b"3").ok(), Some(3));
//! assert!(!read_counter(b"x").unwrap_err().is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// Shared underlying cause of a [`StorageError`].
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of a cache, ledger or directory call.
///
/// The optional `source` keeps the backend's own error for logging.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// A write collided with an existing record, e.g. a duplicate identity
    /// in the directory.
    #[error("Conflict")]
    Conflict,

    /// Connection or network error.
    ///
    /// The store could not be reached: connection refused, reset, DNS
    /// failure and so on.
    #[error("Connection error: {message}")]
    Connection {
        /// What could not be reached.
        message: String,
        /// Backend cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Serialization or deserialization error.
    ///
    /// A stored value could not be decoded, e.g. a throttle counter that does
    /// not hold an integer.
    #[error("Serialization error: {message}")]
    Serialization {
        /// What could not be decoded.
        message: String,
    },

    /// The backend failed in a way that is not the caller's concern.
    #[error("Internal error: {message}")]
    Internal {
        /// Backend description of the failure.
        message: String,
    },

    /// Operation timed out.
    ///
    /// The store did not answer before the caller's deadline.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// A `Conflict`.
    #[must_use]
    pub fn conflict() -> Self {
        Self::Conflict
    }

    /// A `Connection` failure without a backend cause.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// A `Connection` failure wrapping the backend's error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// A stored value that could not be decoded.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// An `Internal` backend failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// The caller's deadline passed.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` for failures that may succeed on retry.
    ///
    /// Connection failures and timeouts are transient; everything else
    /// reflects the state of the data and will fail the same way again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}
