//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the fast expiring
//! key-value cache the session core keeps its short-lived state in: the
//! per-identity login attempt counters and the "current active token" markers.
//!
//! # Design Philosophy
//!
//! The trait provides a minimal key-value interface in the spirit of a Redis
//! client:
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Async by default**: All operations are async for non-blocking I/O
//! - **Per-key expiry**: Keys can carry a TTL and disappear when it elapses
//! - **Single-step counters**: [`increment`](StorageBackend::increment) is atomic, so concurrent
//!   callers never lose a count
//!
//! The trait is object safe; the session core holds it as
//! `Arc<dyn StorageBackend>`.
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Abstract expiring key-value cache.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and every method
/// is a single round trip to the store.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair without expiry |
/// | [`set_with_ttl`](StorageBackend::set_with_ttl) | Store with automatic expiration |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`increment`](StorageBackend::increment) | Atomically add one to an integer value |
/// | [`increment_with_ttl`](StorageBackend::increment_with_ttl) | Add one, arming a TTL if the counter has none |
/// | [`expire`](StorageBackend::expire) | Arm or reset a key's TTL |
/// | [`time_to_live`](StorageBackend::time_to_live) | Remaining lifetime of a key |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use warden_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// let window = Duration::from_secs(60);
/// assert_eq!(backend.increment_with_ttl(b"attempts", window).await.unwrap(), 1);
/// assert_eq!(backend.increment_with_ttl(b"attempts", window).await.unwrap(), 2);
/// assert!(backend.time_to_live(b"attempts").await.unwrap().is_some());
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists and has not expired
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair.
    ///
    /// If the key already exists, its value is overwritten and any existing
    /// TTL is cleared.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Stores a key-value pair with automatic expiration.
    ///
    /// Overwrites any existing value and replaces its TTL. The key is treated
    /// as absent once `ttl` has elapsed.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Deletes a key.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Atomically increments the integer stored at `key` and returns the new
    /// value.
    ///
    /// A missing or expired key is treated as `0`, so the first call returns
    /// `1`. The key's TTL, if any, is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`](crate::StorageError::Serialization)
    /// if the stored value is not a decimal integer.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn increment(&self, key: &[u8]) -> StorageResult<i64>;

    /// Increments the counter at `key` and makes sure it expires.
    ///
    /// A counter created by this call, or found live without a TTL, gets
    /// `ttl`; a counter that already has a TTL keeps it. A fixed window
    /// therefore closes `ttl` after its first attempt, and a counter left
    /// without a deadline by an earlier failure is re-armed by the next call
    /// instead of living forever.
    ///
    /// The default implementation takes up to three round trips. Backends
    /// with a native "increment and arm" should override it with a single
    /// atomic step.
    ///
    /// # Errors
    ///
    /// Same as [`increment`](Self::increment) and [`expire`](Self::expire).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn increment_with_ttl(&self, key: &[u8], ttl: Duration) -> StorageResult<i64> {
        let count = self.increment(key).await?;
        if count == 1 || self.time_to_live(key).await?.is_none() {
            self.expire(key, ttl).await?;
        }
        Ok(count)
    }

    /// Arms (or resets) the TTL of an existing key.
    ///
    /// Returns `true` if the key existed and now expires after `ttl`, `false`
    /// if there was no such key.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn expire(&self, key: &[u8], ttl: Duration) -> StorageResult<bool>;

    /// Returns the remaining lifetime of a key.
    ///
    /// `Ok(None)` means the key is absent or has no expiry.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn time_to_live(&self, key: &[u8]) -> StorageResult<Option<Duration>>;

    /// Checks if the backend is healthy and accepting requests.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
