//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] suitable for testing, development and single-process
//! deployments.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Atomic counters**: `increment` reads, adds and writes under one write lock
//! - **TTL support**: Expired keys read as absent immediately; a background task
//!   reclaims their memory
//!
//! # Example
//!
//! ```
//! use warden_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - The sweeper runs every second, so memory is reclaimed lazily even though
//!   reads observe expiry precisely

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::{select, sync::watch, time::sleep};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
};

/// Interval between background sweeps of expired keys.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the cleanup task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // Sending is a best-effort signal; the receiver may already be gone.
        let _ = self.shutdown_tx.send(());
    }
}

/// A stored value and its optional expiry deadline.
#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-memory expiring key-value cache.
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data.
///
/// # Shutdown
///
/// The background sweeper stops automatically when all clones of the
/// `MemoryBackend` are dropped (via the internal `ShutdownGuard`).
/// You can also call [`shutdown`](Self::shutdown) to stop it explicitly.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<Vec<u8>, Entry>>>,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").field("keys", &self.data.read().len()).finish()
    }
}

impl MemoryBackend {
    /// Creates a new in-memory backend.
    ///
    /// Spawns the background sweeper on the current Tokio runtime, so this
    /// must be called from within a runtime context.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let backend = Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task holds only a weak handle so it never keeps the data alive.
        let data = Arc::downgrade(&backend.data);
        tokio::spawn(async move {
            Self::sweep_expired_keys(data, shutdown_rx).await;
        });

        backend
    }

    /// Background task removing keys whose TTL has elapsed.
    async fn sweep_expired_keys(
        data: std::sync::Weak<RwLock<HashMap<Vec<u8>, Entry>>>,
        mut shutdown_rx: watch::Receiver<()>,
    ) {
        loop {
            select! {
                _ = sleep(SWEEP_INTERVAL) => {}
                _ = shutdown_rx.changed() => {
                    return;
                }
            }

            let Some(data) = data.upgrade() else {
                return;
            };

            let now = Instant::now();
            let removed = {
                let mut guard = data.write();
                let before = guard.len();
                guard.retain(|_, entry| !entry.is_expired(now));
                before - guard.len()
            };

            if removed > 0 {
                tracing::trace!(removed, "swept expired keys");
            }
        }
    }

    /// Explicitly signals the background sweeper to stop.
    ///
    /// Expiry is still honored on reads after shutdown; only memory
    /// reclamation stops.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Number of physically stored keys, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no keys are physically stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_counter(value: &[u8]) -> StorageResult<i64> {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| StorageError::serialization("value is not an integer"))
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip_all)]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let now = Instant::now();
        let data = self.data.read();
        Ok(data.get(key).filter(|entry| !entry.is_expired(now)).map(|entry| entry.value.clone()))
    }

    #[tracing::instrument(skip_all)]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        data.insert(key, Entry { value: Bytes::from(value), expires_at: None });
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(ttl_ms = ttl.as_millis() as u64))]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| StorageError::internal("TTL overflows the clock"))?;

        let mut data = self.data.write();
        data.insert(key, Entry { value: Bytes::from(value), expires_at: Some(expires_at) });
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        data.remove(key);
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn increment(&self, key: &[u8]) -> StorageResult<i64> {
        let now = Instant::now();
        let mut data = self.data.write();

        let (current, expires_at) = match data.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                (parse_counter(&entry.value)?, entry.expires_at)
            },
            _ => (0, None),
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| StorageError::serialization("increment would overflow"))?;

        data.insert(
            key.to_vec(),
            Entry { value: Bytes::from(next.to_string().into_bytes()), expires_at },
        );
        Ok(next)
    }

    #[tracing::instrument(skip_all, fields(ttl_ms = ttl.as_millis() as u64))]
    async fn increment_with_ttl(&self, key: &[u8], ttl: Duration) -> StorageResult<i64> {
        let now = Instant::now();
        let deadline =
            now.checked_add(ttl).ok_or_else(|| StorageError::internal("TTL overflows the clock"))?;
        let mut data = self.data.write();

        let (current, expires_at) = match data.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                (parse_counter(&entry.value)?, entry.expires_at.or(Some(deadline)))
            },
            _ => (0, Some(deadline)),
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| StorageError::serialization("increment would overflow"))?;

        data.insert(
            key.to_vec(),
            Entry { value: Bytes::from(next.to_string().into_bytes()), expires_at },
        );
        Ok(next)
    }

    #[tracing::instrument(skip_all, fields(ttl_ms = ttl.as_millis() as u64))]
    async fn expire(&self, key: &[u8], ttl: Duration) -> StorageResult<bool> {
        let now = Instant::now();
        let deadline =
            now.checked_add(ttl).ok_or_else(|| StorageError::internal("TTL overflows the clock"))?;

        let mut data = self.data.write();
        match data.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(deadline);
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn time_to_live(&self, key: &[u8]) -> StorageResult<Option<Duration>> {
        let now = Instant::now();
        let data = self.data.read();
        Ok(data
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now)))
    }

    #[tracing::instrument(skip_all)]
    async fn health_check(&self) -> StorageResult<()> {
        // Acquiring the read lock proves we are not deadlocked.
        let _unused = self.data.read();
        Ok(())
    }
}
