//! Shared test utilities for exercising failure paths.
//!
//! This module provides wrappers around the in-memory stores that inject
//! connection failures or latency on selected operations. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! warden-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use warden_storage::testutil::{CacheOp, FlakyBackend};
//! ```

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    StorageBackend,
    auth::{MemoryRevokedTokenStore, RevokedToken, RevokedTokenStore},
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
};

/// Cache operations that [`FlakyBackend`] can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheOp {
    /// [`StorageBackend::get`]
    Get,
    /// [`StorageBackend::set`]
    Set,
    /// [`StorageBackend::set_with_ttl`]
    SetWithTtl,
    /// [`StorageBackend::delete`]
    Delete,
    /// [`StorageBackend::increment`]
    Increment,
    /// [`StorageBackend::expire`]
    Expire,
    /// [`StorageBackend::time_to_live`]
    TimeToLive,
}

/// Shared failure and latency switches.
#[derive(Debug)]
struct Faults<Op> {
    failing: RwLock<HashSet<Op>>,
    delay: RwLock<Option<Duration>>,
}

impl<Op> Default for Faults<Op> {
    fn default() -> Self {
        Self { failing: RwLock::new(HashSet::new()), delay: RwLock::new(None) }
    }
}

impl<Op: Copy + Eq + std::hash::Hash + std::fmt::Debug> Faults<Op> {
    async fn before(&self, op: Op) -> StorageResult<()> {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().contains(&op) {
            return Err(StorageError::connection(format!("injected failure: {op:?}")));
        }
        Ok(())
    }
}

/// A [`MemoryBackend`] wrapper that fails or stalls selected operations.
///
/// Clones share both the data and the fault switches, so a test can keep a
/// handle to flip failures on while the code under test holds another.
///
/// `increment_with_ttl` keeps the trait's step-by-step default, so each of
/// its `increment`, `time_to_live` and `expire` calls can fail on its own.
#[derive(Clone, Debug)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    faults: Arc<Faults<CacheOp>>,
}

impl FlakyBackend {
    /// Wraps a fresh [`MemoryBackend`].
    #[must_use]
    pub fn new() -> Self {
        Self::wrap(MemoryBackend::new())
    }

    /// Wraps an existing backend.
    #[must_use]
    pub fn wrap(inner: MemoryBackend) -> Self {
        Self { inner, faults: Arc::new(Faults::default()) }
    }

    /// Makes `op` fail with a connection error until healed.
    pub fn fail(&self, op: CacheOp) {
        self.faults.failing.write().insert(op);
    }

    /// Stops failing `op`.
    pub fn heal(&self, op: CacheOp) {
        self.faults.failing.write().remove(&op);
    }

    /// Delays every operation by `delay` (or removes the delay with `None`).
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.faults.delay.write() = delay;
    }

    /// The wrapped backend, bypassing fault injection.
    #[must_use]
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }
}

impl Default for FlakyBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        self.faults.before(CacheOp::Get).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.faults.before(CacheOp::Set).await?;
        self.inner.set(key, value).await
    }

    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        self.faults.before(CacheOp::SetWithTtl).await?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.faults.before(CacheOp::Delete).await?;
        self.inner.delete(key).await
    }

    async fn increment(&self, key: &[u8]) -> StorageResult<i64> {
        self.faults.before(CacheOp::Increment).await?;
        self.inner.increment(key).await
    }

    async fn expire(&self, key: &[u8], ttl: Duration) -> StorageResult<bool> {
        self.faults.before(CacheOp::Expire).await?;
        self.inner.expire(key, ttl).await
    }

    async fn time_to_live(&self, key: &[u8]) -> StorageResult<Option<Duration>> {
        self.faults.before(CacheOp::TimeToLive).await?;
        self.inner.time_to_live(key).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

/// Ledger operations that [`FlakyRevokedTokenStore`] can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    /// [`RevokedTokenStore::insert`]
    Insert,
    /// [`RevokedTokenStore::get`] and [`RevokedTokenStore::contains`]
    Lookup,
    /// [`RevokedTokenStore::purge_expired`]
    Purge,
}

/// A [`MemoryRevokedTokenStore`] wrapper that fails or stalls selected
/// operations, and counts lookups that reach the store.
#[derive(Clone, Debug, Default)]
pub struct FlakyRevokedTokenStore {
    inner: MemoryRevokedTokenStore,
    faults: Arc<Faults<LedgerOp>>,
    lookups: Arc<std::sync::atomic::AtomicU64>,
}

impl FlakyRevokedTokenStore {
    /// Wraps a fresh [`MemoryRevokedTokenStore`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `op` fail with a connection error until healed.
    pub fn fail(&self, op: LedgerOp) {
        self.faults.failing.write().insert(op);
    }

    /// Stops failing `op`.
    pub fn heal(&self, op: LedgerOp) {
        self.faults.failing.write().remove(&op);
    }

    /// Delays every operation by `delay` (or removes the delay with `None`).
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.faults.delay.write() = delay;
    }

    /// Number of `get`/`contains` calls that reached the wrapped store.
    #[must_use]
    pub fn lookups(&self) -> u64 {
        self.lookups.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// The wrapped store, bypassing fault injection.
    #[must_use]
    pub fn inner(&self) -> &MemoryRevokedTokenStore {
        &self.inner
    }
}

#[async_trait]
impl RevokedTokenStore for FlakyRevokedTokenStore {
    async fn insert(&self, entry: &RevokedToken) -> StorageResult<()> {
        self.faults.before(LedgerOp::Insert).await?;
        self.inner.insert(entry).await
    }

    async fn get(&self, token: &str) -> StorageResult<Option<RevokedToken>> {
        self.faults.before(LedgerOp::Lookup).await?;
        self.lookups.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.inner.get(token).await
    }

    async fn contains(&self, token: &str) -> StorageResult<bool> {
        self.faults.before(LedgerOp::Lookup).await?;
        self.lookups.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.inner.contains(token).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        self.faults.before(LedgerOp::Purge).await?;
        self.inner.purge_expired(now).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_backend_fails_selected_op_only() {
        let backend = FlakyBackend::new();
        backend.fail(CacheOp::Set);

        let result = backend.set(b"k".to_vec(), b"v".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Connection { .. })));
        assert_eq!(backend.increment(b"n").await.unwrap(), 1);

        backend.heal(CacheOp::Set);
        backend.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_flaky_ledger_counts_lookups() {
        let store = FlakyRevokedTokenStore::new();
        store.contains("a").await.unwrap();
        store.get("a").await.unwrap();
        assert_eq!(store.lookups(), 2);

        store.fail(LedgerOp::Lookup);
        assert!(store.contains("a").await.unwrap_err().is_transient());
        assert_eq!(store.lookups(), 2);
    }
}
