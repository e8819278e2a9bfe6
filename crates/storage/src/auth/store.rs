//! Storage trait for the durable token revocation ledger.
//!
//! This module provides the [`RevokedTokenStore`] trait that abstracts
//! persistence of revoked session tokens. Production deployments back it with
//! a durable document or relational store keyed by the raw token string; the
//! in-memory implementation serves tests and single-process setups.
//!
//! # Entry Lifecycle
//!
//! ```text
//! ┌─────────────┐  insert   ┌─────────────┐  expires_at passes  ┌─────────────┐
//! │   Absent    │──────────►│   Present   │────────────────────►│ Purgeable   │
//! │ (token may  │           │ (token is   │                     │ (token has  │
//! │  be valid)  │           │  invalid)   │                     │  expired)   │
//! └─────────────┘           └─────────────┘                     └─────────────┘
//! ```

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{auth::RevokedToken, error::StorageResult};

/// Persistence layer for revoked session tokens.
///
/// # Idempotency
///
/// Inserting a token that is already present succeeds and leaves the original
/// entry untouched, mirroring how a unique-index insert followed by
/// "duplicate key is fine" behaves in document stores.
#[async_trait]
pub trait RevokedTokenStore: Send + Sync {
    /// Records a revoked token.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable. Duplicate inserts are
    /// not an error.
    async fn insert(&self, entry: &RevokedToken) -> StorageResult<()>;

    /// Looks up the entry for a token.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(entry))` if the token has been revoked
    /// - `Ok(None)` if it has not
    /// - `Err(...)` on storage errors
    async fn get(&self, token: &str) -> StorageResult<Option<RevokedToken>>;

    /// Returns whether a token has been revoked.
    ///
    /// The default implementation delegates to [`get`](Self::get);
    /// implementations with a cheaper existence query should override it.
    async fn contains(&self, token: &str) -> StorageResult<bool> {
        Ok(self.get(token).await?.is_some())
    }

    /// Removes entries whose retention horizon is at or before `now`.
    ///
    /// Returns the number of entries removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<u64>;
}

/// In-memory implementation of [`RevokedTokenStore`].
///
/// Stores entries in a thread-safe hash map keyed by token string. It does
/// not persist data between restarts.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use warden_storage::auth::{
///     MemoryRevokedTokenStore, RevocationReason, RevokedToken, RevokedTokenStore,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRevokedTokenStore::new();
///
///     let entry = RevokedToken::builder()
///         .token("token-1".to_owned())
///         .expires_at(Utc::now() + Duration::minutes(5))
///         .reason(RevocationReason::Logout)
///         .build();
///
///     store.insert(&entry).await?;
///     assert!(store.contains("token-1").await?);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryRevokedTokenStore {
    entries: Arc<RwLock<HashMap<String, RevokedToken>>>,
}

impl MemoryRevokedTokenStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl RevokedTokenStore for MemoryRevokedTokenStore {
    #[tracing::instrument(skip_all, fields(reason = %entry.reason))]
    async fn insert(&self, entry: &RevokedToken) -> StorageResult<()> {
        let mut entries = self.entries.write();
        entries.entry(entry.token.clone()).or_insert_with(|| entry.clone());
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn get(&self, token: &str) -> StorageResult<Option<RevokedToken>> {
        Ok(self.entries.read().get(token).cloned())
    }

    #[tracing::instrument(skip_all)]
    async fn contains(&self, token: &str) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(token))
    }

    #[tracing::instrument(skip(self))]
    async fn purge_expired(&self, now: DateTime<Utc>) -> StorageResult<u64> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}
