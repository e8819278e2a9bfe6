//! Revocation ledger.
//!
//! A token is usable only while it is absent from the ledger. Entries carry a
//! retention horizon; once that passes the entry may be purged, because by
//! then the token has also expired on its own and fails verification anyway.
//!
//! # Lookup cache
//!
//! Revocation is permanent for the lifetime of an entry, so a positive answer
//! can be cached locally until the entry's horizon. Negative answers are never
//! cached: a token that is valid now may be revoked by another process a
//! moment later.
//!
//! ```text
//! contains(token)
//!   ├─ cache hit  ──────────────────────────────► true
//!   └─ cache miss ─► store.get(token)
//!                     ├─ Some(entry) ─► cache until entry.expires_at ─► true
//!                     └─ None ─────────────────────────────────────────► false
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use fail::fail_point;
use moka::{future::Cache, policy::EvictionPolicy};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use warden_storage::{
    StorageError, StorageResult,
    auth::{RevocationReason, RevokedToken, RevokedTokenStore},
};

/// Per-entry expiry: each cached value holds the instant its ledger entry
/// stops being retained.
struct RetentionExpiry;

impl moka::Expiry<String, Instant> for RetentionExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Instant,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.saturating_duration_since(created_at))
    }
}

/// Converts a wall-clock horizon into a monotonic instant.
fn retention_instant(expires_at: DateTime<Utc>) -> Instant {
    let remaining = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    let now = Instant::now();
    // Past the clock's range the entry is simply not cached; the store still answers.
    now.checked_add(remaining).unwrap_or(now)
}

/// Durable record of revoked tokens with a local cache of positive lookups.
pub struct RevocationLedger {
    store: Arc<dyn RevokedTokenStore>,
    revoked: Cache<String, Instant>,
}

impl RevocationLedger {
    /// Creates a ledger over `store`, caching up to `cache_capacity` known
    /// revoked tokens.
    #[must_use]
    pub fn new(store: Arc<dyn RevokedTokenStore>, cache_capacity: u64) -> Self {
        let revoked = Cache::builder()
            .max_capacity(cache_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(RetentionExpiry)
            .build();
        Self { store, revoked }
    }

    /// Records `token` as revoked, retained until `expires_at`.
    ///
    /// Adding a token that is already present succeeds and keeps the original
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the entry could not be written; the token
    /// must then be treated as still live.
    #[tracing::instrument(skip(self, token))]
    pub async fn add(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        reason: RevocationReason,
    ) -> StorageResult<()> {
        fail_point!("ledger-before-insert", |_| {
            Err(StorageError::connection("fail point: ledger-before-insert"))
        });

        let entry = RevokedToken::builder()
            .token(token.to_owned())
            .expires_at(expires_at)
            .reason(reason)
            .build();
        self.store.insert(&entry).await?;
        self.revoked.insert(entry.token, retention_instant(expires_at)).await;

        tracing::debug!(%reason, %expires_at, "token revoked");
        Ok(())
    }

    /// Returns whether `token` has been revoked.
    ///
    /// # Errors
    ///
    /// Returns the store's error on a cache miss that cannot be resolved.
    /// Callers must not treat an error as "not revoked".
    #[tracing::instrument(skip_all)]
    pub async fn contains(&self, token: &str) -> StorageResult<bool> {
        if self.revoked.get(token).await.is_some() {
            tracing::debug!(cache = "hit", "revocation lookup");
            return Ok(true);
        }

        match self.store.get(token).await? {
            Some(entry) => {
                self.revoked.insert(entry.token, retention_instant(entry.expires_at)).await;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Removes entries whose retention horizon has passed.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the purge fails.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self) -> StorageResult<u64> {
        let removed = self.store.purge_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::info!(removed, "purged expired revocation entries");
        }
        Ok(removed)
    }

    /// Spawns a task that purges expired entries every `interval` until
    /// `cancel` fires.
    ///
    /// Purge failures are logged and retried on the next tick.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn spawn_purge_task(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let ledger = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; consume it so the first purge
            // happens one full interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("revocation purge task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(error) = ledger.purge_expired().await {
                            tracing::warn!(%error, "revocation purge failed");
                        }
                    }
                }
            }
        })
    }

    /// Number of revoked tokens held in the local cache.
    ///
    /// The count is approximate until [`sync`](Self::sync) runs pending
    /// maintenance.
    #[must_use]
    pub fn cached_entries(&self) -> u64 {
        self.revoked.entry_count()
    }

    /// Runs pending cache maintenance (expiry and eviction).
    pub async fn sync(&self) {
        self.revoked.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for RevocationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationLedger").field("cached_entries", &self.cached_entries()).finish()
    }
}
