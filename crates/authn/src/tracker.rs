//! Active-session marker per identity.
//!
//! The marker lives in the fast expiring cache under `active_token:<identity>`
//! and names the one token currently considered live for that identity. It is
//! a detection aid for supersession, not an authority: a token is invalidated
//! only by a ledger entry, never by the marker moving on.

use std::{sync::Arc, time::Duration};

use fail::fail_point;
use warden_storage::{StorageBackend, StorageError, StorageResult};

use crate::{context::RequestContext, token::SessionToken};

/// Key prefix for active-session markers.
pub const ACTIVE_TOKEN_PREFIX: &str = "active_token:";

/// Cache key of the active-session marker for `identity`.
#[must_use]
pub fn active_token_key(identity: &str) -> Vec<u8> {
    format!("{ACTIVE_TOKEN_PREFIX}{identity}").into_bytes()
}

/// Single-slot record of the live token per identity.
///
/// # Concurrency
///
/// Two logins for the same identity may race. Each reads the prior marker and
/// revokes what it observed; the last `set` to land wins. At most one marker
/// survives, and every token a login observed as prior is revoked by that
/// login.
#[derive(Clone)]
pub struct ActiveSessionTracker {
    cache: Arc<dyn StorageBackend>,
}

impl ActiveSessionTracker {
    /// Creates a tracker over the fast expiring cache.
    #[must_use]
    pub fn new(cache: Arc<dyn StorageBackend>) -> Self {
        Self { cache }
    }

    /// Reads the current marker for `identity`.
    ///
    /// The read is not destructive; the caller revokes the returned token and
    /// then overwrites the marker with [`set`](Self::set). An empty or
    /// non-UTF-8 marker is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns the cache error, or [`StorageError::Timeout`] past the
    /// request deadline.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn supersede_and_get(
        &self,
        ctx: &RequestContext,
        identity: &str,
    ) -> StorageResult<Option<String>> {
        let key = active_token_key(identity);
        let value = ctx.run(self.cache.get(&key)).await?;

        Ok(value
            .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
            .filter(|token| !token.is_empty()))
    }

    /// Overwrites the marker for `identity`, resetting its TTL.
    ///
    /// # Errors
    ///
    /// Returns the cache error, or [`StorageError::Timeout`] past the
    /// request deadline.
    #[tracing::instrument(skip(self, ctx, token))]
    pub async fn set(
        &self,
        ctx: &RequestContext,
        identity: &str,
        token: &SessionToken,
        ttl: Duration,
    ) -> StorageResult<()> {
        fail_point!("tracker-before-set", |_| {
            Err(StorageError::connection("fail point: tracker-before-set"))
        });

        let key = active_token_key(identity);
        ctx.run(self.cache.set_with_ttl(key, token.as_str().as_bytes().to_vec(), ttl)).await
    }

    /// Removes the marker for `identity`.
    ///
    /// # Errors
    ///
    /// Returns the cache error, or [`StorageError::Timeout`] past the
    /// request deadline.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn clear(&self, ctx: &RequestContext, identity: &str) -> StorageResult<()> {
        ctx.run(self.cache.delete(&active_token_key(identity))).await
    }
}

impl std::fmt::Debug for ActiveSessionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSessionTracker").finish_non_exhaustive()
    }
}
