//! Per-identity login throttle.
//!
//! A fixed window counter in the fast expiring cache under
//! `login_attempt:<identity>`. Each attempt is one
//! [`increment_with_ttl`](StorageBackend::increment_with_ttl) call: the first
//! attempt of a window arms the window TTL and later attempts only increment,
//! so the window closes a fixed time after its first attempt no matter how
//! many attempts follow. A counter found without a deadline is re-armed, so
//! no failure can leave an identity limited past one window.

use std::{sync::Arc, time::Duration};

use warden_storage::{StorageBackend, StorageResult};

use crate::{
    context::RequestContext,
    error::{AuthError, Result},
};

/// Key prefix for login attempt counters.
pub const LOGIN_ATTEMPT_PREFIX: &str = "login_attempt:";

/// Cache key of the attempt counter for `identity`.
#[must_use]
pub fn login_attempt_key(identity: &str) -> Vec<u8> {
    format!("{LOGIN_ATTEMPT_PREFIX}{identity}").into_bytes()
}

/// Bounds login attempts per identity within a fixed window.
#[derive(Clone)]
pub struct LoginThrottle {
    cache: Arc<dyn StorageBackend>,
    window: Duration,
    max_attempts: u32,
}

impl LoginThrottle {
    /// Allows `max_attempts` attempts per `window`; the next is rejected.
    #[must_use]
    pub fn new(cache: Arc<dyn StorageBackend>, window: Duration, max_attempts: u32) -> Self {
        Self { cache, window, max_attempts }
    }

    /// Counts one attempt and returns the count in the current window.
    ///
    /// # Errors
    ///
    /// Returns the cache error, or a timeout past the request deadline.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn record_attempt(&self, ctx: &RequestContext, identity: &str) -> StorageResult<i64> {
        let key = login_attempt_key(identity);
        ctx.run(self.cache.increment_with_ttl(&key, self.window)).await
    }

    /// Returns `true` if the current window's count exceeds the limit.
    ///
    /// This is a pure read; it does not count as an attempt.
    ///
    /// # Errors
    ///
    /// Returns the cache error, or a timeout past the request deadline.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn is_limited(&self, ctx: &RequestContext, identity: &str) -> StorageResult<bool> {
        let value = ctx.run(self.cache.get(&login_attempt_key(identity))).await?;
        let count = value
            .and_then(|bytes| std::str::from_utf8(&bytes).ok()?.parse::<i64>().ok())
            .unwrap_or(0);
        Ok(self.exceeds(count))
    }

    /// Counts one attempt, then rejects it if the window's limit is exceeded.
    ///
    /// With the default limit of 5, attempts one through five pass and the
    /// sixth is the first rejected.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RateLimited`] with the time left in the window
    /// - [`AuthError::Storage`] if the counter cannot be updated
    #[tracing::instrument(skip(self, ctx))]
    pub async fn check(&self, ctx: &RequestContext, identity: &str) -> Result<()> {
        let count = self.record_attempt(ctx, identity).await?;
        if !self.exceeds(count) {
            return Ok(());
        }

        let key = login_attempt_key(identity);
        let retry_after = match ctx.run(self.cache.time_to_live(&key)).await {
            Ok(Some(remaining)) => remaining,
            Ok(None) => self.window,
            Err(error) => {
                tracing::debug!(%error, "could not read throttle window TTL");
                self.window
            },
        };

        tracing::info!(count, ?retry_after, "login attempts exceeded");
        Err(AuthError::RateLimited { retry_after })
    }

    fn exceeds(&self, count: i64) -> bool {
        count > i64::from(self.max_attempts)
    }
}

impl std::fmt::Debug for LoginThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginThrottle")
            .field("window", &self.window)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
