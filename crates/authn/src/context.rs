//! Per-request deadline.
//!
//! Every store round trip the session service performs is bounded by the
//! caller's [`RequestContext`]. When the deadline passes the pending call is
//! abandoned and reported as [`StorageError::Timeout`], which classifies as a
//! transient failure.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use warden_storage::{StorageError, StorageResult};

/// Deadline carried through one login, logout or authorize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    deadline: Instant,
}

impl RequestContext {
    /// A context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { deadline: Instant::now() + timeout }
    }

    /// A context expiring at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// The deadline.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns `true` once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Runs a store call, failing with [`StorageError::Timeout`] if it does
    /// not finish before the deadline.
    ///
    /// # Errors
    ///
    /// Returns the call's own error, or [`StorageError::Timeout`].
    pub async fn run<T, F>(&self, call: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        tokio::time::timeout_at(self.deadline, call).await.map_err(|_| StorageError::timeout())?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_call_within_deadline_completes() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(2));
        let value = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(2));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StorageError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_saturates() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(100));
        assert!(!ctx.is_expired());
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_error_passes_through() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(1));
        let result: StorageResult<()> =
            ctx.run(async { Err(StorageError::connection("refused")) }).await;
        assert!(matches!(result, Err(StorageError::Connection { .. })));
    }
}
