//! Counters for session lifecycle events.
//!
//! # Examples
//!
//! ```
//! use warden_authn::SessionMetrics;
//!
//! let metrics = SessionMetrics::new();
//! metrics.record_login();
//! metrics.record_superseded();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.logins, 1);
//! assert_eq!(snapshot.superseded, 1);
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Snapshot of session metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, bon::Builder)]
pub struct SessionMetricsSnapshot {
    /// Successful logins.
    #[builder(default)]
    pub logins: u64,
    /// Logins rejected for bad credentials.
    #[builder(default)]
    pub failed_logins: u64,
    /// Logins rejected by the throttle.
    #[builder(default)]
    pub rate_limited: u64,
    /// Prior sessions revoked by a newer login.
    #[builder(default)]
    pub superseded: u64,
    /// Successful logouts.
    #[builder(default)]
    pub logouts: u64,
    /// Successful authorizations.
    #[builder(default)]
    pub authorized: u64,
    /// Authorizations rejected for any reason.
    #[builder(default)]
    pub authorize_failures: u64,
    /// Best-effort active-session marker updates that failed.
    #[builder(default)]
    pub tracker_failures: u64,
}

impl SessionMetricsSnapshot {
    /// Fraction of login attempts that failed or were throttled (0.0 to 1.0).
    #[must_use]
    pub fn login_failure_rate(&self) -> f64 {
        let failed = self.failed_logins + self.rate_limited;
        let total = self.logins + failed;
        if total == 0 { 0.0 } else { failed as f64 / total as f64 }
    }
}

#[derive(Default)]
struct SessionMetricsInner {
    logins: AtomicU64,
    failed_logins: AtomicU64,
    rate_limited: AtomicU64,
    superseded: AtomicU64,
    logouts: AtomicU64,
    authorized: AtomicU64,
    authorize_failures: AtomicU64,
    tracker_failures: AtomicU64,
}

/// Thread-safe session counters. Clones share the same counters.
#[derive(Clone, Default)]
pub struct SessionMetrics {
    inner: Arc<SessionMetricsInner>,
}

impl SessionMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful login.
    pub fn record_login(&self) {
        self.inner.logins.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a login rejected for bad credentials.
    pub fn record_failed_login(&self) {
        self.inner.failed_logins.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a throttled login.
    pub fn record_rate_limited(&self) {
        self.inner.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a superseded session.
    pub fn record_superseded(&self) {
        self.inner.superseded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a successful logout.
    pub fn record_logout(&self) {
        self.inner.logouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the outcome of an authorization.
    pub fn record_authorize(&self, ok: bool) {
        let counter =
            if ok { &self.inner.authorized } else { &self.inner.authorize_failures };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed best-effort tracker update.
    pub fn record_tracker_failure(&self) {
        self.inner.tracker_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current values.
    #[must_use]
    pub fn snapshot(&self) -> SessionMetricsSnapshot {
        let inner = &self.inner;
        SessionMetricsSnapshot::builder()
            .logins(inner.logins.load(Ordering::Relaxed))
            .failed_logins(inner.failed_logins.load(Ordering::Relaxed))
            .rate_limited(inner.rate_limited.load(Ordering::Relaxed))
            .superseded(inner.superseded.load(Ordering::Relaxed))
            .logouts(inner.logouts.load(Ordering::Relaxed))
            .authorized(inner.authorized.load(Ordering::Relaxed))
            .authorize_failures(inner.authorize_failures.load(Ordering::Relaxed))
            .tracker_failures(inner.tracker_failures.load(Ordering::Relaxed))
            .build()
    }
}

impl std::fmt::Debug for SessionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMetrics").field("snapshot", &self.snapshot()).finish()
    }
}
