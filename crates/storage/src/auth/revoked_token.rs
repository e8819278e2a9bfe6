//! Revocation ledger entry type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a session token was revoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// A newer login for the same identity replaced this session.
    Superseded,
    /// The holder explicitly logged out.
    Logout,
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Superseded => f.write_str("superseded"),
            Self::Logout => f.write_str("logout"),
        }
    }
}

/// A revoked session token as persisted in the durable ledger.
///
/// Presence of an entry is what invalidates the token. `expires_at` only
/// bounds how long the entry must be retained: once it has passed, the entry
/// may be purged without affecting correctness because the token itself has
/// expired by then.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use warden_storage::auth::{RevocationReason, RevokedToken};
///
/// let entry = RevokedToken::builder()
///     .token("eyJhbGciOiJIUzI1NiJ9.e30.sig".to_owned())
///     .expires_at(Utc::now() + Duration::minutes(5))
///     .reason(RevocationReason::Logout)
///     .build();
///
/// assert!(!entry.is_expired(Utc::now()));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct RevokedToken {
    /// The raw token string; the ledger's lookup key.
    pub token: String,

    /// When the revocation was recorded.
    #[builder(default = Utc::now())]
    pub revoked_at: DateTime<Utc>,

    /// Retention horizon of this entry.
    pub expires_at: DateTime<Utc>,

    /// Why the token was revoked.
    pub reason: RevocationReason,
}

impl RevokedToken {
    /// Returns `true` once the retention horizon has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// Token strings are bearer credentials; keep them out of logs.
impl std::fmt::Debug for RevokedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevokedToken")
            .field("token", &"<redacted>")
            .field("revoked_at", &self.revoked_at)
            .field("expires_at", &self.expires_at)
            .field("reason", &self.reason)
            .finish()
    }
}
