//! Configuration for the session core.
//!
//! [`SessionConfig`] holds the horizons and limits that govern issuance,
//! supersession tracking, revocation retention and login throttling. It can
//! be built in code or deserialized from any serde format, with durations
//! written in humantime notation (`"5m"`, `"24h"`).
//!
//! ```
//! use std::time::Duration;
//! use warden_authn::SessionConfig;
//!
//! let config: SessionConfig = serde_json::from_str(r#"{ "token_ttl": "10m" }"#)?;
//! assert_eq!(config.token_ttl, Duration::from_secs(600));
//! assert_eq!(config.throttle_max_attempts, 5);
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default embedded token lifetime (5 minutes).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of the active-session marker (24 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default revocation retention when a token's expiry cannot be read (24 hours).
pub const DEFAULT_REVOCATION_FALLBACK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default login throttle window (60 seconds).
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(60);

/// Default number of login attempts allowed per window.
pub const DEFAULT_THROTTLE_MAX_ATTEMPTS: u32 = 5;

/// Default bound on a single request's store round trips (2 seconds).
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default `iss` claim.
pub const DEFAULT_ISSUER: &str = "warden";

/// Default capacity of the revoked-token lookup cache.
pub const DEFAULT_REVOCATION_CACHE_CAPACITY: u64 = 10_000;

/// Minimum accepted length of an HMAC signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Invalid configuration or key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A duration or count that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The issuer string was empty.
    #[error("issuer must not be empty")]
    EmptyIssuer,

    /// A key ID was empty.
    #[error("key id must not be empty")]
    EmptyKeyId,

    /// A signing secret was shorter than [`MIN_SECRET_LEN`].
    #[error("secret for key '{kid}' is {len} bytes, at least {MIN_SECRET_LEN} required")]
    WeakSecret {
        /// Key ID the secret belongs to.
        kid: String,
        /// Actual length in bytes.
        len: usize,
    },

    /// A key ID was registered twice.
    #[error("duplicate key id: {kid}")]
    DuplicateKeyId {
        /// The repeated key ID.
        kid: String,
    },
}

/// Horizons and limits for the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Lifetime embedded in each issued token.
    #[serde(with = "humantime_serde", default = "default_token_ttl")]
    #[builder(default = DEFAULT_TOKEN_TTL)]
    pub token_ttl: Duration,

    /// How long the active-session marker survives if never cleared.
    #[serde(with = "humantime_serde", default = "default_session_ttl")]
    #[builder(default = DEFAULT_SESSION_TTL)]
    pub session_ttl: Duration,

    /// Revocation retention used when a token's own expiry is unreadable.
    #[serde(with = "humantime_serde", default = "default_revocation_fallback_ttl")]
    #[builder(default = DEFAULT_REVOCATION_FALLBACK_TTL)]
    pub revocation_fallback_ttl: Duration,

    /// Fixed login throttle window, measured from the first attempt.
    #[serde(with = "humantime_serde", default = "default_throttle_window")]
    #[builder(default = DEFAULT_THROTTLE_WINDOW)]
    pub throttle_window: Duration,

    /// Attempts allowed per window; the next one is rejected.
    #[serde(default = "default_throttle_max_attempts")]
    #[builder(default = DEFAULT_THROTTLE_MAX_ATTEMPTS)]
    pub throttle_max_attempts: u32,

    /// Deadline applied to requests that do not bring their own.
    #[serde(with = "humantime_serde", default = "default_store_timeout")]
    #[builder(default = DEFAULT_STORE_TIMEOUT)]
    pub store_timeout: Duration,

    /// `iss` claim stamped into and required from tokens.
    #[serde(default = "default_issuer")]
    #[builder(default = default_issuer(), into)]
    pub issuer: String,

    /// Capacity of the in-process cache of known-revoked tokens.
    #[serde(default = "default_revocation_cache_capacity")]
    #[builder(default = DEFAULT_REVOCATION_CACHE_CAPACITY)]
    pub revocation_cache_capacity: u64,
}

fn default_token_ttl() -> Duration {
    DEFAULT_TOKEN_TTL
}

fn default_session_ttl() -> Duration {
    DEFAULT_SESSION_TTL
}

fn default_revocation_fallback_ttl() -> Duration {
    DEFAULT_REVOCATION_FALLBACK_TTL
}

fn default_throttle_window() -> Duration {
    DEFAULT_THROTTLE_WINDOW
}

fn default_throttle_max_attempts() -> u32 {
    DEFAULT_THROTTLE_MAX_ATTEMPTS
}

fn default_store_timeout() -> Duration {
    DEFAULT_STORE_TIMEOUT
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_owned()
}

fn default_revocation_cache_capacity() -> u64 {
    DEFAULT_REVOCATION_CACHE_CAPACITY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    /// Checks that every duration and limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] for a zero duration or attempt limit, and
    /// [`ConfigError::EmptyIssuer`] for an empty issuer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("token_ttl", self.token_ttl),
            ("session_ttl", self.session_ttl),
            ("revocation_fallback_ttl", self.revocation_fallback_ttl),
            ("throttle_window", self.throttle_window),
            ("store_timeout", self.store_timeout),
        ];
        if let Some(&(field, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Zero { field });
        }
        if self.throttle_max_attempts == 0 {
            return Err(ConfigError::Zero { field: "throttle_max_attempts" });
        }
        if self.revocation_cache_capacity == 0 {
            return Err(ConfigError::Zero { field: "revocation_cache_capacity" });
        }
        if self.issuer.is_empty() {
            return Err(ConfigError::EmptyIssuer);
        }
        Ok(())
    }
}
