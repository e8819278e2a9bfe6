//! # Warden Session Core
//!
//! Issues, tracks and revokes bearer session tokens for a user directory.
//!
//! This crate provides:
//! - **Token codec**: HS256 session tokens with key rotation
//! - **Revocation ledger**: durable revocation with a local positive-lookup cache
//! - **Active-session tracking**: one live token per identity; a new login revokes the last
//! - **Login throttling**: fixed-window attempt limits per identity
//! - **Lifecycle service**: `login`, `logout` and `authorize` over the pieces above
//!
//! Stores are injected through the contracts in [`warden_storage`]; nothing
//! here owns a database connection or a global key.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_authn::{SessionLifecycleService, keys::{KeyRing, SigningSecret}};
//! use warden_storage::auth::{DirectoryStore, RevokedTokenStore};
//! use warden_storage::StorageBackend;
//!
//! # async fn example(
//! #     cache: Arc<dyn StorageBackend>,
//! #     revocations: Arc<dyn RevokedTokenStore>,
//! #     directory: Arc<dyn DirectoryStore>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let service = SessionLifecycleService::builder()
//!     .cache(cache)
//!     .revocations(revocations)
//!     .directory(directory)
//!     .keys(Arc::new(KeyRing::new(SigningSecret::new("2026-10", std::env::var("SESSION_KEY")?)?)))
//!     .build()?;
//!
//! let ctx = service.context();
//! let token = service.login(&ctx, "a@x.com", "hunter2").await?;
//! let principal = service.authorize(&ctx, token.as_str(), "admin").await?;
//! println!("authorized {}", principal.identity);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Session configuration.
pub mod config;
/// Per-request deadlines.
pub mod context;
/// Session error types.
pub mod error;
/// Signing key ring.
pub mod keys;
/// Revocation ledger.
pub mod ledger;
/// Lifecycle counters.
pub mod metrics;
/// Password hashing.
pub mod password;
/// Lifecycle orchestration.
pub mod service;
/// Login throttle.
pub mod throttle;
/// Token issuance and verification.
pub mod token;
/// Active-session tracking.
pub mod tracker;
/// Token header validation.
pub mod validation;

// Re-export key types for convenience
pub use config::{ConfigError, SessionConfig};
pub use context::RequestContext;
pub use error::{AuthError, ErrorKind, Result};
pub use ledger::RevocationLedger;
pub use metrics::{SessionMetrics, SessionMetricsSnapshot};
pub use service::{Principal, SessionLifecycleService};
pub use throttle::LoginThrottle;
pub use token::{SessionClaims, SessionToken, TokenCodec};
pub use tracker::ActiveSessionTracker;
