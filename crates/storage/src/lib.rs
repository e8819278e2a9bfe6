//! Store contracts consumed by the warden session core.
//!
//! The session core never talks to a concrete database. It depends on three
//! collaborator contracts defined here, each with an in-memory reference
//! implementation:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 warden-authn (session core)                 │
//! │   LoginThrottle │ ActiveSessionTracker │ RevocationLedger   │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │        StorageBackend        │ RevokedTokenStore │ Directory│
//! │  (fast expiring cache:       │ (durable ledger)  │  Store   │
//! │   counters, active markers)  │                   │          │
//! ├──────────────────────────────┼───────────────────┼──────────┤
//! │        MemoryBackend         │ MemoryRevoked...  │ Memory...│
//! └──────────────────────────────┴───────────────────┴──────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use warden_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend
//!         .set_with_ttl(b"active_token:a@x.com".to_vec(), b"token".to_vec(), Duration::from_secs(60))
//!         .await?;
//!
//!     let value = backend.get(b"active_token:a@x.com").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"token".to_vec()));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Backends map their internal
//! errors to [`StorageError`]; [`StorageError::is_transient`] tells callers
//! whether a retry could help.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with failure-injecting wrappers around the
//!   in-memory stores. Enable this in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]

pub mod auth;
pub mod backend;
pub mod error;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
