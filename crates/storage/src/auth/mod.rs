//! Authentication-side stores: the token revocation ledger and the user
//! directory.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────┐
//! │  Session core    │─────►│  RevokedTokenStore   │  durable, keyed by token
//! │ (warden-authn)   │      └──────────────────────┘
//! │                  │      ┌──────────────────────┐
//! │                  │─────►│  DirectoryStore      │  user records, read-only
//! └──────────────────┘      └──────────────────────┘
//! ```
//!
//! Use [`MemoryRevokedTokenStore`] and [`MemoryDirectoryStore`] for testing.

mod directory;
mod revoked_token;
mod store;

pub use directory::{DirectoryStore, MemoryDirectoryStore, UserRecord};
pub use revoked_token::{RevocationReason, RevokedToken};
pub use store::{MemoryRevokedTokenStore, RevokedTokenStore};
