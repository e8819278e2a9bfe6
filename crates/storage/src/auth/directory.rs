//! User directory lookup used by credential verification.
//!
//! The directory owns user records; the session core only reads the fields it
//! needs to check a password and stamp a role into the issued token.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// The slice of a user record the session core consumes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable identity key (an email address in this domain).
    pub identity: String,
    /// PHC-format password hash.
    pub password_hash: String,
    /// Role claim stamped into issued tokens.
    pub role: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("identity", &self.identity)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Read access to the user directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Looks up a user by identity.
    ///
    /// Returns `Ok(None)` when no active user has that identity.
    async fn find_by_identity(&self, identity: &str) -> StorageResult<Option<UserRecord>>;
}

/// In-memory [`DirectoryStore`] for tests and development.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectoryStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
}

impl MemoryDirectoryStore {
    /// Creates a new empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if the identity is already taken.
    pub fn insert(&self, record: UserRecord) -> StorageResult<()> {
        let mut users = self.users.write();
        if users.contains_key(&record.identity) {
            return Err(StorageError::conflict());
        }
        users.insert(record.identity.clone(), record);
        Ok(())
    }

    /// Removes a user record, returning it if present.
    pub fn remove(&self, identity: &str) -> Option<UserRecord> {
        self.users.write().remove(identity)
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    #[tracing::instrument(skip(self))]
    async fn find_by_identity(&self, identity: &str) -> StorageResult<Option<UserRecord>> {
        Ok(self.users.read().get(identity).cloned())
    }
}
