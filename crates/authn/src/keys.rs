//! Signing keys for session tokens.
//!
//! A [`KeyRing`] holds exactly one active key, used to sign new tokens, plus
//! any number of verification-only keys. Rotation promotes a new active key
//! and demotes the previous one to verification, so tokens issued just before
//! a rotation keep verifying until they expire on their own.
//!
//! ```
//! use warden_authn::keys::{KeyRing, SigningSecret};
//!
//! let ring = KeyRing::new(SigningSecret::generate("2026-10"));
//! ring.rotate(SigningSecret::generate("2026-11"))?;
//!
//! assert_eq!(ring.active_kid(), "2026-11");
//! assert!(ring.contains("2026-10"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::RwLock;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::{
    config::{ConfigError, MIN_SECRET_LEN},
    error::AuthError,
};

/// A named HMAC secret.
///
/// The secret bytes are scrubbed from memory when the last handle drops.
pub struct SigningSecret {
    kid: String,
    secret: Zeroizing<Vec<u8>>,
}

impl SigningSecret {
    /// Wraps caller-provided secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyKeyId`] for an empty key ID and
    /// [`ConfigError::WeakSecret`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(kid: impl Into<String>, secret: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let kid = kid.into();
        let secret = Zeroizing::new(secret.into());
        if kid.is_empty() {
            return Err(ConfigError::EmptyKeyId);
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret { kid, len: secret.len() });
        }
        Ok(Self { kid, secret })
    }

    /// Generates a random 32-byte secret.
    #[must_use]
    pub fn generate(kid: impl Into<String>) -> Self {
        let mut secret = Zeroizing::new(vec![0u8; MIN_SECRET_LEN]);
        rand::thread_rng().fill_bytes(&mut secret);
        Self { kid: kid.into(), secret }
    }

    /// Key ID stamped into token headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret").field("kid", &self.kid).field("secret", &"<redacted>").finish()
    }
}

struct KeyRingInner {
    active: Arc<SigningSecret>,
    verification: HashMap<String, Arc<SigningSecret>>,
}

/// Active signing key plus verification-only keys, shared across tasks.
pub struct KeyRing {
    inner: RwLock<KeyRingInner>,
}

impl KeyRing {
    /// Creates a key ring whose only key is `active`.
    #[must_use]
    pub fn new(active: SigningSecret) -> Self {
        Self {
            inner: RwLock::new(KeyRingInner {
                active: Arc::new(active),
                verification: HashMap::new(),
            }),
        }
    }

    /// Registers a key that verifies tokens but never signs them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKeyId`] if the key ID is already held.
    pub fn add_verification_key(&self, key: SigningSecret) -> Result<(), ConfigError> {
        let mut inner = self.inner.write();
        if inner.active.kid == key.kid || inner.verification.contains_key(&key.kid) {
            return Err(ConfigError::DuplicateKeyId { kid: key.kid });
        }
        inner.verification.insert(key.kid.clone(), Arc::new(key));
        Ok(())
    }

    /// Makes `next` the signing key and keeps the previous active key for
    /// verification.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateKeyId`] if the key ID is already held.
    pub fn rotate(&self, next: SigningSecret) -> Result<(), ConfigError> {
        let mut inner = self.inner.write();
        if inner.active.kid == next.kid || inner.verification.contains_key(&next.kid) {
            return Err(ConfigError::DuplicateKeyId { kid: next.kid });
        }
        let previous = std::mem::replace(&mut inner.active, Arc::new(next));
        tracing::info!(previous = %previous.kid, active = %inner.active.kid, "signing key rotated");
        inner.verification.insert(previous.kid.clone(), previous);
        Ok(())
    }

    /// Drops a verification-only key. Tokens signed with it stop verifying.
    ///
    /// Returns `false` if the key is unknown or is the active key.
    pub fn retire(&self, kid: &str) -> bool {
        self.inner.write().verification.remove(kid).is_some()
    }

    /// Key ID of the active signing key.
    #[must_use]
    pub fn active_kid(&self) -> String {
        self.inner.read().active.kid.clone()
    }

    /// Returns `true` if `kid` names the active key or a verification key.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        let inner = self.inner.read();
        inner.active.kid == kid || inner.verification.contains_key(kid)
    }

    pub(crate) fn signing_key(&self) -> (String, EncodingKey) {
        let active = Arc::clone(&self.inner.read().active);
        (active.kid.clone(), active.encoding_key())
    }

    pub(crate) fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let inner = self.inner.read();
        if inner.active.kid == kid {
            return Ok(inner.active.decoding_key());
        }
        inner
            .verification
            .get(kid)
            .map(|key| key.decoding_key())
            .ok_or_else(|| AuthError::UnknownKey { kid: kid.to_owned() })
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        let mut verification: Vec<&str> = inner.verification.keys().map(String::as_str).collect();
        verification.sort_unstable();
        f.debug_struct("KeyRing")
            .field("active", &inner.active.kid)
            .field("verification", &verification)
            .finish()
    }
}
