//! Password hashing for directory records.
//!
//! Hashes are Argon2id in PHC string format, so parameters and salt travel
//! with the hash and can be tuned without migrating stored records.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Hashes `password` with a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] if hashing fails.
///
/// # Examples
///
/// ```
/// use warden_authn::password::{hash_password, verify_password};
///
/// let hash = hash_password("correct horse")?;
/// assert!(hash.starts_with("$argon2id$"));
/// assert!(verify_password("correct horse", &hash)?);
/// assert!(!verify_password("battery staple", &hash)?);
/// # Ok::<(), warden_authn::AuthError>(())
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| AuthError::internal(format!("failed to encode salt: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::internal(format!("failed to hash password: {e}")))
}

/// Checks `password` against a PHC-format hash.
///
/// Returns `Ok(false)` on mismatch.
///
/// # Errors
///
/// Returns [`AuthError::Internal`] if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::internal(format!("stored password hash is invalid: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::internal(format!("password verification failed: {e}"))),
    }
}

/// Runs [`verify_password`] on the blocking thread pool.
///
/// Argon2 is deliberately slow; running it inline would stall the async
/// worker for tens of milliseconds.
///
/// # Errors
///
/// Same as [`verify_password`], plus [`AuthError::Internal`] if the blocking
/// task panics.
pub async fn verify_password_blocking(password: &str, hash: &str) -> Result<bool> {
    let password = Zeroizing::new(password.to_owned());
    let hash = hash.to_owned();

    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::internal(format!("password verification task failed: {e}")))?
}
