//! Session error types.
//!
//! Every failure the session core can report is an [`AuthError`]. Callers that
//! need to map failures onto a transport status should match on
//! [`AuthError::kind`] instead of inspecting messages.

use std::time::Duration;

use thiserror::Error;
use warden_storage::StorageError;

use crate::config::ConfigError;

/// Stable, message-independent classification of an [`AuthError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Too many login attempts in the current window.
    RateLimited,
    /// Credentials did not match a directory record.
    Unauthenticated,
    /// No token was presented.
    MissingToken,
    /// Signature, key or algorithm problems.
    InvalidToken,
    /// The token decoded but its claims are structurally wrong.
    Malformed,
    /// The token's embedded expiry has passed.
    Expired,
    /// The token is recorded in the revocation ledger.
    AlreadyRevoked,
    /// The token carries no identity.
    IdentityMissing,
    /// The token's role does not grant the requested operation.
    Forbidden,
    /// A store was unreachable or timed out; retrying may succeed.
    Transient,
    /// Anything else.
    Internal,
}

/// Session lifecycle errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Login attempts for this identity exceeded the window limit.
    #[error("Too many login attempts, retry after {retry_after:?}")]
    RateLimited {
        /// Time until the current throttle window resets.
        retry_after: Duration,
    },

    /// Unknown identity or wrong password.
    #[error("Invalid credentials")]
    Unauthenticated,

    /// Empty token string.
    #[error("Missing token")]
    MissingToken,

    /// Token rejected during verification.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Token structure or claims could not be decoded.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Header algorithm is not accepted.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Header names a key the key ring does not hold.
    #[error("Unknown signing key: {kid}")]
    UnknownKey {
        /// Key ID from the token header.
        kid: String,
    },

    /// Token is already in the revocation ledger.
    #[error("Token already revoked")]
    AlreadyRevoked,

    /// Token has no subject.
    #[error("Token carries no identity")]
    IdentityMissing,

    /// Role claim does not match the required role.
    #[error("Forbidden: role '{actual}' does not satisfy '{required}'")]
    Forbidden {
        /// Role the operation requires.
        required: String,
        /// Role found in the token.
        actual: String,
    },

    /// Storage backend failure on a path required for correctness.
    ///
    /// Wraps the original [`StorageError`] to preserve the source chain.
    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid configuration or key material.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AuthError {
    /// Creates an [`AuthError::InvalidToken`].
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken(message.into())
    }

    /// Creates an [`AuthError::Malformed`].
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Creates an [`AuthError::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates an [`AuthError::Forbidden`].
    #[must_use]
    pub fn forbidden(required: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Forbidden { required: required.into(), actual: actual.into() }
    }

    /// Returns the stable classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::MissingToken => ErrorKind::MissingToken,
            Self::InvalidToken(_)
            | Self::InvalidSignature
            | Self::UnsupportedAlgorithm(_)
            | Self::UnknownKey { .. } => ErrorKind::InvalidToken,
            Self::TokenExpired => ErrorKind::Expired,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::AlreadyRevoked => ErrorKind::AlreadyRevoked,
            Self::IdentityMissing => ErrorKind::IdentityMissing,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::Storage(err) if err.is_transient() => ErrorKind::Transient,
            Self::Storage(_) | Self::Internal(_) | Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if retrying the operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtKind;

        match err.kind() {
            JwtKind::InvalidSignature => AuthError::InvalidSignature,
            JwtKind::ExpiredSignature => AuthError::TokenExpired,
            JwtKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            JwtKind::InvalidToken => AuthError::malformed("Invalid JWT structure"),
            JwtKind::MissingRequiredClaim(claim) => {
                AuthError::malformed(format!("missing claim: {claim}"))
            },
            JwtKind::Base64(_) | JwtKind::Json(_) | JwtKind::Utf8(_) => {
                AuthError::malformed(format!("JWT error: {err}"))
            },
            JwtKind::InvalidIssuer => AuthError::invalid_token("issuer mismatch"),
            _ => AuthError::invalid_token(format!("JWT error: {err}")),
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Storage(err)
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, AuthError>;
