//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying a `kid` header and the claims
//!
//! ```json
//! {
//!   "iss": "warden",
//!   "sub": "a@x.com",
//!   "role": "admin",
//!   "iat": 1792150000,
//!   "exp": 1792150300,
//!   "jti": "7q3Z9tq1cJkP0eH2mW4xYg"
//! }
//! ```
//!
//! The token is self-contained: [`TokenCodec::verify`] needs only the key
//! ring. Whether a token has been revoked is a separate question answered by
//! the [`RevocationLedger`](crate::RevocationLedger).

use std::{collections::HashSet, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, Header, Validation, decode, decode_header, encode};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AuthError, Result},
    keys::KeyRing,
    validation::{validate_algorithm, validate_kid},
};

/// An issued session token.
///
/// `Debug` never prints the token itself; use [`as_str`](Self::as_str) to
/// hand it to a client.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// The encoded token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the encoded token.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&"<redacted>").finish()
    }
}

/// Verified session claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Issuer.
    pub iss: String,
    /// Subject: the identity the token was issued to.
    pub sub: String,
    /// Role granted at login.
    pub role: String,
    /// Issued at (seconds since epoch).
    pub iat: i64,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
}

impl SessionClaims {
    /// Identity the token was issued to.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.sub
    }

    /// Embedded expiry as a timestamp.
    ///
    /// Out-of-range values saturate to the Unix epoch, which is always in the
    /// past.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Issue time as a timestamp.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// Claims of a signature-checked token whose expiry was not enforced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InspectedToken {
    /// Identity the token was issued to.
    pub identity: String,
    /// Embedded expiry, if the token carries a readable one.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Wire form of the claims; every field is optional so that absent claims
/// surface as typed errors instead of a generic decode failure.
#[derive(Deserialize)]
struct RawClaims {
    iss: Option<String>,
    sub: Option<String>,
    role: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
    jti: Option<String>,
}

impl RawClaims {
    fn identity(&self) -> Result<String> {
        self.sub.clone().filter(|sub| !sub.is_empty()).ok_or(AuthError::IdentityMissing)
    }

    fn into_claims(self) -> Result<SessionClaims> {
        let sub = self.identity()?;
        let missing = |claim: &str| AuthError::malformed(format!("missing claim: {claim}"));
        Ok(SessionClaims {
            iss: self.iss.ok_or_else(|| missing("iss"))?,
            sub,
            role: self.role.ok_or_else(|| missing("role"))?,
            iat: self.iat.ok_or_else(|| missing("iat"))?,
            exp: self.exp.ok_or_else(|| missing("exp"))?,
            jti: self.jti.ok_or_else(|| missing("jti"))?,
        })
    }
}

/// Creates and verifies signed session tokens.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
/// use warden_authn::{TokenCodec, keys::{KeyRing, SigningSecret}};
///
/// let keys = Arc::new(KeyRing::new(SigningSecret::generate("k1")));
/// let codec = TokenCodec::new(keys, "warden", Duration::from_secs(300));
///
/// let token = codec.issue("a@x.com", "admin")?;
/// let claims = codec.verify(token.as_str())?;
/// assert_eq!(claims.identity(), "a@x.com");
/// assert_eq!(claims.role, "admin");
/// # Ok::<(), warden_authn::AuthError>(())
/// ```
#[derive(Clone, Debug)]
pub struct TokenCodec {
    keys: Arc<KeyRing>,
    issuer: String,
    ttl: Duration,
}

impl TokenCodec {
    /// Creates a codec signing with `keys`, stamping `issuer`, and embedding
    /// an expiry `ttl` after issue.
    #[must_use]
    pub fn new(keys: Arc<KeyRing>, issuer: impl Into<String>, ttl: Duration) -> Self {
        Self { keys, issuer: issuer.into(), ttl }
    }

    /// The key ring backing this codec.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyRing> {
        &self.keys
    }

    /// Issues a token for `identity` with `role`, expiring `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if the TTL overflows or encoding fails.
    #[tracing::instrument(skip(self))]
    pub fn issue(&self, identity: &str, role: &str) -> Result<SessionToken> {
        let now = Utc::now();
        let ttl = TimeDelta::from_std(self.ttl)
            .map_err(|e| AuthError::internal(format!("token ttl out of range: {e}")))?;

        let claims = SessionClaims {
            iss: self.issuer.clone(),
            sub: identity.to_owned(),
            role: role.to_owned(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: new_jti(),
        };
        self.sign(&claims)
    }

    /// Signs arbitrary claims with the active key.
    ///
    /// [`issue`](Self::issue) is the normal entry point; this exists for
    /// callers that need full control over the claims, such as minting an
    /// already-expired token in a test.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if encoding fails.
    pub fn sign(&self, claims: &SessionClaims) -> Result<SessionToken> {
        let (kid, key) = self.keys.signing_key();
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid);

        encode(&header, claims, &key)
            .map(SessionToken)
            .map_err(|e| AuthError::internal(format!("failed to encode token: {e}")))
    }

    /// Verifies signature, issuer and expiry, returning the claims.
    ///
    /// A token whose `exp` equals the current second is still accepted; one
    /// second later it is not.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidSignature`] if the signature does not match
    /// - [`AuthError::TokenExpired`] if the embedded expiry has passed
    /// - [`AuthError::Malformed`] if the token or a required claim cannot be decoded
    /// - [`AuthError::IdentityMissing`] if the subject is absent or empty
    /// - [`AuthError::UnknownKey`] / [`AuthError::UnsupportedAlgorithm`] for header problems
    #[tracing::instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = self.validation();
        validation.validate_exp = true;
        validation.required_spec_claims = HashSet::from(["exp".to_owned()]);

        self.decode(token, &validation)?.into_claims()
    }

    /// Verifies signature and issuer without enforcing expiry.
    ///
    /// Logout uses this so that a naturally-expired but well-signed token can
    /// still be recorded as revoked.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify), minus [`AuthError::TokenExpired`].
    #[tracing::instrument(skip_all)]
    pub fn inspect(&self, token: &str) -> Result<InspectedToken> {
        let raw = self.decode(token, &self.validation())?;
        Ok(InspectedToken {
            identity: raw.identity()?,
            expires_at: raw.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        })
    }

    /// Reads the embedded expiry of a well-signed token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] if the expiry claim is absent or
    /// unreadable, or any error from [`inspect`](Self::inspect).
    pub fn expires_at(&self, token: &str) -> Result<DateTime<Utc>> {
        let raw = self.decode(token, &self.validation())?;
        raw.exp
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .ok_or_else(|| AuthError::malformed("missing claim: exp"))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation.set_issuer(&[self.issuer.as_str()]);
        validation
    }

    fn decode(&self, token: &str, validation: &Validation) -> Result<RawClaims> {
        if token.is_empty() {
            return Err(AuthError::malformed("empty token"));
        }

        let header = decode_header(token)
            .map_err(|e| AuthError::malformed(format!("failed to decode header: {e}")))?;
        validate_algorithm(&format!("{:?}", header.alg))?;

        let kid = header.kid.ok_or_else(|| AuthError::malformed("header missing 'kid' field"))?;
        validate_kid(&kid)?;

        let key = self.keys.decoding_key(&kid)?;
        let data = decode::<RawClaims>(token, &key, validation)?;
        Ok(data.claims)
    }
}

fn new_jti() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
