//! Token header validation.
//!
//! Session tokens are signed with a process-held HMAC key, so exactly one
//! algorithm is accepted. Headers are checked before any key lookup so an
//! attacker-chosen `alg` or `kid` never reaches the key ring.

use crate::error::AuthError;

/// Algorithms that are never accepted, whatever the key ring holds.
///
/// - `none`: no signature at all
/// - `HS384`, `HS512`: valid HMAC variants, but tokens are only ever issued with HS256, so
///   accepting them would widen the surface for no benefit
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS384", "HS512"];

/// Accepted token algorithms.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["HS256"];

/// Maximum length of a key ID in a token header.
pub const MAX_KID_LEN: usize = 128;

/// Validates a token header algorithm.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if the algorithm is forbidden
/// or not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use warden_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("HS256").is_ok());
/// assert!(validate_algorithm("none").is_err());
/// assert!(validate_algorithm("RS256").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not allowed for session tokens"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not in accepted list (only HS256 is supported)"
        )));
    }

    Ok(())
}

/// Validates the shape of a `kid` header value.
///
/// Key IDs are short printable identifiers: ASCII alphanumerics, `-`, `_`
/// and `.`, at most [`MAX_KID_LEN`] characters.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] for empty, oversized or
/// out-of-alphabet key IDs.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::invalid_token("kid is empty"));
    }
    if kid.len() > MAX_KID_LEN {
        return Err(AuthError::invalid_token(format!(
            "kid exceeds {MAX_KID_LEN} characters"
        )));
    }
    if !kid.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
        return Err(AuthError::invalid_token("kid contains invalid characters"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_validate_algorithm_hs256_accepted() {
        assert!(validate_algorithm("HS256").is_ok());
    }

    #[test]
    fn test_forbidden_algorithms_rejected() {
        for alg in FORBIDDEN_ALGORITHMS {
            let result = validate_algorithm(alg);
            assert!(
                matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("not allowed")),
                "expected rejection for forbidden algorithm '{alg}'"
            );
        }
    }

    #[rstest]
    #[case("RS256")]
    #[case("EdDSA")]
    #[case("ES256")]
    #[case("hs256")]
    fn test_unlisted_algorithms_rejected(#[case] alg: &str) {
        let result = validate_algorithm(alg);
        assert!(
            matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("not in accepted list"))
        );
    }

    #[rstest]
    #[case("k1")]
    #[case("2026-10.primary")]
    #[case("key_A-b.c")]
    fn test_validate_kid_accepts(#[case] kid: &str) {
        assert!(validate_kid(kid).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("../../etc/passwd")]
    #[case("key with space")]
    #[case("kid\0null")]
    fn test_validate_kid_rejects(#[case] kid: &str) {
        assert!(matches!(validate_kid(kid), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_kid_rejects_oversized() {
        let kid = "a".repeat(MAX_KID_LEN + 1);
        assert!(validate_kid(&kid).is_err());
        assert!(validate_kid(&kid[..MAX_KID_LEN]).is_ok());
    }
}
