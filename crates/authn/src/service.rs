//! Session lifecycle orchestration.
//!
//! [`SessionLifecycleService`] ties the token codec, revocation ledger,
//! active-session tracker and login throttle together behind the three entry
//! points a request layer calls: [`login`](SessionLifecycleService::login),
//! [`logout`](SessionLifecycleService::logout) and
//! [`authorize`](SessionLifecycleService::authorize).
//!
//! # Per-identity states
//!
//! ```text
//!              login                 login (again)
//! NoSession ─────────► Active ─────────────────────► Superseded ──┐
//!     ▲                  │                                        │
//!     │                  │ logout                                 │
//!     │                  ▼                                        │
//!     └─────────────── Revoked ◄──────────────────────────────────┘
//!        ledger entry expires      (both end in the ledger)
//! ```
//!
//! # Failure policy
//!
//! Store calls needed for correctness (throttle counter, directory lookup,
//! prior-session read, ledger insert and lookup) abort the operation and
//! surface as [`ErrorKind::Transient`](crate::ErrorKind::Transient) or
//! [`ErrorKind::Internal`](crate::ErrorKind::Internal). Updating or clearing
//! the active-session marker is best-effort: a failure is logged and counted,
//! and the primary operation still succeeds.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use warden_storage::{
    StorageBackend,
    auth::{DirectoryStore, RevocationReason, RevokedTokenStore},
};

use crate::{
    config::{ConfigError, SessionConfig},
    context::RequestContext,
    error::{AuthError, Result},
    keys::KeyRing,
    ledger::RevocationLedger,
    metrics::SessionMetrics,
    password::verify_password_blocking,
    throttle::LoginThrottle,
    token::{SessionToken, TokenCodec},
    tracker::ActiveSessionTracker,
};

/// The caller an authorized token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Identity from the token subject.
    pub identity: String,
    /// Role granted at login.
    pub role: String,
}

/// Issues, supersedes, revokes and authorizes session tokens.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use warden_authn::{
///     SessionLifecycleService,
///     keys::{KeyRing, SigningSecret},
///     password::hash_password,
/// };
/// use warden_storage::{
///     MemoryBackend,
///     auth::{MemoryDirectoryStore, MemoryRevokedTokenStore, UserRecord},
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let directory = MemoryDirectoryStore::new();
/// directory.insert(UserRecord {
///     identity: "a@x.com".into(),
///     password_hash: hash_password("hunter2")?,
///     role: "admin".into(),
/// })?;
///
/// let service = SessionLifecycleService::builder()
///     .cache(Arc::new(MemoryBackend::new()))
///     .revocations(Arc::new(MemoryRevokedTokenStore::new()))
///     .directory(Arc::new(directory))
///     .keys(Arc::new(KeyRing::new(SigningSecret::generate("k1"))))
///     .build()?;
///
/// let ctx = service.context();
/// let token = service.login(&ctx, "a@x.com", "hunter2").await?;
/// let principal = service.authorize(&ctx, token.as_str(), "admin").await?;
/// assert_eq!(principal.identity, "a@x.com");
///
/// service.logout(&ctx, token.as_str()).await?;
/// assert!(service.authorize(&ctx, token.as_str(), "admin").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct SessionLifecycleService {
    cache: Arc<dyn StorageBackend>,
    directory: Arc<dyn DirectoryStore>,
    codec: TokenCodec,
    ledger: Arc<RevocationLedger>,
    tracker: ActiveSessionTracker,
    throttle: LoginThrottle,
    config: SessionConfig,
    metrics: SessionMetrics,
}

#[bon::bon]
impl SessionLifecycleService {
    /// Creates a service over its collaborators.
    ///
    /// # Arguments
    ///
    /// * `cache` - Fast expiring cache for throttle counters and active-session markers
    /// * `revocations` - Durable revocation ledger store
    /// * `directory` - User directory for credential checks
    /// * `keys` - Signing and verification keys
    ///
    /// # Optional Fields
    ///
    /// * `config` - Horizons and limits (default: [`SessionConfig::default`])
    /// * `metrics` - Counters to record into (default: fresh counters)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    #[builder]
    pub fn new(
        cache: Arc<dyn StorageBackend>,
        revocations: Arc<dyn RevokedTokenStore>,
        directory: Arc<dyn DirectoryStore>,
        keys: Arc<KeyRing>,
        #[builder(default)] config: SessionConfig,
        #[builder(default)] metrics: SessionMetrics,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            codec: TokenCodec::new(keys, config.issuer.clone(), config.token_ttl),
            ledger: Arc::new(RevocationLedger::new(revocations, config.revocation_cache_capacity)),
            tracker: ActiveSessionTracker::new(Arc::clone(&cache)),
            throttle: LoginThrottle::new(
                Arc::clone(&cache),
                config.throttle_window,
                config.throttle_max_attempts,
            ),
            cache,
            directory,
            config,
            metrics,
        })
    }

    /// A request context bounded by the configured store timeout.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        RequestContext::with_timeout(self.config.store_timeout)
    }

    /// Authenticates `identity` and issues a new session token.
    ///
    /// Any session previously marked active for the identity is revoked
    /// before the new token is issued.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RateLimited`] once the throttle window's limit is exceeded
    /// - [`AuthError::Unauthenticated`] for an unknown identity or wrong password
    /// - [`AuthError::Storage`] if the throttle, directory, prior-session read or
    ///   revocation insert fails
    #[tracing::instrument(skip(self, ctx, password))]
    pub async fn login(
        &self,
        ctx: &RequestContext,
        identity: &str,
        password: &str,
    ) -> Result<SessionToken> {
        if let Err(err) = self.throttle.check(ctx, identity).await {
            if matches!(err, AuthError::RateLimited { .. }) {
                self.metrics.record_rate_limited();
            }
            return Err(err);
        }

        let Some(record) = ctx.run(self.directory.find_by_identity(identity)).await? else {
            tracing::debug!("unknown identity");
            self.metrics.record_failed_login();
            return Err(AuthError::Unauthenticated);
        };
        if !verify_password_blocking(password, &record.password_hash).await? {
            tracing::debug!("password mismatch");
            self.metrics.record_failed_login();
            return Err(AuthError::Unauthenticated);
        }

        if let Some(prior) = self.tracker.supersede_and_get(ctx, identity).await? {
            let retain_until = self.retention_for(&prior);
            ctx.run(self.ledger.add(&prior, retain_until, RevocationReason::Superseded)).await?;
            self.metrics.record_superseded();
            tracing::info!(%retain_until, "superseded prior session");
        }

        let token = self.codec.issue(identity, &record.role)?;

        if let Err(error) = self.tracker.set(ctx, identity, &token, self.config.session_ttl).await {
            tracing::warn!(
                identity,
                %error,
                "failed to record active session, supersession tracking will miss this token"
            );
            self.metrics.record_tracker_failure();
        }

        self.metrics.record_login();
        Ok(token)
    }

    /// Revokes `token`.
    ///
    /// Expiry is not checked: a naturally expired but well-signed token is
    /// still recorded as revoked.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingToken`] for an empty token
    /// - [`AuthError::AlreadyRevoked`] if the token is already in the ledger
    /// - [`AuthError::InvalidToken`] if the signature or structure is bad
    /// - [`AuthError::IdentityMissing`] if the token has no subject
    /// - [`AuthError::Storage`] if the ledger lookup or insert fails
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self, ctx: &RequestContext, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if ctx.run(self.ledger.contains(token)).await? {
            return Err(AuthError::AlreadyRevoked);
        }

        let inspected = self.codec.inspect(token).map_err(|err| match err {
            AuthError::IdentityMissing => AuthError::IdentityMissing,
            other => AuthError::invalid_token(other.to_string()),
        })?;

        let retain_until = self.codec.expires_at(token).unwrap_or_else(|error| {
            tracing::debug!(%error, "token expiry unreadable, using fallback horizon");
            self.fallback_horizon()
        });
        ctx.run(self.ledger.add(token, retain_until, RevocationReason::Logout)).await?;

        if let Err(error) = self.tracker.clear(ctx, &inspected.identity).await {
            tracing::warn!(identity = %inspected.identity, %error, "failed to clear active session");
            self.metrics.record_tracker_failure();
        }

        tracing::info!(identity = %inspected.identity, "session logged out");
        self.metrics.record_logout();
        Ok(())
    }

    /// Verifies `token` for use by an operation requiring `required_role`.
    ///
    /// The revocation ledger is always consulted; a ledger failure is an
    /// error, never a pass.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingToken`] for an empty token
    /// - [`AuthError::AlreadyRevoked`] if the token has been revoked
    /// - [`AuthError::TokenExpired`], [`AuthError::InvalidSignature`], [`AuthError::Malformed`]
    ///   and the other codec errors
    /// - [`AuthError::IdentityMissing`] if the token has no subject
    /// - [`AuthError::Forbidden`] if the role does not match
    /// - [`AuthError::Storage`] if the ledger lookup fails
    #[tracing::instrument(skip(self, ctx, token))]
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        token: &str,
        required_role: &str,
    ) -> Result<Principal> {
        let result = self.authorize_inner(ctx, token, required_role).await;
        self.metrics.record_authorize(result.is_ok());
        if let Err(error) = &result {
            tracing::debug!(%error, "authorization rejected");
        }
        result
    }

    async fn authorize_inner(
        &self,
        ctx: &RequestContext,
        token: &str,
        required_role: &str,
    ) -> Result<Principal> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        if ctx.run(self.ledger.contains(token)).await? {
            return Err(AuthError::AlreadyRevoked);
        }

        let claims = self.codec.verify(token)?;
        if claims.role != required_role {
            return Err(AuthError::forbidden(required_role, claims.role));
        }

        Ok(Principal { identity: claims.sub, role: claims.role })
    }

    /// Checks that the fast expiring cache is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if the cache is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        self.cache.health_check().await?;
        Ok(())
    }

    /// Token codec, for callers that verify tokens without the ledger.
    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Revocation ledger, e.g. for spawning its purge task.
    #[must_use]
    pub fn ledger(&self) -> &Arc<RevocationLedger> {
        &self.ledger
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Lifecycle counters.
    #[must_use]
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// How long a superseded token's ledger entry must be kept: until the
    /// token would have expired on its own.
    fn retention_for(&self, token: &str) -> DateTime<Utc> {
        self.codec.expires_at(token).unwrap_or_else(|error| {
            tracing::debug!(%error, "prior token expiry unreadable, using fallback horizon");
            self.fallback_horizon()
        })
    }

    fn fallback_horizon(&self) -> DateTime<Utc> {
        let ttl = TimeDelta::from_std(self.config.revocation_fallback_ttl).unwrap_or(TimeDelta::MAX);
        Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl std::fmt::Debug for SessionLifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycleService")
            .field("config", &self.config)
            .field("throttle", &self.throttle)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use warden_storage::{
        auth::{MemoryDirectoryStore, UserRecord},
        testutil::{CacheOp, FlakyBackend, FlakyRevokedTokenStore, LedgerOp},
    };

    use super::*;
    use crate::{ErrorKind, keys::SigningSecret, password::hash_password, token::SessionClaims};

    struct Harness {
        service: SessionLifecycleService,
        cache: FlakyBackend,
        ledger: FlakyRevokedTokenStore,
    }

    fn harness() -> Harness {
        let directory = MemoryDirectoryStore::new();
        for (identity, role) in [("a@x.com", "admin"), ("b@x.com", "user")] {
            directory
                .insert(UserRecord {
                    identity: identity.into(),
                    password_hash: hash_password("pw").unwrap(),
                    role: role.into(),
                })
                .unwrap();
        }

        let cache = FlakyBackend::new();
        let ledger = FlakyRevokedTokenStore::new();
        let service = SessionLifecycleService::builder()
            .cache(Arc::new(cache.clone()))
            .revocations(Arc::new(ledger.clone()))
            .directory(Arc::new(directory))
            .keys(Arc::new(KeyRing::new(SigningSecret::generate("k1"))))
            .build()
            .unwrap();

        Harness { service, cache, ledger }
    }

    #[tokio::test]
    async fn test_login_then_authorize() {
        let h = harness();
        let ctx = h.service.context();
        let token = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();

        let principal = h.service.authorize(&ctx, token.as_str(), "admin").await.unwrap();
        assert_eq!(principal, Principal { identity: "a@x.com".into(), role: "admin".into() });
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let h = harness();
        let ctx = h.service.context();

        let err = h.service.login(&ctx, "a@x.com", "wrong").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        let err = h.service.login(&ctx, "nobody@x.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);

        assert_eq!(h.service.metrics().snapshot().failed_logins, 2);
    }

    #[tokio::test]
    async fn test_failed_attempts_count_toward_throttle() {
        let h = harness();
        let ctx = h.service.context();
        for _ in 0..5 {
            let _ = h.service.login(&ctx, "a@x.com", "wrong").await;
        }

        let err = h.service.login(&ctx, "a@x.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(h.service.metrics().snapshot().rate_limited, 1);
    }

    #[tokio::test]
    async fn test_second_login_revokes_first() {
        let h = harness();
        let ctx = h.service.context();
        let t1 = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        let t2 = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();

        let err = h.service.authorize(&ctx, t1.as_str(), "admin").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRevoked);
        assert!(h.service.authorize(&ctx, t2.as_str(), "admin").await.is_ok());

        let entry = h.ledger.inner().get(t1.as_str()).await.unwrap().unwrap();
        assert_eq!(entry.reason, RevocationReason::Superseded);
        // Retained until the superseded token's own expiry.
        let claims = h.service.codec().inspect(t1.as_str()).unwrap();
        assert_eq!(Some(entry.expires_at), claims.expires_at);
    }

    #[tokio::test]
    async fn test_logout_twice() {
        let h = harness();
        let ctx = h.service.context();
        let token = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();

        h.service.logout(&ctx, token.as_str()).await.unwrap();
        let err = h.service.logout(&ctx, token.as_str()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyRevoked);
    }

    #[tokio::test]
    async fn test_logout_clears_active_marker() {
        let h = harness();
        let ctx = h.service.context();
        let token = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        h.service.logout(&ctx, token.as_str()).await.unwrap();

        let key = crate::tracker::active_token_key("a@x.com");
        assert!(h.cache.inner().get(&key).await.unwrap().is_none());

        // The next login finds no prior session to supersede.
        h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        assert_eq!(h.service.metrics().snapshot().superseded, 0);
    }

    #[tokio::test]
    async fn test_logout_rejects_empty_and_garbage() {
        let h = harness();
        let ctx = h.service.context();
        assert_eq!(h.service.logout(&ctx, "").await.unwrap_err().kind(), ErrorKind::MissingToken);
        assert_eq!(
            h.service.logout(&ctx, "not-a-token").await.unwrap_err().kind(),
            ErrorKind::InvalidToken
        );
    }

    #[tokio::test]
    async fn test_logout_accepts_expired_token() {
        let h = harness();
        let ctx = h.service.context();
        let now = Utc::now().timestamp();
        let expired = h
            .service
            .codec()
            .sign(&SessionClaims {
                iss: "warden".into(),
                sub: "a@x.com".into(),
                role: "admin".into(),
                iat: now - 600,
                exp: now - 300,
                jti: "expired".into(),
            })
            .unwrap();

        assert_eq!(
            h.service.authorize(&ctx, expired.as_str(), "admin").await.unwrap_err().kind(),
            ErrorKind::Expired
        );
        h.service.logout(&ctx, expired.as_str()).await.unwrap();
        assert!(h.ledger.inner().get(expired.as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_authorize_wrong_role() {
        let h = harness();
        let ctx = h.service.context();
        let token = h.service.login(&ctx, "b@x.com", "pw").await.unwrap();

        let err = h.service.authorize(&ctx, token.as_str(), "admin").await.unwrap_err();
        assert!(matches!(err, AuthError::Forbidden { ref required, ref actual }
            if required == "admin" && actual == "user"));
    }

    #[tokio::test]
    async fn test_tracker_failure_does_not_fail_login() {
        let h = harness();
        let ctx = h.service.context();
        h.cache.fail(CacheOp::SetWithTtl);

        let token = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        assert!(h.service.authorize(&ctx, token.as_str(), "admin").await.is_ok());
        assert_eq!(h.service.metrics().snapshot().tracker_failures, 1);
    }

    #[tokio::test]
    async fn test_tracker_clear_failure_does_not_fail_logout() {
        let h = harness();
        let ctx = h.service.context();
        let token = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        h.cache.fail(CacheOp::Delete);

        h.service.logout(&ctx, token.as_str()).await.unwrap();
        assert_eq!(
            h.service.authorize(&ctx, token.as_str(), "admin").await.unwrap_err().kind(),
            ErrorKind::AlreadyRevoked
        );
    }

    #[tokio::test]
    async fn test_prior_session_read_failure_fails_login() {
        let h = harness();
        let ctx = h.service.context();
        h.cache.fail(CacheOp::Get);

        let err = h.service.login(&ctx, "a@x.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_supersession_insert_failure_fails_login() {
        let h = harness();
        let ctx = h.service.context();
        let t1 = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        h.ledger.fail(LedgerOp::Insert);

        let err = h.service.login(&ctx, "a@x.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);

        h.ledger.heal(LedgerOp::Insert);
        assert!(h.service.authorize(&ctx, t1.as_str(), "admin").await.is_ok());
    }

    #[tokio::test]
    async fn test_ledger_lookup_failure_never_authorizes() {
        let h = harness();
        let ctx = h.service.context();
        let token = h.service.login(&ctx, "a@x.com", "pw").await.unwrap();
        h.ledger.fail(LedgerOp::Lookup);

        let err = h.service.authorize(&ctx, token.as_str(), "admin").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        let err = h.service.logout(&ctx, token.as_str()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ledger_times_out() {
        let h = harness();
        let token = h.service.login(&h.service.context(), "a@x.com", "pw").await.unwrap();
        h.ledger.set_delay(Some(Duration::from_secs(30)));

        let ctx = RequestContext::with_timeout(Duration::from_millis(500));
        let err = h.service.authorize(&ctx, token.as_str(), "admin").await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(warden_storage::StorageError::Timeout)));
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_config() {
        let result = SessionLifecycleService::builder()
            .cache(Arc::new(FlakyBackend::new()))
            .revocations(Arc::new(FlakyRevokedTokenStore::new()))
            .directory(Arc::new(MemoryDirectoryStore::new()))
            .keys(Arc::new(KeyRing::new(SigningSecret::generate("k1"))))
            .config(SessionConfig::builder().throttle_max_attempts(0).build())
            .build();
        assert!(matches!(result, Err(ConfigError::Zero { field: "throttle_max_attempts" })));
    }

    #[tokio::test]
    async fn test_health_check() {
        let h = harness();
        h.service.health_check().await.unwrap();
    }
}
