//! Concurrent lifecycle operations against shared stores.
#![allow(clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use warden_authn::{
    ErrorKind, SessionConfig, SessionLifecycleService,
    keys::{KeyRing, SigningSecret},
    password::hash_password,
    tracker::active_token_key,
};
use warden_storage::{
    MemoryBackend, StorageBackend,
    auth::{MemoryDirectoryStore, MemoryRevokedTokenStore, RevokedTokenStore, UserRecord},
};

fn service(
    cache: MemoryBackend,
    revocations: MemoryRevokedTokenStore,
) -> Arc<SessionLifecycleService> {
    let directory = MemoryDirectoryStore::new();
    directory
        .insert(UserRecord {
            identity: "carol@example.com".to_owned(),
            password_hash: hash_password("pw").expect("hash"),
            role: "user".to_owned(),
        })
        .expect("insert user");

    let service = SessionLifecycleService::builder()
        .cache(Arc::new(cache))
        .revocations(Arc::new(revocations))
        .directory(Arc::new(directory))
        .keys(Arc::new(KeyRing::new(SigningSecret::generate("k1"))))
        .config(
            SessionConfig::builder()
                .store_timeout(Duration::from_secs(10))
                .throttle_max_attempts(16)
                .build(),
        )
        .build()
        .expect("valid config");
    Arc::new(service)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins_revoke_the_prior_session() {
    let cache = MemoryBackend::new();
    let revocations = MemoryRevokedTokenStore::new();
    let service = service(cache.clone(), revocations.clone());

    let prior = service
        .login(&service.context(), "carol@example.com", "pw")
        .await
        .expect("initial login");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.login(&service.context(), "carol@example.com", "pw").await
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.expect("task panicked").expect("login"));
    }

    assert!(revocations.contains(prior.as_str()).await.expect("ledger lookup"));
    let ctx = service.context();
    let err = service.authorize(&ctx, prior.as_str(), "user").await.expect_err("prior revoked");
    assert_eq!(err.kind(), ErrorKind::AlreadyRevoked);

    // The marker is never cleared here, so every login found a prior to
    // revoke. Concurrent logins may have read the same marker, which leaves
    // fewer distinct ledger entries than supersessions.
    let superseded = service.metrics().snapshot().superseded;
    assert_eq!(superseded, 4, "every login must revoke the marker it read");
    let entries = revocations.len() as u64;
    assert!((1..=superseded).contains(&entries), "{entries} entries for {superseded} supersessions");

    // Every ledger entry is a token this test issued, and every issued token
    // is either in the ledger or still usable.
    let mut in_ledger = u64::from(revocations.contains(prior.as_str()).await.expect("lookup"));
    let mut valid = Vec::new();
    for token in &tokens {
        if revocations.contains(token.as_str()).await.expect("ledger lookup") {
            in_ledger += 1;
            let err = service.authorize(&ctx, token.as_str(), "user").await.expect_err("revoked");
            assert_eq!(err.kind(), ErrorKind::AlreadyRevoked);
        } else {
            service.authorize(&ctx, token.as_str(), "user").await.expect("unrevoked token valid");
            valid.push(token.as_str());
        }
    }
    assert_eq!(in_ledger, entries, "ledger holds a token no login issued");

    // The current marker names a live session that the next login will revoke.
    let marker = cache
        .get(&active_token_key("carol@example.com"))
        .await
        .expect("marker read")
        .expect("marker present");
    let marker = std::str::from_utf8(&marker).expect("utf-8 marker");
    assert!(valid.contains(&marker), "marker must name an unrevoked token");

    let next = service.login(&ctx, "carol@example.com", "pw").await.expect("follow-up login");
    assert!(revocations.contains(marker).await.expect("ledger lookup"));
    service.authorize(&ctx, next.as_str(), "user").await.expect("newest token valid");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logouts_revoke_exactly_once() {
    let revocations = MemoryRevokedTokenStore::new();
    let service = service(MemoryBackend::new(), revocations.clone());
    let token = service.login(&service.context(), "carol@example.com", "pw").await.expect("login");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        let token = token.as_str().to_owned();
        handles.push(tokio::spawn(async move { service.logout(&service.context(), &token).await }));
    }

    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(()) => {},
            Err(err) => assert_eq!(err.kind(), ErrorKind::AlreadyRevoked),
        }
    }

    assert_eq!(revocations.len(), 1);
    let err = service
        .authorize(&service.context(), token.as_str(), "user")
        .await
        .expect_err("revoked");
    assert_eq!(err.kind(), ErrorKind::AlreadyRevoked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_authorize_calls_agree() {
    let service = service(MemoryBackend::new(), MemoryRevokedTokenStore::new());
    let token = service.login(&service.context(), "carol@example.com", "pw").await.expect("login");

    let mut handles = Vec::new();
    for _ in 0..32 {
        let service = Arc::clone(&service);
        let token = token.as_str().to_owned();
        handles.push(tokio::spawn(async move {
            service.authorize(&service.context(), &token, "user").await
        }));
    }

    for handle in handles {
        let principal = handle.await.expect("task panicked").expect("authorize");
        assert_eq!(principal.identity, "carol@example.com");
    }
    assert_eq!(service.metrics().snapshot().authorized, 32);
}
