//! Integration test verifying that `#[instrument]` annotations produce
//! spans for the in-memory stores.

#![allow(clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};
use warden_storage::{
    MemoryBackend, StorageBackend,
    auth::{MemoryRevokedTokenStore, RevocationReason, RevokedToken, RevokedTokenStore},
};

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn collect() -> (Arc<Mutex<Vec<String>>>, tracing::subscriber::DefaultGuard) {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    (spans, tracing::subscriber::set_default(subscriber))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_backend_operations_create_spans() {
    let (spans, _guard) = collect();

    let backend = MemoryBackend::new();
    backend
        .set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::from_secs(5))
        .await
        .expect("set_with_ttl");
    let _ = backend.get(b"k").await;
    let _ = backend.increment(b"n").await;
    let _ = backend.expire(b"n", Duration::from_secs(5)).await;
    let _ = backend.delete(b"k").await;

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["set_with_ttl", "get", "increment", "expire", "delete"] {
        assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
    }
}

#[tokio::test]
async fn memory_backend_health_check_creates_span() {
    let (spans, _guard) = collect();

    let backend = MemoryBackend::new();
    let _ = backend.health_check().await;

    let recorded = spans.lock().expect("lock poisoned");
    assert!(
        recorded.iter().any(|s| s == "health_check"),
        "expected a 'health_check' span, got: {recorded:?}"
    );
}

#[tokio::test]
async fn revoked_token_store_operations_create_spans() {
    let (spans, _guard) = collect();

    let store = MemoryRevokedTokenStore::new();
    let entry = RevokedToken::builder()
        .token("t1".to_owned())
        .expires_at(Utc::now())
        .reason(RevocationReason::Logout)
        .build();
    store.insert(&entry).await.expect("insert");
    let _ = store.contains("t1").await;
    let _ = store.purge_expired(Utc::now()).await;

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["insert", "contains", "purge_expired"] {
        assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
    }
}
