//! Integration test verifying that lifecycle operations produce spans and
//! that bearer secrets stay out of recorded span fields.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};
use warden_authn::{
    SessionLifecycleService,
    keys::{KeyRing, SigningSecret},
    password::hash_password,
};
use warden_storage::{
    MemoryBackend,
    auth::{MemoryDirectoryStore, MemoryRevokedTokenStore, UserRecord},
};

// ---------------------------------------------------------------------------
// Collecting layer: records span names and their rendered fields
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<(String, String)>>>,
}

struct FieldRecorder<'a>(&'a mut String);

impl Visit for FieldRecorder<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.push_str(&format!("{}={:?} ", field.name(), value));
    }
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut fields = String::new();
            attrs.record(&mut FieldRecorder(&mut fields));
            self.spans.lock().expect("lock poisoned").push((span.name().to_owned(), fields));
        }
    }
}

fn service() -> SessionLifecycleService {
    let directory = MemoryDirectoryStore::new();
    directory
        .insert(UserRecord {
            identity: "erin@example.com".to_owned(),
            password_hash: hash_password("s3cret-password").expect("hash"),
            role: "user".to_owned(),
        })
        .expect("insert user");

    SessionLifecycleService::builder()
        .cache(Arc::new(MemoryBackend::new()))
        .revocations(Arc::new(MemoryRevokedTokenStore::new()))
        .directory(Arc::new(directory))
        .keys(Arc::new(KeyRing::new(SigningSecret::generate("k1"))))
        .build()
        .expect("valid config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lifecycle_operations_create_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);
    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let service = service();
    let ctx = service.context();
    let token = service.login(&ctx, "erin@example.com", "s3cret-password").await.expect("login");
    service.authorize(&ctx, token.as_str(), "user").await.expect("authorize");
    service.logout(&ctx, token.as_str()).await.expect("logout");

    let recorded = spans.lock().expect("lock poisoned");
    for name in ["login", "check", "supersede_and_get", "issue", "set", "authorize", "verify", "logout", "add"]
    {
        assert!(
            recorded.iter().any(|(span, _)| span == name),
            "expected a '{name}' span, got: {recorded:?}"
        );
    }

    for (span, fields) in recorded.iter() {
        assert!(!fields.contains("s3cret-password"), "password leaked into '{span}' span");
        assert!(!fields.contains(token.as_str()), "token leaked into '{span}' span");
    }

    let login = recorded.iter().find(|(span, _)| span == "login").expect("login span");
    assert!(login.1.contains("erin@example.com"), "login span should carry the identity");
}
