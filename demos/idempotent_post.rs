//! Idempotent POST Example
//!
//! Shows how a write survives a flaky upstream without being applied twice:
//! - the first attempt fails with 503, the retry succeeds under the same key
//! - a later call with the same key and body is replayed from the local store
//! - reusing the key with a different body is rejected as a conflict
//!
//! The upstream is an in-process fake, so no network access is needed.
//!
//! Usage:
//!   cargo run --example idempotent_post

use resilient_http::client::IDEMPOTENCY_KEY_HEADER;
use resilient_http::{
    Error, HttpClient, HttpRequest, HttpResponse, ManualClock, Transport, TransportError,
    WriteOptions,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Fails the first attempt for every new key, then creates an order.
#[derive(Default)]
struct FlakyOrders {
    seen: Mutex<HashSet<String>>,
    created: Mutex<u32>,
}

impl Transport for FlakyOrders {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = request
            .headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| TransportError::Other("missing idempotency key".into()))?
            .to_string();

        let mut seen = self
            .seen
            .lock()
            .map_err(|_| TransportError::Other("poisoned".into()))?;
        if seen.insert(key) {
            return Ok(HttpResponse::new(503).with_body("upstream warming up"));
        }

        let mut created = self
            .created
            .lock()
            .map_err(|_| TransportError::Other("poisoned".into()))?;
        *created += 1;
        let body = json!({ "order_id": *created, "status": "created" });
        Ok(HttpResponse::new(201).with_body(body.to_string()))
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_http=debug".into()),
        )
        .init();

    println!("=== Resilient HTTP: Idempotent POST Demo ===\n");

    let dir = tempfile::tempdir()?;
    let upstream = Arc::new(FlakyOrders::default());
    let clock = Arc::new(ManualClock::default());

    let client = HttpClient::builder("https://shop.example.com/api")
        .transport(upstream.clone())
        .clock(clock.clone())
        .store_path(dir.path().join("idempotency_cache.json"))
        .on_retry(|n| {
            println!(
                "  retry #{} for {} {} in {:?} ({})",
                n.attempt, n.method, n.url, n.sleep, n.reason
            )
        })
        .build()?;

    let order = json!({ "sku": "A-1", "qty": 2 });

    println!("--- First submission ---");
    let first = client.post_with("/orders", &order, &WriteOptions::new())?;
    println!("  key:      {}", first.idempotency_key);
    println!("  response: {}", first.body);
    println!("  replayed: {}\n", first.replayed);

    println!("--- Same key, same body ---");
    let opts = WriteOptions::new().idempotency_key(first.idempotency_key.clone());
    let second = client.post_with("/orders", &order, &opts)?;
    println!("  response: {}", second.body);
    println!("  replayed: {}\n", second.replayed);

    println!("--- Same key, different body ---");
    match client.post_with("/orders", &json!({ "sku": "A-1", "qty": 3 }), &opts) {
        Err(Error::IdempotencyConflict { key, .. }) => println!("  rejected: conflict on {}\n", key),
        other => anyhow::bail!("expected a conflict, got {:?}", other),
    }

    let created = *upstream
        .created
        .lock()
        .map_err(|_| anyhow::anyhow!("poisoned"))?;
    println!("Orders actually created upstream: {}", created);
    println!("Virtual time spent backing off:   {:?}", clock.total_slept());
    Ok(())
}
