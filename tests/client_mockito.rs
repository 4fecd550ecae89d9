//! HttpClient over the real reqwest transport against a local mockito server.
//!
//! Backoff and 429 waits still go through a ManualClock, so nothing here sleeps.

mod common;

use common::fixed_policy;
use mockito::{Matcher, Server};
use resilient_http::{Error, HttpClient, ManualClock, ReadOptions, TransportError, WriteOptions};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn client_for(url: &str, clock: &Arc<ManualClock>, dir: &tempfile::TempDir) -> HttpClient {
    HttpClient::builder(url)
        .clock(clock.clone())
        .timeout(Duration::from_secs(5))
        .store_path(dir.path().join("idem.json"))
        .read_policy(fixed_policy(2))
        .write_policy(fixed_policy(2))
        .build()
        .unwrap()
}

#[test]
fn get_success_returns_body_and_headers() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("x-request-id", "abc")
        .with_body(r#"{"status":"up"}"#)
        .expect(1)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);

    let resp = client.get("/health").unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("X-Request-Id"), Some("abc"));
    let v: serde_json::Value = resp.json().unwrap();
    assert_eq!(v, json!({"status": "up"}));
    mock.assert();
}

#[test]
fn get_sends_query_parameters() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/orders")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("status".into(), "open".into()),
        ]))
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);

    let opts = ReadOptions::new().query("page", "2").query("status", "open");
    client.get_with("/orders", &opts).unwrap();
    mock.assert();
}

#[test]
fn get_not_found_is_not_retried() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("not here")
        .expect(1)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);

    let err = client.get("/missing").unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(clock.sleeps().is_empty());
    mock.assert();
}

#[test]
fn get_service_unavailable_retries_until_exhausted() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .expect(3)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);

    let err = client.get("/flaky").unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    assert_eq!(err.status(), Some(503));
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    mock.assert();
}

#[test]
fn head_429_honours_retry_after_each_time() {
    let mut server = Server::new();
    let mock = server
        .mock("HEAD", "/busy")
        .with_status(429)
        .with_header("Retry-After", "2")
        .expect(3)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);

    let err = client.head("/busy").unwrap_err();
    assert_eq!(err.status(), Some(429));
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(2),
            Duration::from_secs(2),
        ]
    );
    mock.assert();
}

#[test]
fn post_sends_key_and_json_then_replays() {
    let mut server = Server::new();
    let body = json!({"sku": "A-1", "qty": 2});
    let mock = server
        .mock("POST", "/orders")
        .match_header("idempotency-key", "order-42")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(body.clone()))
        .with_status(201)
        .with_body(r#"{"id":42}"#)
        .expect(1)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);
    let opts = WriteOptions::new().idempotency_key("order-42");

    let first = client.post_with("/orders", &body, &opts).unwrap();
    let second = client.post_with("/orders", &body, &opts).unwrap();

    assert_eq!(first.body, json!({"id": 42}));
    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.body, first.body);
    mock.assert();
}

#[test]
fn put_server_error_is_retried_and_not_stored() {
    let mut server = Server::new();
    let mock = server
        .mock("PUT", "/orders/1")
        .with_status(500)
        .with_body("boom")
        .expect(3)
        .create();

    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&server.url(), &clock, &dir);

    let err = client.put("/orders/1", &json!({"qty": 1})).unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    assert_eq!(err.status(), Some(500));
    assert!(client.store().is_empty());
    mock.assert();
}

#[test]
fn connection_refused_is_retried_as_transient() {
    // Nothing listens on port 1.
    let clock = Arc::new(ManualClock::default());
    let dir = tempfile::tempdir().unwrap();
    let client = client_for("http://127.0.0.1:1", &clock, &dir);

    let err = client.get("/").unwrap_err();
    match err {
        Error::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, Error::Transport(TransportError::Connect(_))));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
