//! Shared fixtures for client integration tests.

#![allow(dead_code)]

use resilient_http::resilience::retry::{JitterMode, RetryPolicy};
use resilient_http::{
    HttpClient, HttpClientBuilder, HttpRequest, HttpResponse, ManualClock, Transport,
    TransportError,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Step = Result<HttpResponse, TransportError>;

/// Transport that replays a fixed script and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn responses(responses: Vec<HttpResponse>) -> Arc<Self> {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".into())))
    }
}

/// Deterministic policy: no jitter, 1s base, 8s cap.
pub fn fixed_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(8))
        .with_jitter(JitterMode::None)
}

pub fn builder(
    base_url: &str,
    transport: Arc<dyn Transport>,
    clock: &Arc<ManualClock>,
    store_dir: &Path,
) -> HttpClientBuilder {
    HttpClient::builder(base_url)
        .transport(transport)
        .clock(clock.clone())
        .store_path(store_dir.join("idempotency_cache.json"))
        .read_policy(fixed_policy(3))
        .write_policy(fixed_policy(3))
        .jitter_seed(11)
}

pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
}
