use crate::client::policy::{describe, into_client_error, is_retryable_status, status_error};
use crate::idempotency::{compute_body_hash, generate_idempotency_key, IdempotencyStore};
use crate::resilience::rate_limit::RateLimitCoordinator;
use crate::resilience::retry::{LastFailure, RetryEngine, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::{Error, Result};
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Details of a retry about to happen, handed to an optional observer.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    pub method: String,
    pub url: String,
    /// 1-based retry number.
    pub attempt: u32,
    pub reason: String,
    pub sleep: Duration,
}

pub type RetryObserver = Arc<dyn Fn(&RetryNotice) + Send + Sync>;

/// Per-call options for GET/HEAD.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Overrides the client's read policy for this call.
    pub policy: Option<RetryPolicy>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Per-call options for POST/PUT.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Reuse this key; a fresh UUID-v4 is generated when absent.
    pub idempotency_key: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Overrides the store's default TTL for the persisted response.
    pub ttl: Option<Duration>,
    /// Overrides the client's write policy for this call.
    pub policy: Option<RetryPolicy>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Result of an idempotent write.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotentResponse {
    /// Key the write was sent (or replayed) under; reuse it to retry safely later.
    pub idempotency_key: String,
    pub body: Value,
    /// `true` when served from the idempotency store without a network call.
    pub replayed: bool,
}

/// Blocking HTTP client with retries, 429 cooperation and idempotent writes.
///
/// - GET/HEAD: retried on `{408,429,500,502,503,504}` and on timeouts/connection errors
/// - POST/PUT: same retry rules, guarded by an `Idempotency-Key` and a local response store
pub struct HttpClient {
    pub(crate) base_url: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) engine: RetryEngine,
    pub(crate) rate_limit: RateLimitCoordinator,
    pub(crate) store: IdempotencyStore,
    pub(crate) read_policy: RetryPolicy,
    pub(crate) write_policy: RetryPolicy,
    pub(crate) default_headers: HeaderMap,
    pub(crate) observer: Option<RetryObserver>,
}

impl HttpClient {
    pub fn builder(base_url: impl Into<String>) -> crate::client::HttpClientBuilder {
        crate::client::HttpClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &IdempotencyStore {
        &self.store
    }

    pub fn read_policy(&self) -> &RetryPolicy {
        &self.read_policy
    }

    pub fn write_policy(&self) -> &RetryPolicy {
        &self.write_policy
    }

    /// `base_url` and `path` joined with exactly one slash.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> Result<HttpResponse> {
        self.get_with(path, &ReadOptions::default())
    }

    pub fn get_with(&self, path: &str, opts: &ReadOptions) -> Result<HttpResponse> {
        self.safe_request(Method::GET, path, opts)
    }

    /// GET and parse the body as JSON.
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path)?.json()
    }

    pub fn head(&self, path: &str) -> Result<HttpResponse> {
        self.head_with(path, &ReadOptions::default())
    }

    pub fn head_with(&self, path: &str, opts: &ReadOptions) -> Result<HttpResponse> {
        self.safe_request(Method::HEAD, path, opts)
    }

    /// POST under a freshly generated idempotency key, returning the parsed body.
    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        Ok(self.post_with(path, body, &WriteOptions::default())?.body)
    }

    pub fn post_with(
        &self,
        path: &str,
        body: &Value,
        opts: &WriteOptions,
    ) -> Result<IdempotentResponse> {
        self.idempotent_write(Method::POST, path, body, opts)
    }

    /// PUT under a freshly generated idempotency key, returning the parsed body.
    pub fn put(&self, path: &str, body: &Value) -> Result<Value> {
        Ok(self.put_with(path, body, &WriteOptions::default())?.body)
    }

    pub fn put_with(
        &self,
        path: &str,
        body: &Value,
        opts: &WriteOptions,
    ) -> Result<IdempotentResponse> {
        self.idempotent_write(Method::PUT, path, body, opts)
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpRequest> {
        let mut req = HttpRequest::new(method, url);
        req.headers = self.default_headers.clone();
        for (name, value) in headers {
            req = req.with_header(name, value)?;
        }
        Ok(req)
    }

    /// One transport call followed by 429 handling. A handled 429 becomes
    /// [`Error::RateLimited`] so the retry loop treats it as retryable.
    ///
    /// When the policy has a `max_elapsed` budget and the server asks for a wait
    /// that would overrun it, the attempt fails with [`Error::BudgetExceeded`]
    /// without sleeping.
    fn attempt(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        start: Duration,
        attempts: u32,
    ) -> Result<HttpResponse> {
        let resp = self.transport.send(request)?;
        let signal = self.rate_limit.signal(resp.status, &resp.headers);
        if !signal.should_wait {
            return Ok(resp);
        }

        if let Some(budget) = policy.max_elapsed {
            let elapsed = self.engine.clock().monotonic().saturating_sub(start);
            let wait = Duration::from_secs(signal.wait_seconds);
            if elapsed + wait > budget {
                warn!(
                    method = request.method.as_str(),
                    url = request.url.as_str(),
                    wait_secs = signal.wait_seconds,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = budget.as_millis() as u64,
                    "429 wait exceeds retry time budget"
                );
                return Err(Error::BudgetExceeded {
                    attempts,
                    elapsed,
                    last: Box::new(Error::RateLimited {
                        wait_secs: signal.wait_seconds,
                    }),
                });
            }
        }

        self.rate_limit.handle_signal(&signal);
        Err(Error::RateLimited {
            wait_secs: signal.wait_seconds,
        })
    }

    fn notify(
        &self,
        request: &HttpRequest,
        attempt: u32,
        last: &LastFailure<HttpResponse, Error>,
        sleep: Duration,
    ) {
        let reason = describe(last);
        debug!(
            method = request.method.as_str(),
            url = request.url.as_str(),
            attempt,
            sleep_ms = sleep.as_millis() as u64,
            reason = reason.as_str(),
            "retrying request"
        );
        if let Some(observer) = &self.observer {
            observer(&RetryNotice {
                method: request.method.to_string(),
                url: request.url.clone(),
                attempt,
                reason,
                sleep,
            });
        }
    }

    fn safe_request(&self, method: Method, path: &str, opts: &ReadOptions) -> Result<HttpResponse> {
        let url = self.url(path);
        let mut request = self.request(method, &url, &opts.headers)?;
        request.query = opts.query.clone();
        let policy = opts.policy.as_ref().unwrap_or(&self.read_policy);
        let start = self.engine.clock().monotonic();
        let mut attempts = 0;

        let resp = self
            .engine
            .execute(
                policy,
                || {
                    attempts += 1;
                    self.attempt(&request, policy, start, attempts)
                },
                |resp: &HttpResponse| is_retryable_status(resp.status),
                Error::is_retryable,
                |attempt, last, sleep| self.notify(&request, attempt, last, sleep),
            )
            .map_err(into_client_error)?;

        if resp.status >= 400 {
            info!(
                http_status = resp.status,
                method = request.method.as_str(),
                url = url.as_str(),
                "request failed"
            );
            return Err(status_error(&resp));
        }
        Ok(resp)
    }

    fn idempotent_write(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        opts: &WriteOptions,
    ) -> Result<IdempotentResponse> {
        let url = self.url(path);
        let key = opts
            .idempotency_key
            .clone()
            .unwrap_or_else(generate_idempotency_key);
        let body_hash = compute_body_hash(Some(body));

        if let Some(cached) = self.store.lookup(method.as_str(), &url, &key, &body_hash)? {
            debug!(
                method = method.as_str(),
                url = url.as_str(),
                idempotency_key = key.as_str(),
                "replaying stored response"
            );
            return Ok(IdempotentResponse {
                idempotency_key: key,
                body: cached,
                replayed: true,
            });
        }

        let mut request = self
            .request(method.clone(), &url, &[])?
            .with_header(IDEMPOTENCY_KEY_HEADER, &key)?
            .with_header("content-type", "application/json")?;
        for (name, value) in &opts.headers {
            request = request.with_header(name, value)?;
        }
        let request = request.with_json(body.clone());
        let policy = opts.policy.as_ref().unwrap_or(&self.write_policy);
        let start = self.engine.clock().monotonic();
        let mut attempts = 0;

        let resp = self
            .engine
            .execute(
                policy,
                || -> Result<HttpResponse> {
                    attempts += 1;
                    let resp = self.attempt(&request, policy, start, attempts)?;
                    if resp.status >= 400 {
                        return Err(status_error(&resp));
                    }
                    Ok(resp)
                },
                |_: &HttpResponse| false,
                Error::is_retryable,
                |attempt, last, sleep| self.notify(&request, attempt, last, sleep),
            )
            .map_err(|e| {
                let err = into_client_error(e);
                info!(
                    method = method.as_str(),
                    url = url.as_str(),
                    idempotency_key = key.as_str(),
                    error = %err,
                    "idempotent write failed"
                );
                err
            })?;

        let data = response_value(&resp);
        self.store
            .put(method.as_str(), &url, &key, &body_hash, data.clone(), opts.ttl)?;

        Ok(IdempotentResponse {
            idempotency_key: key,
            body: data,
            replayed: false,
        })
    }
}

/// Value persisted for a successful write.
///
/// A JSON body is stored as-is, an empty body becomes `{"status": <code>}` and
/// any other body becomes `{"status": <code>, "body": <text>}`.
fn response_value(resp: &HttpResponse) -> Value {
    if resp.body.iter().all(u8::is_ascii_whitespace) {
        return json!({ "status": resp.status });
    }
    serde_json::from_slice(&resp.body)
        .unwrap_or_else(|_| json!({ "status": resp.status, "body": resp.text() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_response_values() {
        let v = response_value(&HttpResponse::new(204));
        assert_eq!(v, json!({"status": 204}));
        let v = response_value(&HttpResponse::new(201).with_body(r#"{"id":3}"#));
        assert_eq!(v, json!({"id": 3}));
        let v = response_value(&HttpResponse::new(201).with_body("Created"));
        assert_eq!(v, json!({"status": 201, "body": "Created"}));
    }

    #[test]
    fn options_builders() {
        let r = ReadOptions::new().query("page", "2").header("Accept", "application/json");
        assert_eq!(r.query, vec![("page".to_string(), "2".to_string())]);
        let w = WriteOptions::new()
            .idempotency_key("k")
            .ttl(Duration::from_secs(60));
        assert_eq!(w.idempotency_key.as_deref(), Some("k"));
        assert_eq!(w.ttl, Some(Duration::from_secs(60)));
    }
}
