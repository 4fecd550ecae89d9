use crate::client::core::{HttpClient, RetryObserver, RetryNotice};
use crate::clock::{system_clock, Clock};
use crate::idempotency::{IdempotencyStore, DEFAULT_STORE_FILE, DEFAULT_TTL};
use crate::resilience::rate_limit::{RateLimitConfig, RateLimitCoordinator};
use crate::resilience::retry::{RetryEngine, RetryPolicy};
use crate::transport::{HttpRequest, ReqwestTransport, Transport};
use crate::{Error, ErrorContext, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`HttpClient`].
///
/// Keep this surface area small and predictable. Everything has a default:
/// a blocking reqwest transport, the `safe_reads` / `idempotent_writes` retry
/// presets, a 1..=300 second rate-limit window and an idempotency store at
/// `idempotency_cache.json`.
pub struct HttpClientBuilder {
    base_url: String,
    transport: Option<Arc<dyn Transport>>,
    timeout: Duration,
    proxy_url: Option<String>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<IdempotencyStore>,
    store_path: PathBuf,
    idempotency_ttl: Duration,
    read_policy: RetryPolicy,
    write_policy: RetryPolicy,
    rate_limit: RateLimitConfig,
    default_headers: Vec<(String, String)>,
    seed: Option<u64>,
    observer: Option<RetryObserver>,
}

impl HttpClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            timeout: Duration::from_secs(10),
            proxy_url: None,
            clock: None,
            store: None,
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            idempotency_ttl: DEFAULT_TTL,
            read_policy: RetryPolicy::safe_reads(),
            write_policy: RetryPolicy::idempotent_writes(),
            rate_limit: RateLimitConfig::default(),
            default_headers: Vec::new(),
            seed: None,
            observer: None,
        }
    }

    /// Builder seeded from the environment:
    /// - `RESILIENT_HTTP_TIMEOUT_SECS`, `RESILIENT_HTTP_PROXY_URL`
    /// - `RESILIENT_HTTP_IDEMPOTENCY_PATH`, `RESILIENT_HTTP_IDEMPOTENCY_TTL_SECS`
    /// - `RESILIENT_HTTP_RATELIMIT_MIN_SECS`, `RESILIENT_HTTP_RATELIMIT_MAX_SECS`
    /// - `RESILIENT_HTTP_READ_*` / `RESILIENT_HTTP_WRITE_*` retry overrides
    ///   (`MAX_RETRIES`, `BASE_DELAY_MS`, `MAX_DELAY_MS`, `JITTER`, `MAX_ELAPSED_MS`)
    pub fn from_env(base_url: impl Into<String>) -> Result<Self> {
        let env_u64 = |name: &str| {
            std::env::var(name)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
        };

        let mut builder = Self::new(base_url);
        if let Some(secs) = env_u64("RESILIENT_HTTP_TIMEOUT_SECS") {
            builder.timeout = Duration::from_secs(secs.max(1));
        }
        builder.proxy_url = std::env::var("RESILIENT_HTTP_PROXY_URL").ok();
        let store = IdempotencyStore::from_env();
        builder.store_path = store.path().to_path_buf();
        builder.idempotency_ttl = store.default_ttl();
        if let Some(secs) = env_u64("RESILIENT_HTTP_RATELIMIT_MIN_SECS") {
            builder.rate_limit.min_sleep = secs;
        }
        if let Some(secs) = env_u64("RESILIENT_HTTP_RATELIMIT_MAX_SECS") {
            builder.rate_limit.max_sleep = secs;
        }
        builder.read_policy = builder
            .read_policy
            .with_env_overrides("RESILIENT_HTTP_READ")?;
        builder.write_policy = builder
            .write_policy
            .with_env_overrides("RESILIENT_HTTP_WRITE")?;
        Ok(builder)
    }

    /// Replace the default reqwest transport (e.g. for tests or custom TLS).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Per-request timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    /// Clock shared by the retry engine, the rate-limit coordinator and the
    /// default idempotency store.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an explicitly constructed store instead of one at `store_path`.
    pub fn idempotency_store(mut self, store: IdempotencyStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.idempotency_ttl = ttl;
        self
    }

    pub fn read_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    pub fn write_policy(mut self, policy: RetryPolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn rate_limit(mut self, cfg: RateLimitConfig) -> Self {
        self.rate_limit = cfg;
        self
    }

    /// Header sent with every request; per-call headers override it.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Seed the jitter RNG for reproducible backoff.
    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Observe every retry (after the decision, before the sleep).
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(&RetryNotice) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url '{}'", self.base_url),
                ErrorContext::new()
                    .with_field_path("client.base_url")
                    .with_details(e.to_string())
                    .with_source("client_builder"),
            )
        })?;

        self.read_policy.validate()?;
        self.write_policy.validate()?;
        self.rate_limit.validate()?;

        let clock = self.clock.unwrap_or_else(system_clock);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::with_proxy(
                self.timeout,
                self.proxy_url.as_deref(),
            )?),
        };

        let store = match self.store {
            Some(store) => store,
            None => IdempotencyStore::new(self.store_path)
                .with_default_ttl(self.idempotency_ttl)
                .with_clock(clock.clone()),
        };

        let mut engine = RetryEngine::with_clock(clock.clone());
        if let Some(seed) = self.seed {
            engine = engine.with_seed(seed);
        }

        // Validate default headers once, up front.
        let mut template = HttpRequest::new(reqwest::Method::GET, base_url.as_str());
        for (name, value) in &self.default_headers {
            template = template.with_header(name, value)?;
        }

        Ok(HttpClient {
            base_url,
            transport,
            engine,
            rate_limit: RateLimitCoordinator::with_clock(self.rate_limit, clock),
            store,
            read_policy: self.read_policy,
            write_policy: self.write_policy,
            default_headers: template.headers,
            observer: self.observer,
        })
    }
}
