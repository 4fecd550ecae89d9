//! Cooperation with server-side rate limiting (HTTP 429).
//!
//! The wait is resolved from, in order: `Retry-After` as integer seconds,
//! `Retry-After` as an HTTP-date, `X-RateLimit-Reset` as epoch seconds, and
//! finally a 1 second default. The result is clamped to `[min_sleep, max_sleep]`.

use crate::clock::{system_clock, Clock};
use crate::transport::{header_str, HttpResponse};
use crate::{Error, ErrorContext};
use chrono::DateTime;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const RETRY_AFTER: &str = "retry-after";
pub const RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Clamp window for rate-limit sleeps, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub min_sleep: u64,
    pub max_sleep: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_sleep: 1,
            max_sleep: 300,
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_sleep(mut self, secs: u64) -> Self {
        self.min_sleep = secs;
        self
    }

    pub fn with_max_sleep(mut self, secs: u64) -> Self {
        self.max_sleep = secs;
        self
    }

    /// `min_sleep` must be at least 1 and no larger than `max_sleep`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_sleep == 0 || self.min_sleep > self.max_sleep {
            return Err(Error::configuration_with_context(
                "rate-limit window must satisfy 1 <= min_sleep <= max_sleep",
                ErrorContext::new()
                    .with_field_path("rate_limit")
                    .with_details(format!(
                        "min_sleep={}, max_sleep={}",
                        self.min_sleep, self.max_sleep
                    ))
                    .with_source("rate_limit_config"),
            ));
        }
        Ok(())
    }

    fn clamp(&self, secs: i64) -> u64 {
        let lo = self.min_sleep.max(1);
        let hi = self.max_sleep.max(lo);
        (secs.max(0) as u64).clamp(lo, hi)
    }
}

/// Which hint produced the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitSource {
    RetryAfterSeconds,
    RetryAfterDate,
    RateLimitReset,
    Default,
}

/// Per-response rate-limit verdict. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub should_wait: bool,
    /// Clamped wait, at least `min_sleep` (>= 1) whenever `should_wait` is set.
    /// `0` when `should_wait` is false: there is nothing to wait for.
    pub wait_seconds: u64,
    pub source: WaitSource,
    /// `X-RateLimit-Remaining`, when the server sent it.
    pub remaining: Option<u64>,
}

/// Resolve the raw wait (seconds, at least 1) from rate-limit headers.
pub fn parse_wait_seconds(headers: &HeaderMap, now_epoch: f64) -> (i64, WaitSource) {
    if let Some(raw) = header_str(headers, RETRY_AFTER) {
        if let Some(secs) = raw.parse::<f64>().ok().filter(|s| s.is_finite()) {
            return ((secs.trunc() as i64).max(1), WaitSource::RetryAfterSeconds);
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
            let target = date.timestamp() as f64 + f64::from(date.timestamp_subsec_millis()) / 1000.0;
            let wait = (target - now_epoch).round() as i64;
            return (wait.max(1), WaitSource::RetryAfterDate);
        }
    }

    if let Some(raw) = header_str(headers, RATELIMIT_RESET) {
        if let Some(reset) = raw.parse::<f64>().ok().filter(|s| s.is_finite()) {
            let wait = (reset.trunc() - now_epoch).round() as i64;
            return (wait.max(1), WaitSource::RateLimitReset);
        }
    }

    (1, WaitSource::Default)
}

/// Sleeps through 429 responses using server pacing hints.
pub struct RateLimitCoordinator {
    cfg: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimitCoordinator {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self::with_clock(cfg, system_clock())
    }

    /// Inject the clock that provides "now" and performs the sleep.
    pub fn with_clock(cfg: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { cfg, clock }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.cfg
    }

    /// Inspect a response without sleeping.
    pub fn signal(&self, status: u16, headers: &HeaderMap) -> RateLimitSignal {
        let remaining = header_str(headers, RATELIMIT_REMAINING).and_then(|s| s.parse::<u64>().ok());
        if status != 429 {
            return RateLimitSignal {
                should_wait: false,
                wait_seconds: 0,
                source: WaitSource::Default,
                remaining,
            };
        }

        let (raw, source) = parse_wait_seconds(headers, self.clock.epoch_secs());
        RateLimitSignal {
            should_wait: true,
            wait_seconds: self.cfg.clamp(raw),
            source,
            remaining,
        }
    }

    /// Sleep if `response` is a 429. Returns `true` when the caller should retry.
    pub fn handle(&self, response: &HttpResponse) -> bool {
        self.handle_signal(&self.signal(response.status, &response.headers))
    }

    pub(crate) fn handle_signal(&self, signal: &RateLimitSignal) -> bool {
        if !signal.should_wait {
            return false;
        }
        info!(
            wait_secs = signal.wait_seconds,
            source = ?signal.source,
            remaining = ?signal.remaining,
            "429 received, pausing before retry"
        );
        self.clock.sleep(Duration::from_secs(signal.wait_seconds));
        true
    }
}

impl Default for RateLimitCoordinator {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    const NOW: f64 = 1_700_000_000.0;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut resp = HttpResponse::new(429);
        for (k, v) in pairs {
            resp = resp.with_header(k, v);
        }
        resp.headers
    }

    fn http_date(epoch: i64) -> String {
        Utc.timestamp_opt(epoch, 0)
            .unwrap()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }

    #[test]
    fn retry_after_seconds() {
        let (secs, src) = parse_wait_seconds(&headers(&[("Retry-After", "5")]), NOW);
        assert_eq!(secs, 5);
        assert_eq!(src, WaitSource::RetryAfterSeconds);
    }

    #[test]
    fn retry_after_fractional_seconds_truncate() {
        let (secs, _) = parse_wait_seconds(&headers(&[("Retry-After", "2.9")]), NOW);
        assert_eq!(secs, 2);
        let (secs, _) = parse_wait_seconds(&headers(&[("Retry-After", "0")]), NOW);
        assert_eq!(secs, 1);
    }

    #[test]
    fn retry_after_http_date() {
        let date = http_date(NOW as i64 + 3);
        let (secs, src) = parse_wait_seconds(&headers(&[("Retry-After", &date)]), NOW - 0.2);
        assert_eq!(src, WaitSource::RetryAfterDate);
        assert!((2..=4).contains(&secs), "got {}", secs);
    }

    #[test]
    fn retry_after_date_in_past_is_one_second() {
        let date = http_date(NOW as i64 - 60);
        let (secs, _) = parse_wait_seconds(&headers(&[("Retry-After", &date)]), NOW);
        assert_eq!(secs, 1);
    }

    #[test]
    fn falls_back_to_ratelimit_reset() {
        let target = NOW as i64 + 7;
        let h = headers(&[("X-RateLimit-Reset", &target.to_string())]);
        let (secs, src) = parse_wait_seconds(&h, (target - 1) as f64);
        assert_eq!(secs, 1);
        assert_eq!(src, WaitSource::RateLimitReset);

        let (secs, _) = parse_wait_seconds(&h, NOW);
        assert_eq!(secs, 7);
    }

    #[test]
    fn garbage_retry_after_falls_through() {
        let h = headers(&[("Retry-After", "soon"), ("x-ratelimit-reset", "nope")]);
        assert_eq!(parse_wait_seconds(&h, NOW), (1, WaitSource::Default));
    }

    #[test]
    fn handle_clamps_and_sleeps() {
        let clock = Arc::new(ManualClock::new(NOW));
        let rl = RateLimitCoordinator::with_clock(RateLimitConfig::new(), clock.clone());

        let resp = HttpResponse::new(429).with_header("Retry-After", "100000");
        assert!(rl.handle(&resp));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(300)]);
    }

    #[test]
    fn handle_ignores_non_429() {
        let clock = Arc::new(ManualClock::new(NOW));
        let rl = RateLimitCoordinator::with_clock(RateLimitConfig::new(), clock.clone());
        let resp = HttpResponse::new(200)
            .with_header("Retry-After", "5")
            .with_header("X-RateLimit-Remaining", "0");
        assert!(!rl.handle(&resp));
        assert!(clock.sleeps().is_empty());

        let sig = rl.signal(resp.status, &resp.headers);
        assert!(!sig.should_wait);
        assert_eq!(sig.wait_seconds, 0);
        assert_eq!(sig.remaining, Some(0));

        let sig = rl.signal(429, &HeaderMap::new());
        assert!(sig.should_wait);
        assert!(sig.wait_seconds >= 1);
    }

    #[test]
    fn custom_window_raises_floor() {
        let clock = Arc::new(ManualClock::new(NOW));
        let rl = RateLimitCoordinator::with_clock(
            RateLimitConfig::new().with_min_sleep(3).with_max_sleep(10),
            clock.clone(),
        );
        let sig = rl.signal(429, &headers(&[("Retry-After", "1")]));
        assert_eq!(sig.wait_seconds, 3);
        assert!(RateLimitConfig::new().with_min_sleep(0).validate().is_err());
        assert!(RateLimitConfig::new()
            .with_min_sleep(20)
            .with_max_sleep(10)
            .validate()
            .is_err());
    }
}
