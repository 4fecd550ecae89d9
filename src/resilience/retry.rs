//! Retry engine with exponential backoff, pluggable jitter and a wall-clock budget.
//!
//! The engine wraps any blocking `FnMut() -> Result<T, E>`. Both outcomes of an
//! attempt are classified by caller-supplied predicates, so a "successful" value
//! such as an HTTP 503 response can be retried exactly like a transport error.

use crate::clock::{system_clock, Clock};
use crate::{Error, ErrorContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Randomization applied to the nominal exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterMode {
    /// Sleep exactly the nominal delay.
    None,
    /// Uniform in `[0, delay]`.
    #[default]
    Full,
    /// `delay/2 + uniform(0, delay/2)`.
    Equal,
    /// `min(max_delay, uniform(base_delay, previous_sleep * 3))`.
    Decorrelated,
}

impl JitterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JitterMode::None => "none",
            JitterMode::Full => "full",
            JitterMode::Equal => "equal",
            JitterMode::Decorrelated => "decorrelated",
        }
    }
}

impl fmt::Display for JitterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JitterMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(JitterMode::None),
            "full" => Ok(JitterMode::Full),
            "equal" => Ok(JitterMode::Equal),
            "decorrelated" => Ok(JitterMode::Decorrelated),
            other => Err(Error::configuration_with_context(
                format!("unknown jitter mode '{}'", other),
                ErrorContext::new()
                    .with_field_path("policy.jitter")
                    .with_details("expected one of none|full|equal|decorrelated")
                    .with_source("retry_policy"),
            )),
        }
    }
}

/// Retry configuration. Built per call and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts beyond the first.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Cap applied to every single sleep.
    pub max_delay: Duration,
    pub jitter: JitterMode,
    /// Total wall-clock budget across all attempts and sleeps.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: JitterMode::Full,
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for GET/HEAD: short cap, decorrelated jitter.
    pub fn safe_reads() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: JitterMode::Decorrelated,
            max_elapsed: None,
        }
    }

    /// Preset for POST/PUT guarded by an idempotency key.
    pub fn idempotent_writes() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: JitterMode::Full,
            max_elapsed: None,
        }
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: JitterMode) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_elapsed(mut self, budget: Duration) -> Self {
        self.max_elapsed = Some(budget);
        self
    }

    /// Apply `{prefix}_MAX_RETRIES`, `{prefix}_BASE_DELAY_MS`, `{prefix}_MAX_DELAY_MS`,
    /// `{prefix}_JITTER` and `{prefix}_MAX_ELAPSED_MS` from the environment.
    ///
    /// Unparseable numeric values are ignored; an unknown jitter mode is an error.
    pub fn with_env_overrides(mut self, prefix: &str) -> crate::Result<Self> {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();
        let millis = |name: &str| {
            var(name)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        if let Some(n) = var("MAX_RETRIES").and_then(|s| s.trim().parse::<u32>().ok()) {
            self.max_retries = n;
        }
        if let Some(d) = millis("BASE_DELAY_MS") {
            self.base_delay = d;
        }
        if let Some(d) = millis("MAX_DELAY_MS") {
            self.max_delay = d;
        }
        if let Some(d) = millis("MAX_ELAPSED_MS") {
            self.max_elapsed = Some(d);
        }
        if let Some(j) = var("JITTER") {
            self.jitter = j.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// `base_delay` must be positive and no larger than `max_delay`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.base_delay.is_zero() {
            return Err(Error::configuration_with_context(
                "base_delay must be greater than zero",
                ErrorContext::new()
                    .with_field_path("policy.base_delay")
                    .with_source("retry_policy"),
            ));
        }
        if self.base_delay > self.max_delay {
            return Err(Error::configuration_with_context(
                "base_delay must not exceed max_delay",
                ErrorContext::new()
                    .with_field_path("policy.max_delay")
                    .with_details(format!(
                        "base_delay={:?}, max_delay={:?}",
                        self.base_delay, self.max_delay
                    ))
                    .with_source("retry_policy"),
            ));
        }
        Ok(())
    }
}

/// Delay calculator for one retry loop.
///
/// Holds the previous sleep, which decorrelated jitter depends on. A fresh
/// `Backoff` starts every `execute` call, so jitter state never leaks across calls.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: f64,
    cap: f64,
    jitter: JitterMode,
    previous_sleep: f64,
    last_nominal: f64,
}

impl Backoff {
    pub fn new(policy: &RetryPolicy) -> Self {
        let base = policy.base_delay.as_secs_f64();
        Self {
            base,
            cap: policy.max_delay.as_secs_f64(),
            jitter: policy.jitter,
            previous_sleep: base,
            last_nominal: base,
        }
    }

    /// `min(base * 2^attempt, cap)` in seconds, `attempt` being 0-based.
    pub fn nominal(&self, attempt: u32) -> f64 {
        let exp = attempt.min(1023) as i32;
        (self.base * 2f64.powi(exp)).min(self.cap)
    }

    /// Jittered delay in seconds before retry number `attempt + 1`.
    pub fn next_delay<R: Rng + ?Sized>(&mut self, attempt: u32, rng: &mut R) -> f64 {
        let nominal = self.nominal(attempt);
        self.last_nominal = nominal;
        match self.jitter {
            JitterMode::None => nominal,
            JitterMode::Full => rng.gen_range(0.0..=nominal),
            JitterMode::Equal => {
                let half = nominal / 2.0;
                half + rng.gen_range(0.0..=half)
            }
            JitterMode::Decorrelated => {
                let low = self.base;
                let high = (self.previous_sleep * 3.0).max(low);
                rng.gen_range(low..=high).min(self.cap)
            }
        }
    }

    /// Record the sleep actually taken (after any budget clamp).
    pub fn observe(&mut self, slept: f64) {
        self.previous_sleep = match self.jitter {
            JitterMode::Decorrelated => slept,
            _ => self.last_nominal,
        };
    }

    pub fn previous_sleep(&self) -> f64 {
        self.previous_sleep
    }
}

/// What the final failed attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LastFailure<T, E> {
    /// The operation failed with a retryable error.
    Error(E),
    /// The operation returned a value classified as retryable.
    Result(T),
}

impl<T, E> LastFailure<T, E> {
    pub fn error(&self) -> Option<&E> {
        match self {
            LastFailure::Error(e) => Some(e),
            LastFailure::Result(_) => None,
        }
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            LastFailure::Result(r) => Some(r),
            LastFailure::Error(_) => None,
        }
    }
}

/// Terminal failure of a retry loop.
#[derive(Debug)]
pub enum RetryError<T, E> {
    /// The policy failed validation; no attempt was made.
    InvalidPolicy(String),
    /// A non-retryable error, propagated on first occurrence.
    Aborted { attempts: u32, error: E },
    /// `max_retries` retries were spent without success.
    Exhausted { attempts: u32, last: LastFailure<T, E> },
    /// `max_elapsed` was consumed before another attempt could run.
    BudgetExceeded {
        attempts: u32,
        elapsed: Duration,
        last: LastFailure<T, E>,
    },
}

impl<T, E> RetryError<T, E> {
    /// Number of times the operation was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::InvalidPolicy(_) => 0,
            RetryError::Aborted { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::BudgetExceeded { attempts, .. } => *attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, RetryError::BudgetExceeded { .. })
    }
}

impl<T, E: fmt::Display> fmt::Display for RetryError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::InvalidPolicy(msg) => write!(f, "invalid retry policy: {}", msg),
            RetryError::Aborted { error, .. } => write!(f, "non-retryable failure: {}", error),
            RetryError::Exhausted { attempts, last } => match last {
                LastFailure::Error(e) => {
                    write!(f, "retries exhausted after {} attempts: {}", attempts, e)
                }
                LastFailure::Result(_) => write!(
                    f,
                    "retries exhausted after {} attempts: result still retryable",
                    attempts
                ),
            },
            RetryError::BudgetExceeded {
                attempts, elapsed, ..
            } => write!(
                f,
                "retry time budget exceeded after {} attempts ({:?} elapsed)",
                attempts, elapsed
            ),
        }
    }
}

impl<T: fmt::Debug, E: std::error::Error + 'static> std::error::Error for RetryError<T, E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Aborted { error, .. } => Some(error),
            RetryError::Exhausted { last, .. } | RetryError::BudgetExceeded { last, .. } => {
                last.error().map(|e| e as &(dyn std::error::Error + 'static))
            }
            RetryError::InvalidPolicy(_) => None,
        }
    }
}

pub type RetryOutcome<T, E> = std::result::Result<T, RetryError<T, E>>;

/// Tagged classification of one attempt.
enum Verdict<T, E> {
    Success(T),
    Retry(LastFailure<T, E>),
    Abort(E),
}

/// Executes operations under a [`RetryPolicy`].
///
/// Sleeping blocks the calling thread through the injected [`Clock`].
pub struct RetryEngine {
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl RetryEngine {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Make jitter reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            clock: self.clock,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Retry every error, never retry a successful value.
    pub fn retry<T, E, F>(&self, policy: &RetryPolicy, operation: F) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.execute(policy, operation, |_| false, |_| true, |_, _, _| {})
    }

    /// Run `operation` until it succeeds, fails non-retryably, or the policy gives up.
    ///
    /// `on_retry(attempt, last, sleep)` is called before each sleep; `attempt` is the
    /// 1-based number of the retry about to happen.
    pub fn execute<T, E, F, R, X, H>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
        is_result_retryable: R,
        is_error_retryable: X,
        mut on_retry: H,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Result<T, E>,
        R: Fn(&T) -> bool,
        X: Fn(&E) -> bool,
        H: FnMut(u32, &LastFailure<T, E>, Duration),
    {
        if let Err(e) = policy.validate() {
            return Err(RetryError::InvalidPolicy(e.to_string()));
        }

        let start = self.clock.monotonic();
        let mut backoff = Backoff::new(policy);
        let mut attempt: u32 = 0;

        loop {
            let verdict = match operation() {
                Ok(value) if is_result_retryable(&value) => {
                    Verdict::Retry(LastFailure::Result(value))
                }
                Ok(value) => Verdict::Success(value),
                Err(err) if is_error_retryable(&err) => Verdict::Retry(LastFailure::Error(err)),
                Err(err) => Verdict::Abort(err),
            };

            let last = match verdict {
                Verdict::Success(value) => return Ok(value),
                Verdict::Abort(error) => {
                    return Err(RetryError::Aborted {
                        attempts: attempt + 1,
                        error,
                    })
                }
                Verdict::Retry(last) => last,
            };

            if attempt >= policy.max_retries {
                warn!(
                    attempts = attempt + 1,
                    max_retries = policy.max_retries,
                    "retries exhausted"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last,
                });
            }

            let mut sleep_secs = {
                let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                backoff.next_delay(attempt, &mut *rng)
            };

            if let Some(budget) = policy.max_elapsed {
                let elapsed = self.clock.monotonic().saturating_sub(start);
                if elapsed >= budget {
                    warn!(
                        attempts = attempt + 1,
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "retry time budget exceeded"
                    );
                    return Err(RetryError::BudgetExceeded {
                        attempts: attempt + 1,
                        elapsed,
                        last,
                    });
                }
                let remaining = (budget - elapsed).as_secs_f64();
                sleep_secs = sleep_secs.min(remaining);
            }

            if !sleep_secs.is_finite() || sleep_secs < 0.0 {
                sleep_secs = 0.0;
            }
            backoff.observe(sleep_secs);
            let pause = Duration::from_secs_f64(sleep_secs);

            on_retry(attempt + 1, &last, pause);
            debug!(
                attempt = attempt + 1,
                sleep_ms = pause.as_millis() as u64,
                jitter = policy.jitter.as_str(),
                "scheduling retry"
            );

            self.clock.sleep(pause);
            attempt += 1;
        }
    }
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn engine(clock: &Arc<ManualClock>) -> RetryEngine {
        RetryEngine::with_clock(clock.clone()).with_seed(7)
    }

    fn policy(jitter: JitterMode) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(8)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_jitter(jitter)
    }

    #[test]
    fn full_jitter_stays_within_nominal() {
        let p = policy(JitterMode::Full);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let mut b = Backoff::new(&p);
            for attempt in 0..8 {
                let cap = (0.1 * 2f64.powi(attempt as i32)).min(2.0);
                let d = b.next_delay(attempt, &mut rng);
                assert!((0.0..=cap).contains(&d), "attempt {} delay {}", attempt, d);
                b.observe(d);
            }
        }
    }

    #[test]
    fn equal_jitter_stays_in_upper_half() {
        let p = policy(JitterMode::Equal);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..200 {
            let mut b = Backoff::new(&p);
            for attempt in 0..8 {
                let nominal = b.nominal(attempt);
                let d = b.next_delay(attempt, &mut rng);
                assert!(d >= nominal / 2.0 && d <= nominal);
                b.observe(d);
            }
        }
    }

    #[test]
    fn decorrelated_jitter_stays_between_base_and_cap() {
        let p = policy(JitterMode::Decorrelated);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let mut b = Backoff::new(&p);
            for attempt in 0..8 {
                let prev = b.previous_sleep();
                let d = b.next_delay(attempt, &mut rng);
                assert!((0.1..=2.0).contains(&d));
                assert!(d <= (prev * 3.0).max(0.1) + 1e-12);
                b.observe(d);
                assert_eq!(b.previous_sleep(), d);
            }
        }
    }

    #[test]
    fn no_jitter_is_plain_exponential() {
        let p = policy(JitterMode::None);
        let mut rng = StdRng::seed_from_u64(4);
        let mut b = Backoff::new(&p);
        let delays: Vec<f64> = (0..6).map(|a| b.next_delay(a, &mut rng)).collect();
        assert_eq!(delays, vec![0.1, 0.2, 0.4, 0.8, 1.6, 2.0]);
        assert_eq!(b.nominal(5000), 2.0);
    }

    #[test]
    fn succeeds_on_third_call_after_two_retries() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let mut calls = 0;
        let mut retries = Vec::new();

        let out: RetryOutcome<&str, String> = engine.execute(
            &RetryPolicy::new().with_max_retries(5),
            || {
                calls += 1;
                if calls < 3 {
                    Err("transient".to_string())
                } else {
                    Ok("ok")
                }
            },
            |_| false,
            |_| true,
            |attempt, last, sleep| retries.push((attempt, last.error().cloned(), sleep)),
        );

        assert_eq!(out.unwrap(), "ok");
        assert_eq!(calls, 3);
        assert_eq!(retries.len(), 2);
        assert_eq!(retries[0].0, 1);
        assert_eq!(retries[1].0, 2);
        assert_eq!(retries[0].1.as_deref(), Some("transient"));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn non_retryable_error_propagates_immediately() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let mut calls = 0;

        let out: RetryOutcome<(), &str> = engine.execute(
            &RetryPolicy::new(),
            || {
                calls += 1;
                Err("bad argument")
            },
            |_| false,
            |e| *e != "bad argument",
            |_, _, _| {},
        );

        match out {
            Err(RetryError::Aborted { attempts, error }) => {
                assert_eq!(attempts, 1);
                assert_eq!(error, "bad argument");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn retryable_result_is_retried_then_exhausts() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let mut calls = 0;

        let out: RetryOutcome<u16, String> = engine.execute(
            &RetryPolicy::new().with_max_retries(3),
            || {
                calls += 1;
                Ok(503)
            },
            |status| *status == 503,
            |_| true,
            |_, _, _| {},
        );

        let err = out.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 4);
        match err {
            RetryError::Exhausted { last, .. } => assert_eq!(last.result(), Some(&503)),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls, 4);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let mut calls = 0;
        let out: RetryOutcome<(), &str> = engine.retry(&RetryPolicy::no_retry(), || {
            calls += 1;
            Err("down")
        });
        assert!(out.unwrap_err().is_exhausted());
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn budget_is_never_overslept() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let budget = Duration::from_millis(2500);
        let p = RetryPolicy::new()
            .with_max_retries(10)
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(JitterMode::None)
            .with_max_elapsed(budget);

        let out: RetryOutcome<(), &str> = engine.retry(&p, || Err("timeout"));

        let err = out.unwrap_err();
        assert!(err.is_budget_exceeded());
        assert!(!err.is_exhausted());
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(1), Duration::from_millis(1500)]
        );
        assert!(clock.total_slept() <= budget);
    }

    #[test]
    fn budget_accounts_for_time_spent_in_operation() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let p = RetryPolicy::new()
            .with_jitter(JitterMode::Full)
            .with_max_elapsed(Duration::from_secs(1));

        let out: RetryOutcome<(), &str> = engine.retry(&p, || {
            clock.advance(Duration::from_millis(600));
            Err("slow")
        });

        assert!(out.unwrap_err().is_budget_exceeded());
        assert!(clock.monotonic() >= Duration::from_secs(1));
        assert!(clock.total_slept() <= Duration::from_millis(400));
    }

    #[test]
    fn decorrelated_state_resets_per_call() {
        let clock = Arc::new(ManualClock::default());
        let engine = engine(&clock);
        let p = RetryPolicy::new()
            .with_max_retries(1)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(60))
            .with_jitter(JitterMode::Decorrelated);

        for _ in 0..20 {
            let _: RetryOutcome<(), &str> = engine.retry(&p, || Err("x"));
        }
        // Each call's only sleep starts from previous_sleep = base, so it is within [base, 3*base].
        for s in clock.sleeps() {
            assert!(s >= Duration::from_millis(100) && s <= Duration::from_millis(300));
        }
    }

    #[test]
    fn invalid_policy_is_rejected_before_any_attempt() {
        let engine = RetryEngine::with_clock(Arc::new(ManualClock::default()));
        let mut calls = 0;
        let p = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(1));
        let out: RetryOutcome<(), &str> = engine.retry(&p, || {
            calls += 1;
            Ok(())
        });
        assert!(matches!(out, Err(RetryError::InvalidPolicy(_))));
        assert_eq!(calls, 0);
        assert!(RetryPolicy::new()
            .with_base_delay(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn jitter_mode_parses_and_serializes() {
        assert_eq!("Decorrelated".parse::<JitterMode>().unwrap(), JitterMode::Decorrelated);
        assert!("sometimes".parse::<JitterMode>().is_err());
        let json = serde_json::to_string(&JitterMode::Equal).unwrap();
        assert_eq!(json, "\"equal\"");
    }

    #[test]
    fn presets_are_valid() {
        for p in [
            RetryPolicy::safe_reads(),
            RetryPolicy::idempotent_writes(),
            RetryPolicy::no_retry(),
        ] {
            assert!(p.validate().is_ok());
        }
        assert_eq!(RetryPolicy::safe_reads().jitter, JitterMode::Decorrelated);
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("RETRY_TEST_ENV_MAX_RETRIES", "2");
        std::env::set_var("RETRY_TEST_ENV_BASE_DELAY_MS", "250");
        std::env::set_var("RETRY_TEST_ENV_JITTER", "none");
        let p = RetryPolicy::safe_reads()
            .with_env_overrides("RETRY_TEST_ENV")
            .unwrap();
        assert_eq!(p.max_retries, 2);
        assert_eq!(p.base_delay, Duration::from_millis(250));
        assert_eq!(p.jitter, JitterMode::None);
        assert_eq!(p.max_delay, Duration::from_secs(8));
    }
}
