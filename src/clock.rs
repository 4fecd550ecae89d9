//! Time source and blocking sleep used by the retry engine, the rate-limit
//! coordinator and the idempotency store.
//!
//! Production code uses [`SystemClock`]. Tests inject a [`ManualClock`] whose
//! `sleep` advances virtual time instantly and records every requested pause.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since an arbitrary, fixed origin.
    fn monotonic(&self) -> Duration;

    /// Wall-clock seconds since the UNIX epoch.
    fn epoch_secs(&self) -> f64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real time: `Instant` for budgets, `SystemTime` for expiry and HTTP dates.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }

    fn epoch_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock::new())
}

#[derive(Debug)]
struct ManualState {
    elapsed: Duration,
    epoch_secs: f64,
    sleeps: Vec<Duration>,
}

/// Deterministic clock: time only moves through [`ManualClock::advance`] or `sleep`.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new(epoch_secs: f64) -> Self {
        Self {
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                epoch_secs,
                sleeps: Vec::new(),
            }),
        }
    }

    /// Move both the monotonic and the wall clock forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut st) = self.state.lock() {
            st.elapsed += by;
            st.epoch_secs += by.as_secs_f64();
        }
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|st| st.sleeps.clone())
            .unwrap_or_default()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_700_000_000.0)
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        self.state
            .lock()
            .map(|st| st.elapsed)
            .unwrap_or(Duration::ZERO)
    }

    fn epoch_secs(&self) -> f64 {
        self.state.lock().map(|st| st.epoch_secs).unwrap_or(0.0)
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut st) = self.state.lock() {
            st.sleeps.push(duration);
            st.elapsed += duration;
            st.epoch_secs += duration.as_secs_f64();
        }
    }
}
