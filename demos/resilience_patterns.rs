//! Resilience Patterns Example
//!
//! This example walks through the building blocks the client is made of:
//! - Backoff schedules for each jitter mode
//! - Retrying an arbitrary blocking operation with a wall-clock budget
//! - Reading server-advertised 429 waits
//!
//! Everything runs against a manual clock, so the demo finishes instantly.
//!
//! Usage:
//!   cargo run --example resilience_patterns

use resilient_http::resilience::rate_limit::{RateLimitConfig, RateLimitCoordinator};
use resilient_http::resilience::retry::{Backoff, JitterMode, RetryEngine, RetryPolicy};
use resilient_http::{HttpResponse, ManualClock};
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_http=debug".into()),
        )
        .init();

    println!("=== Resilient HTTP: Resilience Patterns Demo ===\n");

    demo_backoff_schedules();
    demo_retry_with_budget()?;
    demo_rate_limit_headers();
    Ok(())
}

fn demo_backoff_schedules() {
    println!("--- Example 1: Backoff schedules ---\n");

    let mut rng = rand::thread_rng();
    for mode in [
        JitterMode::None,
        JitterMode::Full,
        JitterMode::Equal,
        JitterMode::Decorrelated,
    ] {
        let policy = RetryPolicy::new()
            .with_max_retries(6)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_jitter(mode);
        let mut backoff = Backoff::new(&policy);
        let delays: Vec<String> = (0..6)
            .map(|attempt| {
                let secs = backoff.next_delay(attempt, &mut rng);
                backoff.observe(secs);
                format!("{:.0}ms", secs * 1000.0)
            })
            .collect();
        println!("  {:<13} {}", mode.as_str(), delays.join(", "));
    }
    println!();
}

fn demo_retry_with_budget() -> anyhow::Result<()> {
    println!("--- Example 2: Retry with a wall-clock budget ---\n");

    let clock = Arc::new(ManualClock::default());
    let engine = RetryEngine::with_clock(clock.clone()).with_seed(7);

    // Recovers on the third attempt.
    let policy = RetryPolicy::safe_reads();
    let mut calls = 0;
    let value = engine.execute(
        &policy,
        || {
            calls += 1;
            if calls < 3 {
                Err("connection reset by peer")
            } else {
                Ok("payload")
            }
        },
        |_| false,
        |_| true,
        |attempt, _, sleep| println!("  retry #{} after {:?}", attempt, sleep),
    );
    println!("  result: {:?} after {} calls\n", value.ok(), calls);

    // Never recovers; the budget stops it before max_retries does.
    let policy = RetryPolicy::new()
        .with_max_retries(50)
        .with_base_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(4))
        .with_jitter(JitterMode::None)
        .with_max_elapsed(Duration::from_secs(10));
    let err = match engine.retry(&policy, || Err::<(), _>("503 upstream")) {
        Ok(()) => anyhow::bail!("operation unexpectedly succeeded"),
        Err(e) => e,
    };
    println!("  gave up: {}", err);
    println!("  virtual time slept: {:?}\n", clock.total_slept());
    Ok(())
}

fn demo_rate_limit_headers() {
    println!("--- Example 3: 429 wait extraction ---\n");

    let coordinator =
        RateLimitCoordinator::new(RateLimitConfig::new().with_min_sleep(1).with_max_sleep(300));

    let samples = vec![
        ("Retry-After: 12", HttpResponse::new(429).with_header("Retry-After", "12")),
        (
            "Retry-After: HTTP-date",
            HttpResponse::new(429).with_header("Retry-After", "Wed, 21 Oct 2037 07:28:00 GMT"),
        ),
        (
            "X-RateLimit-Reset: 0",
            HttpResponse::new(429).with_header("X-RateLimit-Reset", "0"),
        ),
        ("no headers", HttpResponse::new(429)),
        ("200 OK", HttpResponse::new(200)),
    ];

    for (label, resp) in samples {
        let signal = coordinator.signal(resp.status, &resp.headers);
        println!(
            "  {:<24} wait={}s should_wait={} source={:?}",
            label, signal.wait_seconds, signal.should_wait, signal.source
        );
    }
}
