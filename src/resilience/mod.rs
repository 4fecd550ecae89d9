//! 弹性模式模块：提供重试退避与限流协作等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! Blocking building blocks for surviving transient failures.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`retry`] | Retry engine with exponential backoff, jitter and a wall-clock budget |
//! | [`rate_limit`] | HTTP 429 cooperation driven by `Retry-After` / `X-RateLimit-Reset` |
//!
//! ## Retry Engine
//!
//! Any blocking operation can be retried. Retryability of both errors and
//! successful values is decided by the caller:
//!
//! ```rust
//! use resilient_http::resilience::retry::{JitterMode, RetryEngine, RetryPolicy};
//! use std::time::Duration;
//!
//! let engine = RetryEngine::new();
//! let policy = RetryPolicy::new()
//!     .with_max_retries(3)
//!     .with_base_delay(Duration::from_millis(1))
//!     .with_max_delay(Duration::from_millis(4))
//!     .with_jitter(JitterMode::Equal);
//!
//! let mut calls = 0;
//! let value = engine
//!     .execute(
//!         &policy,
//!         || {
//!             calls += 1;
//!             if calls < 2 { Err("connection reset") } else { Ok(calls) }
//!         },
//!         |_| false,
//!         |_| true,
//!         |attempt, _, sleep| println!("retry #{} in {:?}", attempt, sleep),
//!     )
//!     .unwrap();
//! assert_eq!(value, 2);
//! ```
//!
//! ## Rate Limit Coordinator
//!
//! ```rust
//! use resilient_http::resilience::rate_limit::{RateLimitConfig, RateLimitCoordinator};
//! use resilient_http::transport::HttpResponse;
//!
//! let coordinator = RateLimitCoordinator::new(RateLimitConfig::default());
//! let ok = HttpResponse::new(200);
//! assert!(!coordinator.handle(&ok)); // only 429 triggers a pause
//! ```

pub mod rate_limit;
pub mod retry;
