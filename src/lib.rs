//! # resilient-http
//!
//! 面向不可靠上游服务的阻塞式 HTTP 操作层：重试退避、限流协作与幂等写入缓存。
//!
//! A blocking HTTP operation layer for talking to flaky or rate-limited APIs.
//!
//! ## Overview
//!
//! Every call goes through the same pipeline:
//!
//! 1. the request is built from the client's base URL, default headers and per-call options
//! 2. the [`transport`] sends it once
//! 3. a `429` is handed to the [`resilience::rate_limit`] coordinator, which sleeps
//!    for the server-advertised window and turns the response into a retryable error
//! 4. the [`resilience::retry`] engine decides whether to try again, and how long to wait
//! 5. for POST/PUT, the first successful response is persisted in the [`idempotency`]
//!    store and replayed for later calls with the same key and body
//!
//! ## Key Features
//!
//! - **Retry engine**: exponential backoff with `none`/`full`/`equal`/`decorrelated` jitter
//!   and an optional wall-clock budget
//! - **Rate-limit cooperation**: `Retry-After` (seconds or HTTP-date) and `X-RateLimit-Reset`,
//!   clamped to a configurable window
//! - **Idempotent writes**: `Idempotency-Key` header plus a JSON-file response cache with
//!   body-hash conflict detection and atomic persistence
//! - **Deterministic testing**: every sleep and timestamp goes through [`clock::Clock`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resilient_http::{HttpClient, WriteOptions};
//! use serde_json::json;
//!
//! fn main() -> resilient_http::Result<()> {
//!     let client = HttpClient::builder("https://api.example.com").build()?;
//!
//!     let health = client.get("/health")?;
//!     println!("health: {}", health.status);
//!
//!     let order = json!({"sku": "A-1", "qty": 2});
//!     let created = client.post_with("/orders", &order, &WriteOptions::new())?;
//!     // Retrying with the same key replays the stored response.
//!     let again = client.post_with(
//!         "/orders",
//!         &order,
//!         &WriteOptions::new().idempotency_key(created.idempotency_key.clone()),
//!     )?;
//!     assert!(again.replayed);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | `HttpClient`, its builder and per-call options |
//! | [`resilience`] | Retry engine and 429 coordinator |
//! | [`idempotency`] | Key generation, body hashing and the persistent response store |
//! | [`transport`] | Request/response types and the blocking reqwest transport |
//! | [`clock`] | Time source abstraction (system and manual) |
//! | [`error`] | Error taxonomy |

pub mod client;
pub mod clock;
pub mod idempotency;
pub mod resilience;
pub mod transport;

// Re-export main types for convenience
pub use client::{
    HttpClient, HttpClientBuilder, IdempotentResponse, ReadOptions, RetryNotice, WriteOptions,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use idempotency::IdempotencyStore;
pub use resilience::rate_limit::{RateLimitConfig, RateLimitCoordinator};
pub use resilience::retry::{JitterMode, RetryEngine, RetryError, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
