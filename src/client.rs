//! Blocking HTTP client built on the retry engine, the rate-limit coordinator
//! and the idempotency store.
//!
//! Keep the public surface small: [`HttpClient`] for calls, [`HttpClientBuilder`]
//! for wiring. Status classification lives in `policy`.

pub mod builder;
pub mod core;
mod policy;

pub use builder::HttpClientBuilder;
pub use core::{
    HttpClient, IdempotentResponse, ReadOptions, RetryNotice, RetryObserver, WriteOptions,
    IDEMPOTENCY_KEY_HEADER,
};
pub use policy::{is_retryable_status, RETRYABLE_STATUSES};
