//! 幂等缓存模块：让 POST/PUT 可以安全重试而不会重复产生服务端副作用。
//!
//! # Idempotency Store
//!
//! A persistent map from `(method, url, idempotency key)` to the first successful
//! response observed for that write. Before a write is sent, the client consults
//! the store: a record with the same body hash is replayed without touching the
//! network, a record with a different body hash is an
//! [`IdempotencyConflict`](crate::Error::IdempotencyConflict).
//!
//! ## On-disk format
//!
//! A single JSON object:
//!
//! ```json
//! { "POST|https://api.example.com/orders|6f1c...": {
//!     "body_hash": "9b2f...", "response": {"id": 42}, "stored_at": 1700000000, "ttl": 86400 } }
//! ```
//!
//! Expiry is checked lazily on lookup; [`IdempotencyStore::cleanup`] sweeps the
//! whole file on demand. There is no background process.
//!
//! ## Concurrency
//!
//! The store is a single-process, single-writer artifact. Each operation is a
//! read-modify-write of the whole file with no file lock. Two writers racing on
//! the *same* key can both miss, both send the request, and the last persist
//! wins. Distinct keys cannot corrupt each other because every rewrite is an
//! atomic rename of a complete file.
//!
//! ```rust
//! use resilient_http::idempotency::{compute_body_hash, IdempotencyStore};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = IdempotencyStore::new(dir.path().join("idem.json"));
//! let body = json!({"sku": "A-1", "qty": 2});
//! let hash = compute_body_hash(Some(&body));
//!
//! store.put("POST", "https://api.example.com/orders", "key-1", &hash, json!({"id": 7}), None).unwrap();
//! let cached = store.lookup("POST", "https://api.example.com/orders", "key-1", &hash).unwrap();
//! assert_eq!(cached, Some(json!({"id": 7})));
//! ```

mod key;
mod store;

pub use key::{composite_key, compute_body_hash, generate_idempotency_key};
pub use store::{IdempotencyRecord, IdempotencyStore, DEFAULT_STORE_FILE, DEFAULT_TTL};
