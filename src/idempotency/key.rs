//! Idempotency key generation and canonical body hashing.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fresh UUID-v4 string for a POST/PUT.
pub fn generate_idempotency_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `METHOD|url|key`, method upper-cased.
pub fn composite_key(method: &str, url: &str, key: &str) -> String {
    format!("{}|{}|{}", method.to_ascii_uppercase(), url, key)
}

/// SHA-256 (hex) of the canonical JSON form of `body`.
///
/// Object keys are sorted at every depth and no whitespace is emitted, so
/// logically equal payloads hash identically regardless of field order.
/// An absent body hashes as the empty string.
pub fn compute_body_hash(body: Option<&Value>) -> String {
    let mut canonical = String::new();
    if let Some(body) = body {
        write_canonical(body, &mut canonical);
    }
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(&map[k], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
