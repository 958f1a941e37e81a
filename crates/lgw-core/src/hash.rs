// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical JSON rendering and the content hash used for change detection.
//!
//! The hash must be stable across re-serializations by any conforming
//! implementation: object keys are sorted lexically at every nesting level,
//! array order is preserved, and the digest is SHA-256 over the resulting
//! compact rendering.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Produce the canonical compact JSON rendering of `value`.
///
/// Object keys are sorted lexically at every depth; arrays keep their order.
pub fn canonical_json(value: &Value) -> String {
    sort_value(value).to_string()
}

/// Hex-encoded SHA-256 over the canonical rendering of `value`.
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k.clone(), sort_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}
