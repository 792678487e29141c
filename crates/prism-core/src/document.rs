//! Pure JSON document primitives
//!
//! The upstream APIs return deeply nested, loosely typed JSON. These
//! functions turn that into flat `key -> value` material the collectors can
//! match against their allow-lists: [`flatten`] collapses nesting,
//! [`normalize_key`] canonicalizes key spelling, and [`coerce_numeric`]
//! turns arbitrary scalars into gauge samples.
//!
//! All three are total functions over `serde_json::Value` - there is no
//! error path, malformed shapes degrade to `0.0` or pass through untouched.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Coerce an arbitrary JSON value into a numeric sample.
///
/// Numbers pass through. The literal string `"on"` maps to `1.0` and
/// `"off"` (case-insensitive) to `0.0`; any other string is parsed as a
/// decimal. Everything that cannot be represented numerically, including
/// booleans, nulls, arrays and objects, becomes `0.0`.
pub fn coerce_numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            if s == "on" {
                1.0
            } else if s.eq_ignore_ascii_case("off") {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        _ => 0.0,
    }
}

/// Canonicalize a flattened key path into a metric-name fragment.
///
/// Lower-cases the key and maps `.`, `-` and `:` to `_`. Idempotent.
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .map(|c| match c {
            '.' | '-' | ':' => '_',
            other => other,
        })
        .collect()
}

/// Flatten a nested JSON object into a single-level mapping with
/// underscore-joined keys, depth-unbounded.
///
/// Key collisions from different branches overwrite last-write-wins in the
/// document's native iteration order; callers must not rely on stable
/// disambiguation of colliding paths.
pub fn flatten(prefix: &str, document: &Map<String, Value>) -> HashMap<String, Value> {
    let mut flat = HashMap::new();
    flatten_into(prefix, document, &mut flat);
    flat
}

fn flatten_into(prefix: &str, document: &Map<String, Value>, out: &mut HashMap<String, Value>) {
    for (key, value) in document {
        let flat_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}_{}", prefix, key)
        };

        match value {
            Value::Object(nested) => flatten_into(&flat_key, nested, out),
            _ => {
                out.insert(flat_key, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(&json!("on")), 1.0);
        assert_eq!(coerce_numeric(&json!("off")), 0.0);
        assert_eq!(coerce_numeric(&json!("OFF")), 0.0);
        assert_eq!(coerce_numeric(&json!("3.5")), 3.5);
        assert_eq!(coerce_numeric(&json!("garbage")), 0.0);
        assert_eq!(coerce_numeric(&json!(5.0)), 5.0);
        assert_eq!(coerce_numeric(&json!(42)), 42.0);
    }

    #[test]
    fn test_coerce_numeric_non_scalars() {
        assert_eq!(coerce_numeric(&Value::Null), 0.0);
        assert_eq!(coerce_numeric(&json!(true)), 0.0);
        assert_eq!(coerce_numeric(&json!([1, 2, 3])), 0.0);
        assert_eq!(coerce_numeric(&json!({"a": 1})), 0.0);
    }

    #[test]
    fn test_coerce_on_is_case_sensitive() {
        // Only the exact literal "on" maps to 1; "ON" falls through to the
        // decimal parse and defaults to 0.
        assert_eq!(coerce_numeric(&json!("ON")), 0.0);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("storage.usage_bytes"), "storage_usage_bytes");
        assert_eq!(normalize_key("Hypervisor-CPU:Usage"), "hypervisor_cpu_usage");
    }

    #[test]
    fn test_normalize_key_idempotent() {
        let once = normalize_key("Stats.controller-avg:latency");
        assert_eq!(normalize_key(&once), once);
    }

    #[test]
    fn test_flatten_nested() {
        let doc = json!({
            "name": "pe-01",
            "stats": {
                "cpu": {"usage_ppm": 250000},
                "num_iops": 12
            }
        });
        let flat = flatten("", doc.as_object().unwrap());

        assert_eq!(flat["name"], json!("pe-01"));
        assert_eq!(flat["stats_cpu_usage_ppm"], json!(250000));
        assert_eq!(flat["stats_num_iops"], json!(12));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_documents() {
        let doc = json!({"a": 1, "b": "x", "c": [1, 2]});
        let flat = flatten("", doc.as_object().unwrap());

        let rebuilt: Map<String, Value> = flat.clone().into_iter().collect();
        let again = flatten("", &rebuilt);
        assert_eq!(flat, again);
    }

    #[test]
    fn test_flatten_produces_no_nested_values() {
        let doc = json!({
            "l1": {"l2": {"l3": {"l4": {"leaf": 7}}}},
            "top": 1
        });
        let flat = flatten("", doc.as_object().unwrap());

        assert!(flat.values().all(|v| !v.is_object()));
        assert_eq!(flat["l1_l2_l3_l4_leaf"], json!(7));
    }

    #[test]
    fn test_flatten_with_prefix() {
        let doc = json!({"usage_bytes": 100});
        let flat = flatten("storage", doc.as_object().unwrap());
        assert_eq!(flat["storage_usage_bytes"], json!(100));
    }

    #[test]
    fn test_flatten_collisions_overwrite_in_document_order() {
        // serde_json's default map iterates keys in sorted order, so "a"
        // (expanding to a_b) is visited before the literal "a_b".
        let doc = json!({"a": {"b": 1}, "a_b": 2});
        let flat = flatten("", doc.as_object().unwrap());
        assert_eq!(flat["a_b"], json!(2));
        assert_eq!(flat.len(), 1);
    }
}
