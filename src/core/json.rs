//! Canonical, diff-stable JSON serialization.
//!
//! Extracted documents and migration output are written with a fixed key
//! ordering: non-id-shaped keys alphabetically, then id-shaped keys (see
//! [`crate::core::slug::is_id_shaped_key`]) appended in their original
//! order. The ordering is deterministic and idempotent, which is what makes
//! the migration runner's equality-based no-op detection and the extract →
//! build → extract round trip byte-stable.

use serde_json::{Map, Value};

use crate::core::slug::is_id_shaped_key;

/// Recursively reorder every object's keys into canonical order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut named: Vec<&String> = Vec::new();
            let mut id_shaped: Vec<&String> = Vec::new();
            for key in map.keys() {
                if is_id_shaped_key(key) {
                    id_shaped.push(key);
                } else {
                    named.push(key);
                }
            }
            named.sort();

            let mut out = Map::new();
            for key in named.into_iter().chain(id_shaped) {
                out.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serialize a value in canonical order, pretty-printed, trailing newline.
pub fn to_canonical_string(value: &Value) -> String {
    let canonical = canonicalize(value);
    let mut out = serde_json::to_string_pretty(&canonical).expect("canonical value serializes");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_alphabetized() {
        let value = json!({"zeta": 1, "alpha": 2, "mid": {"b": 1, "a": 2}});
        let out = to_canonical_string(&value);
        let alpha = out.find("\"alpha\"").unwrap();
        let mid = out.find("\"mid\"").unwrap();
        let zeta = out.find("\"zeta\"").unwrap();
        assert!(alpha < mid && mid < zeta);
        assert!(out.find("\"a\"").unwrap() < out.find("\"b\"").unwrap());
    }

    #[test]
    fn test_id_shaped_keys_trail_in_original_order() {
        let text = r#"{"zz9yyy8xxx7www6vvv55": 1, "name": "x", "aa1bbb2ccc3ddd4eee55": 2}"#;
        let value: Value = serde_json::from_str(text).unwrap();
        let out = to_canonical_string(&value);
        let name = out.find("\"name\"").unwrap();
        let first_id = out.find("\"zz9yyy8xxx7www6vvv55\"").unwrap();
        let second_id = out.find("\"aa1bbb2ccc3ddd4eee55\"").unwrap();
        assert!(name < first_id, "named keys come before id-shaped keys");
        assert!(first_id < second_id, "id-shaped keys keep original order");
    }

    #[test]
    fn test_idempotent() {
        let value = json!({"b": [{"d": 1, "c": 2}], "a": null});
        let once = to_canonical_string(&value);
        let reparsed: Value = serde_json::from_str(&once).unwrap();
        assert_eq!(to_canonical_string(&reparsed), once);
    }

    #[test]
    fn test_trailing_newline() {
        assert!(to_canonical_string(&json!({})).ends_with('\n'));
    }
}
