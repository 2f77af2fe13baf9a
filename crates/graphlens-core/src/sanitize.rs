//! Removal of embedding-sized lists from query results.
//!
//! Lists with `list_limit` or more elements are mostly vectors that cost a
//! lot of context and carry no meaning for a reader, so they are dropped.
//! A dropped list becomes an absent map key (or an absent list element),
//! never an empty list.

use serde_json::Value;

use crate::types::Record;

/// Recursively prune oversized lists from `value`.
///
/// Returns `Value::Null` when `value` itself is a list that is too large.
/// Map entries and list elements whose sanitized value is null are omitted.
pub fn sanitize_value(value: &Value, list_limit: usize) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_map(map, list_limit)),
        Value::Array(items) => {
            if items.len() < list_limit {
                Value::Array(
                    items
                        .iter()
                        .map(|item| sanitize_value(item, list_limit))
                        .filter(|item| !item.is_null())
                        .collect(),
                )
            } else {
                Value::Null
            }
        }
        scalar => scalar.clone(),
    }
}

/// Sanitize every value of a record, dropping keys that sanitize to null.
pub fn sanitize_record(record: &Record, list_limit: usize) -> Record {
    sanitize_map(record, list_limit)
}

fn sanitize_map(map: &Record, list_limit: usize) -> Record {
    map.iter()
        .filter_map(|(key, value)| {
            let sanitized = sanitize_value(value, list_limit);
            (!sanitized.is_null()).then(|| (key.clone(), sanitized))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LIMIT: usize = 128;

    fn list_of(len: usize) -> Value {
        Value::Array((0..len).map(|i| json!(i as f64 * 0.5)).collect())
    }

    #[test]
    fn test_list_boundary() {
        assert!(sanitize_value(&list_of(LIMIT), LIMIT).is_null());
        assert_eq!(sanitize_value(&list_of(LIMIT - 1), LIMIT), list_of(LIMIT - 1));
    }

    #[test]
    fn test_oversized_list_key_is_omitted() {
        let input = json!({
            "name": "Ann",
            "embedding": list_of(LIMIT + 5),
            "tags": ["a", "b"]
        });
        let out = sanitize_value(&input, LIMIT);
        assert_eq!(out, json!({"name": "Ann", "tags": ["a", "b"]}));
    }

    #[test]
    fn test_empty_list_is_kept() {
        let out = sanitize_value(&json!({"tags": []}), LIMIT);
        assert_eq!(out, json!({"tags": []}));
    }

    #[test]
    fn test_nested_structures() {
        let input = json!({
            "n": {
                "props": {"vec": list_of(200), "age": 42},
                "history": [{"vec": list_of(300), "at": "2024"}, list_of(500), null]
            }
        });
        let out = sanitize_value(&input, LIMIT);
        assert_eq!(
            out,
            json!({
                "n": {
                    "props": {"age": 42},
                    "history": [{"at": "2024"}]
                }
            })
        );
    }

    #[test]
    fn test_null_map_entries_are_dropped() {
        let out = sanitize_value(&json!({"a": null, "b": false, "c": 0}), LIMIT);
        assert_eq!(out, json!({"b": false, "c": 0}));
    }

    #[test]
    fn test_scalars_pass_through() {
        for v in [json!(1), json!("x"), json!(true), json!(null), json!(2.5)] {
            assert_eq!(sanitize_value(&v, LIMIT), v);
        }
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            json!({"a": [list_of(LIMIT), {"b": list_of(3)}], "c": null}),
            json!([[list_of(LIMIT - 1)], {"x": list_of(LIMIT)}]),
            list_of(LIMIT),
            json!({"deep": {"deeper": {"vec": list_of(1000), "ok": [1, 2, 3]}}}),
        ];
        for input in inputs {
            let once = sanitize_value(&input, LIMIT);
            assert_eq!(sanitize_value(&once, LIMIT), once);
        }
    }

    #[test]
    fn test_sanitize_record() {
        let record = json!({"n": {"embedding": list_of(LIMIT)}, "score": 0.9})
            .as_object()
            .cloned()
            .unwrap();
        let out = sanitize_record(&record, LIMIT);
        assert_eq!(Value::Object(out), json!({"n": {}, "score": 0.9}));
    }
}
