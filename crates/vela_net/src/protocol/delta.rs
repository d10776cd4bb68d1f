//! # Delta Compression
//!
//! Field-level diff between two snapshot trees.
//!
//! Rules, in order:
//! - primitives compare by value
//! - maps diff key by key, recursively; unchanged keys are omitted
//! - lists diff wholesale: any length or element change re-sends the
//!   whole list (no per-element diff, deliberately)
//! - a key missing on one side is always sent; a key deleted in `next`
//!   encodes as [`Value::Null`]
//! - `None` means nothing changed at all: silence == "no change"
//!
//! `apply_delta(base, delta)` merges a delta back onto a baseline, with
//! the round-trip property `apply(base, diff(base, next)) == next`.

use std::collections::BTreeMap;

use super::value::Value;

/// Computes the delta that turns `base` into `next`.
///
/// Returns `None` when the two trees are identical.
#[must_use]
pub fn diff(base: &Value, next: &Value) -> Option<Value> {
    match (base, next) {
        (Value::Map(base_map), Value::Map(next_map)) => diff_maps(base_map, next_map),
        _ => {
            if base == next {
                None
            } else {
                Some(next.clone())
            }
        }
    }
}

fn diff_maps(base: &BTreeMap<String, Value>, next: &BTreeMap<String, Value>) -> Option<Value> {
    let mut changes = BTreeMap::new();

    for (key, next_value) in next {
        match base.get(key) {
            Some(base_value) => {
                if let Some(change) = diff(base_value, next_value) {
                    changes.insert(key.clone(), change);
                }
            }
            // Missing on one side: always sent.
            None => {
                changes.insert(key.clone(), next_value.clone());
            }
        }
    }
    for key in base.keys() {
        if !next.contains_key(key) {
            changes.insert(key.clone(), Value::Null);
        }
    }

    if changes.is_empty() {
        None
    } else {
        Some(Value::Map(changes))
    }
}

/// Merges a delta onto a baseline.
#[must_use]
pub fn apply_delta(base: &Value, delta: &Value) -> Value {
    match (base, delta) {
        (Value::Map(base_map), Value::Map(delta_map)) => {
            let mut merged = base_map.clone();
            for (key, change) in delta_map {
                if change.is_null() {
                    merged.remove(key);
                } else {
                    let applied = match merged.get(key) {
                        Some(existing) => apply_delta(existing, change),
                        None => change.clone(),
                    };
                    merged.insert(key.clone(), applied);
                }
            }
            Value::Map(merged)
        }
        _ => delta.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(x: f64, hp: f64) -> Value {
        Value::map([
            (
                "position".to_owned(),
                Value::map([
                    ("x".to_owned(), Value::F64(x)),
                    ("y".to_owned(), Value::F64(0.0)),
                    ("z".to_owned(), Value::F64(0.0)),
                ]),
            ),
            (
                "combat".to_owned(),
                Value::map([("hp".to_owned(), Value::F64(hp))]),
            ),
        ])
    }

    #[test]
    fn test_identical_trees_yield_none() {
        let snapshot = Value::map([("1".to_owned(), entity(5.0, 100.0))]);
        assert_eq!(diff(&snapshot, &snapshot.clone()), None);
    }

    #[test]
    fn test_delta_contains_only_changed_field() {
        let base = Value::map([
            ("1".to_owned(), entity(100.0, 100.0)),
            ("2".to_owned(), entity(7.0, 50.0)),
        ]);
        let mut next = base.clone();
        if let Value::Map(entities) = &mut next {
            entities.insert("1".to_owned(), entity(110.0, 100.0));
        }

        let delta = diff(&base, &next).unwrap();
        let Value::Map(entities) = &delta else {
            panic!("delta must be a map");
        };

        // Entity 2 is untouched and must be absent entirely.
        assert!(!entities.contains_key("2"));
        let one = &entities["1"];
        assert_eq!(
            one.get("position").and_then(|p| p.get("x")),
            Some(&Value::F64(110.0))
        );
        // Unchanged siblings inside entity 1 are omitted too.
        assert!(one.get("combat").is_none());
        assert!(one.get("position").and_then(|p| p.get("y")).is_none());
    }

    #[test]
    fn test_lists_resend_wholesale() {
        let base = Value::map([(
            "members".to_owned(),
            Value::List(vec![Value::I64(1), Value::I64(2)]),
        )]);
        let next = Value::map([(
            "members".to_owned(),
            Value::List(vec![Value::I64(1), Value::I64(3)]),
        )]);

        let delta = diff(&base, &next).unwrap();
        assert_eq!(
            delta.get("members"),
            Some(&Value::List(vec![Value::I64(1), Value::I64(3)]))
        );
    }

    #[test]
    fn test_removed_key_encodes_null() {
        let base = Value::map([("1".to_owned(), entity(0.0, 10.0))]);
        let next = Value::Map(BTreeMap::new());

        let delta = diff(&base, &next).unwrap();
        assert_eq!(delta.get("1"), Some(&Value::Null));
        assert_eq!(apply_delta(&base, &delta), next);
    }

    #[test]
    fn test_round_trip_property() {
        let base = Value::map([
            ("1".to_owned(), entity(1.0, 100.0)),
            ("2".to_owned(), entity(2.0, 90.0)),
        ]);
        let next = Value::map([
            ("1".to_owned(), entity(1.5, 80.0)),
            ("3".to_owned(), entity(9.0, 40.0)),
        ]);

        match diff(&base, &next) {
            Some(delta) => assert_eq!(apply_delta(&base, &delta), next),
            None => assert_eq!(base, next),
        }
    }

    #[test]
    fn test_type_change_sends_new_value() {
        let base = Value::map([("status".to_owned(), Value::Str("idle".to_owned()))]);
        let next = Value::map([("status".to_owned(), Value::I64(2))]);
        let delta = diff(&base, &next).unwrap();
        assert_eq!(delta.get("status"), Some(&Value::I64(2)));
    }
}
