//! # Self-Describing Value Model
//!
//! The snapshot payload is a tree of [`Value`]s: maps keyed by entity id
//! and component name, primitives at the leaves. Map keys are ordered so
//! the encoding (and the delta diff) is stable across runs.

use std::collections::BTreeMap;

/// One node in a snapshot tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent / cleared.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    I64(i64),
    /// Floating point.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list; diffed wholesale, never per element.
    List(Vec<Value>),
    /// Key-ordered map; diffed key by key.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a map value from key/value pairs.
    #[must_use]
    pub fn map<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self::Map(entries.into_iter().collect())
    }

    /// Map entry lookup; `None` on non-maps.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Numeric view of this value, if it is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view of this value, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_lookup() {
        let v = Value::map([("x".to_owned(), Value::F64(1.5))]);
        assert_eq!(v.get("x").and_then(Value::as_f64), Some(1.5));
        assert!(v.get("y").is_none());
        assert!(Value::Null.get("x").is_none());
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::I64(3).as_f64(), Some(3.0));
        assert_eq!(Value::F64(2.5).as_i64(), None);
        assert!(Value::Null.is_null());
    }
}
