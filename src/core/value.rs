//! core::value
//!
//! Module values and argument slots.
//!
//! A module's value ("visage") is a structured [`Value`]. Dependents that
//! ask for a fragment (`config.db.url`) receive the nested value, or an
//! absent argument when any step of the path is missing. A missing
//! fragment is never an error.

use std::ops::Index;

pub use serde_json::{json, Map, Value};

/// Walk `path` into `value`.
///
/// Object steps look up keys; array steps accept decimal indices. A step
/// that lands on `null` stops the walk and yields `null` (the path exists
/// up to there); a step that finds nothing yields `None`.
///
/// # Example
///
/// ```
/// use wireloom::core::value::{fragment, json};
///
/// let value = json!({"x": {"y": 5}, "list": [1, 2], "gone": null});
/// let path = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();
///
/// assert_eq!(fragment(&value, &path(&["x", "y"])), Some(json!(5)));
/// assert_eq!(fragment(&value, &path(&["list", "1"])), Some(json!(2)));
/// assert_eq!(fragment(&value, &path(&["x", "z"])), None);
/// assert_eq!(fragment(&value, &path(&["gone", "deeper"])), Some(json!(null)));
/// ```
pub fn fragment(value: &Value, path: &[String]) -> Option<Value> {
    let mut current = value;
    for step in path {
        if current.is_null() {
            return Some(Value::Null);
        }
        current = match current {
            Value::Object(map) => map.get(step)?,
            Value::Array(items) => items.get(step.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Ordered dependency values handed to a factory.
///
/// `None` marks an absent value (a fragment that was not found).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Option<Value>>);

impl Args {
    pub(crate) fn new(slots: Vec<Option<Value>>) -> Self {
        Self(slots)
    }

    /// Number of declared dependencies.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The value at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).and_then(Option::as_ref)
    }

    /// Take ownership of the value at `index`, leaving it absent.
    pub fn take(&mut self, index: usize) -> Option<Value> {
        self.0.get_mut(index).and_then(Option::take)
    }

    /// Integer view of the value at `index`.
    pub fn i64(&self, index: usize) -> Option<i64> {
        self.get(index).and_then(Value::as_i64)
    }

    /// String view of the value at `index`.
    pub fn str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.0.iter().map(Option::as_ref)
    }

    pub fn into_vec(self) -> Vec<Option<Value>> {
        self.0
    }
}

static ABSENT: Value = Value::Null;

/// Indexing returns `null` for absent slots, mirroring JSON semantics.
impl Index<usize> for Args {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        self.get(index).unwrap_or(&ABSENT)
    }
}
