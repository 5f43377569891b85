//! Keyed container node.

use std::collections::HashMap;

use super::{errors::ModelError, path::validate_component, value::Value};

/// A string-keyed map of [`Value`]s.
///
/// Keys are unique. Enumeration follows first-insertion order; replacing
/// the value of an existing key keeps its position, removing and
/// re-inserting moves it to the end. Order carries no meaning for
/// equality of plain snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapNode {
    entries: HashMap<String, Value>,
    order: Vec<String>,
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns true if `key` is present, including when it holds `Null`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        let previous = self.entries.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Values in enumeration order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    /// Entries in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k.as_str(), v)))
    }

    /// Returns the key under which `pred` first matches a value.
    pub fn find_key(&self, mut pred: impl FnMut(&Value) -> bool) -> Option<&str> {
        self.iter().find(|(_, v)| pred(v)).map(|(k, _)| k)
    }
}

/// Checks that a map key can be addressed by a path.
pub fn validate_key(key: &str) -> Result<(), ModelError> {
    validate_component(key).map_err(|reason| ModelError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}
