//! Ordered container node.
//!
//! A plain index-addressed sequence. Convergence under concurrent edits is
//! not the list's job: remote insertions and removals are re-expressed by
//! [`crate::ops::transform`] before they reach [`ListNode::insert`] or
//! [`ListNode::remove`], so the list itself only needs exact splice
//! semantics and strict bounds checks.

use super::{errors::ModelError, value::Value};

/// An ordered sequence of [`Value`]s.
///
/// ```
/// # use sharedoc::model::{ListNode, Value};
/// let mut list = ListNode::new();
/// list.push("first");
/// list.push("third");
/// list.insert(1, "second").unwrap();
///
/// assert_eq!(list.len(), 3);
/// assert_eq!(list.get(1), Some(&Value::from("second")));
/// assert!(list.insert(5, "nope").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListNode {
    items: Vec<Value>,
}

impl ListNode {
    /// Creates a new empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of items in the list
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Gets a value by index (0-based)
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Pushes a value to the end of the list.
    /// Returns the index of the newly added element
    pub fn push(&mut self, value: impl Into<Value>) -> usize {
        self.items.push(value.into());
        self.items.len() - 1
    }

    /// Inserts a value at `index`, shifting later items up by one.
    ///
    /// `index == len()` appends.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<(), ModelError> {
        let len = self.items.len();
        if index > len {
            return Err(ModelError::IndexOutOfBounds { index, len });
        }
        self.items.insert(index, value.into());
        Ok(())
    }

    /// Replaces the value at `index`, returning the old one.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<Value, ModelError> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(ModelError::IndexOutOfBounds { index, len })?;
        Ok(std::mem::replace(slot, value.into()))
    }

    /// Removes the value at `index`, shifting later items down by one.
    pub fn remove(&mut self, index: usize) -> Result<Value, ModelError> {
        let len = self.items.len();
        if index >= len {
            return Err(ModelError::IndexOutOfBounds { index, len });
        }
        Ok(self.items.remove(index))
    }

    /// Returns an iterator over the values in order
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    /// Index of the first value matching `pred`.
    pub fn position(&self, pred: impl FnMut(&Value) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }
}

impl FromIterator<Value> for ListNode {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
