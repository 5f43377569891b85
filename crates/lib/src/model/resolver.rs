//! Path resolution against a node store.
//!
//! Two walks share one step function:
//!
//! - [`resolve`] is the read path. Any failed lookup yields `None`, so
//!   `get("a.b.c")` on a missing intermediate is simply absent.
//! - [`locate`] and [`locate_parent`] are the strict variants used by
//!   path-addressed mutations. They report which segment failed and why.
//!
//! Each raw component becomes a [`Segment`] only when the walk reaches it:
//! a map always treats it as a key (even `"0"`), a list requires a
//! non-negative integer.

use super::{
    errors::PathError,
    node::{Node, NodeId},
    path::{PathBuf, Segment},
    store::NodeStore,
    value::Value,
};

/// Result of resolving a path: a structural node or a scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Node(NodeId),
    Value(Value),
}

impl Resolved {
    pub fn as_node(&self) -> Option<&NodeId> {
        match self {
            Resolved::Node(id) => Some(id),
            Resolved::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) => Some(v),
            Resolved::Node(_) => None,
        }
    }

    /// The value as stored in its container.
    pub fn into_value(self) -> Value {
        match self {
            Resolved::Node(id) => Value::Node(id),
            Resolved::Value(v) => v,
        }
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        match value {
            Value::Node(id) => Resolved::Node(id),
            other => Resolved::Value(other),
        }
    }
}

enum StepError {
    NotFound,
    IndexNotANumber,
    NotAContainer,
}

/// Decides how `component` addresses the container `id`.
fn segment_for(store: &NodeStore, id: &NodeId, component: &str) -> Result<Segment, StepError> {
    match store.node(id).map_err(|_| StepError::NotFound)? {
        Node::Map(_) => Ok(Segment::Key(component.to_string())),
        Node::List(_) => component
            .parse::<usize>()
            .map(Segment::Index)
            .map_err(|_| StepError::IndexNotANumber),
        Node::Text(_) => Err(StepError::NotAContainer),
    }
}

fn step(store: &NodeStore, current: &Resolved, component: &str) -> Result<Resolved, StepError> {
    let Resolved::Node(id) = current else {
        return Err(StepError::NotAContainer);
    };
    let found = match (store.node(id).map_err(|_| StepError::NotFound)?, segment_for(store, id, component)?) {
        (Node::Map(map), Segment::Key(key)) => map.get(&key),
        (Node::List(list), Segment::Index(index)) => list.get(index),
        _ => None,
    };
    found.cloned().map(Resolved::from).ok_or(StepError::NotFound)
}

fn step_error(path: &PathBuf, component: &str, err: StepError) -> PathError {
    let path = path.to_string();
    let segment = component.to_string();
    match err {
        StepError::NotFound => PathError::NotFound { path, segment },
        StepError::IndexNotANumber => PathError::IndexNotANumber { path, segment },
        StepError::NotAContainer => PathError::NotAContainer { path, segment },
    }
}

/// Walks `path` from `root`. Any failed step yields `None`.
pub fn resolve(store: &NodeStore, root: &NodeId, path: &PathBuf) -> Option<Resolved> {
    if !store.contains(root) {
        return None;
    }
    let mut current = Resolved::Node(root.clone());
    for component in path.components() {
        current = step(store, &current, component).ok()?;
    }
    Some(current)
}

/// Walks `path` from `root`, reporting the first failing segment.
pub fn locate(store: &NodeStore, root: &NodeId, path: &PathBuf) -> Result<Resolved, PathError> {
    let mut current = Resolved::Node(root.clone());
    for component in path.components() {
        current = step(store, &current, component).map_err(|e| step_error(path, component, e))?;
    }
    Ok(current)
}

/// Resolves everything but the last component to a map or list, and
/// decides the last component against that container.
///
/// The last segment itself need not exist, which lets a `put` create a
/// new key.
pub fn locate_parent(
    store: &NodeStore,
    root: &NodeId,
    path: &PathBuf,
) -> Result<(NodeId, Segment), PathError> {
    let (Some(parent_path), Some(last)) = (path.parent(), path.last()) else {
        return Err(PathError::Malformed {
            path: path.to_string(),
            reason: "the root has no parent container".to_string(),
        });
    };
    let container = locate(store, root, &parent_path)?;
    let Resolved::Node(id) = container else {
        return Err(step_error(path, last, StepError::NotAContainer));
    };
    let segment = segment_for(store, &id, last).map_err(|e| step_error(path, last, e))?;
    Ok((id, segment))
}

/// Presence of `key` directly under the container at `base`.
///
/// No value is fetched or copied. An unresolvable base is simply `false`.
pub fn contains(store: &NodeStore, root: &NodeId, base: &PathBuf, key: &str) -> bool {
    let Some(Resolved::Node(id)) = resolve(store, root, base) else {
        return false;
    };
    match store.node(&id) {
        Ok(Node::Map(map)) => map.contains(key),
        Ok(Node::List(list)) => key.parse::<usize>().is_ok_and(|i| i < list.len()),
        _ => false,
    }
}
