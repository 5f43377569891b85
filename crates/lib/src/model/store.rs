//! Arena of nodes owned by one document.
//!
//! Every structural node lives here keyed by [`NodeId`]. Containers hold
//! child ids, children hold a parent id, and nothing holds a reference into
//! the arena, so the tree can be walked in both directions and mutated
//! without shared ownership.

use std::collections::HashMap;

use super::{
    errors::ModelError,
    list::ListNode,
    map::MapNode,
    node::{Node, NodeEntry, NodeId, NodeKind},
    path::{PathBuf, Segment},
    text::TextNode,
    value::{PlainValue, Value},
};

/// Node arena for a single document.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    entries: HashMap<NodeId, NodeEntry>,
}

impl NodeStore {
    /// Creates a store holding only an empty root map.
    pub fn with_root() -> Self {
        let mut entries = HashMap::new();
        entries.insert(NodeId::root(), NodeEntry::new(Node::empty(NodeKind::Map)));
        Self { entries }
    }

    /// Adds an empty map that is a root of its own, outside the document
    /// tree. Nothing reachable from it is ever attached.
    pub fn with_private_root(mut self, id: NodeId) -> Self {
        self.entries
            .entry(id)
            .or_insert_with(|| NodeEntry::new(Node::empty(NodeKind::Map)));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.keys()
    }

    /// Adds a new, unattached node.
    pub fn insert(&mut self, id: NodeId, node: Node) -> Result<(), ModelError> {
        if self.entries.contains_key(&id) {
            return Err(ModelError::DuplicateNode { id });
        }
        self.entries.insert(id, NodeEntry::new(node));
        Ok(())
    }

    /// Drops a node from the arena. Children are not touched.
    pub fn remove(&mut self, id: &NodeId) -> Option<NodeEntry> {
        self.entries.remove(id)
    }

    pub fn entry(&self, id: &NodeId) -> Result<&NodeEntry, ModelError> {
        self.entries
            .get(id)
            .ok_or_else(|| ModelError::NodeNotFound { id: id.clone() })
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, ModelError> {
        self.entry(id).map(|e| &e.node)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, ModelError> {
        self.entries
            .get_mut(id)
            .map(|e| &mut e.node)
            .ok_or_else(|| ModelError::NodeNotFound { id: id.clone() })
    }

    pub fn kind(&self, id: &NodeId) -> Result<NodeKind, ModelError> {
        self.node(id).map(Node::kind)
    }

    pub fn map(&self, id: &NodeId) -> Result<&MapNode, ModelError> {
        match self.node(id)? {
            Node::Map(map) => Ok(map),
            other => Err(wrong_kind(id, NodeKind::Map, other)),
        }
    }

    pub fn map_mut(&mut self, id: &NodeId) -> Result<&mut MapNode, ModelError> {
        match self.node_mut(id)? {
            Node::Map(map) => Ok(map),
            other => Err(wrong_kind(id, NodeKind::Map, other)),
        }
    }

    pub fn list(&self, id: &NodeId) -> Result<&ListNode, ModelError> {
        match self.node(id)? {
            Node::List(list) => Ok(list),
            other => Err(wrong_kind(id, NodeKind::List, other)),
        }
    }

    pub fn list_mut(&mut self, id: &NodeId) -> Result<&mut ListNode, ModelError> {
        match self.node_mut(id)? {
            Node::List(list) => Ok(list),
            other => Err(wrong_kind(id, NodeKind::List, other)),
        }
    }

    pub fn text(&self, id: &NodeId) -> Result<&TextNode, ModelError> {
        match self.node(id)? {
            Node::Text(text) => Ok(text),
            other => Err(wrong_kind(id, NodeKind::Text, other)),
        }
    }

    pub fn text_mut(&mut self, id: &NodeId) -> Result<&mut TextNode, ModelError> {
        match self.node_mut(id)? {
            Node::Text(text) => Ok(text),
            other => Err(wrong_kind(id, NodeKind::Text, other)),
        }
    }

    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.entries.get(id).and_then(|e| e.parent.as_ref())
    }

    pub fn set_parent(&mut self, id: &NodeId, parent: Option<NodeId>) -> Result<(), ModelError> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ModelError::NodeNotFound { id: id.clone() })?;
        entry.parent = parent;
        Ok(())
    }

    /// Parent chain from the direct parent up to the topmost ancestor.
    pub fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if chain.contains(parent) {
                break;
            }
            chain.push(parent.clone());
            current = self.parent(parent);
        }
        chain
    }

    /// Returns true if `id` is the root or is reachable from it.
    pub fn is_attached(&self, id: &NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        id.is_root() || self.ancestors(id).last().is_some_and(NodeId::is_root)
    }

    /// Where `child` sits inside its parent.
    pub fn segment_of(&self, child: &NodeId) -> Option<Segment> {
        let parent = self.parent(child)?;
        let is_child = |v: &Value| v.as_node() == Some(child);
        match self.node(parent).ok()? {
            Node::Map(map) => map.find_key(is_child).map(Segment::from),
            Node::List(list) => list.position(is_child).map(Segment::Index),
            Node::Text(_) => None,
        }
    }

    /// Path from the root to `id`, or `None` while it is detached.
    pub fn path_of(&self, id: &NodeId) -> Option<PathBuf> {
        if id.is_root() {
            return self.contains(id).then(PathBuf::new);
        }
        let mut segments = Vec::new();
        let mut current = id.clone();
        while !current.is_root() {
            segments.push(self.segment_of(&current)?);
            current = self.parent(&current)?.clone();
        }
        segments.reverse();
        Some(PathBuf::from_segments(&segments))
    }

    /// `id` and every node below it, parents before children.
    pub fn subtree_ids(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if out.contains(&next) {
                continue;
            }
            if let Ok(node) = self.node(&next) {
                let mut children = node.child_ids();
                children.reverse();
                stack.extend(children);
                out.push(next);
            }
        }
        out
    }

    /// Returns true if `ancestor` is `id` or one of its ancestors.
    pub fn is_within(&self, id: &NodeId, ancestor: &NodeId) -> bool {
        id == ancestor || self.ancestors(id).contains(ancestor)
    }

    /// Deep snapshot of a node.
    pub fn plain(&self, id: &NodeId) -> Result<PlainValue, ModelError> {
        Ok(match self.node(id)? {
            Node::Map(map) => PlainValue::Map(
                map.iter()
                    .map(|(k, v)| (k.to_string(), self.plain_value(v)))
                    .collect(),
            ),
            Node::List(list) => PlainValue::List(list.iter().map(|v| self.plain_value(v)).collect()),
            Node::Text(text) => PlainValue::Text {
                text: text.as_str().to_string(),
                annotations: text.annotations().to_vec(),
            },
        })
    }

    /// Deep snapshot of a value, following node references.
    pub fn plain_value(&self, value: &Value) -> PlainValue {
        match value {
            Value::Null => PlainValue::Null,
            Value::Bool(b) => PlainValue::Bool(*b),
            Value::Number(n) => PlainValue::Number(*n),
            Value::String(s) => PlainValue::String(s.clone()),
            Value::Node(id) => self.plain(id).unwrap_or(PlainValue::Null),
        }
    }
}

fn wrong_kind(id: &NodeId, expected: NodeKind, actual: &Node) -> ModelError {
    ModelError::WrongNodeKind {
        id: id.clone(),
        expected,
        actual: actual.kind(),
    }
}
