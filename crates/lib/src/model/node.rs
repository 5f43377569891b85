//! Node identity and the closed set of structural node kinds.
//!
//! A document owns its nodes in an arena keyed by [`NodeId`]. Containers
//! refer to children through [`Value::Node`](super::Value::Node) and every
//! child records its single parent, so the tree can be walked both ways
//! without shared ownership.

use std::fmt;

use super::{list::ListNode, map::MapNode, text::TextNode};
use crate::constants::{ADDRESS_SEPARATOR, NODE_ID_SEPARATOR, PRIVATE_NODE_PREFIX, ROOT_NODE_ID};

/// Identifier of a structural node, unique within its document.
///
/// Ids are minted as `<replica>:<counter>` by the handle that created the
/// node, which keeps them unique across replicas without coordination.
/// The root map of every document shares the fixed id [`ROOT_NODE_ID`];
/// a participant's private map is `user:<address>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id of the `counter`th node created by `issuer`.
    pub fn issued(issuer: &str, counter: u64) -> Self {
        Self(format!("{issuer}{NODE_ID_SEPARATOR}{counter}"))
    }

    /// The id of every document's root map.
    pub fn root() -> Self {
        Self(ROOT_NODE_ID.to_string())
    }

    /// Returns true if this is the root map id.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_NODE_ID
    }

    /// The id of the private map owned by the participant at `address`.
    pub fn private(address: &str) -> Self {
        Self(format!("{PRIVATE_NODE_PREFIX}{NODE_ID_SEPARATOR}{address}"))
    }

    /// Returns true for a participant's private map.
    ///
    /// Issued ids end in a counter, so they never carry an address.
    pub fn is_private(&self) -> bool {
        self.0
            .strip_prefix(PRIVATE_NODE_PREFIX)
            .and_then(|rest| rest.strip_prefix(NODE_ID_SEPARATOR))
            .is_some_and(|owner| owner.contains(ADDRESS_SEPARATOR))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The kind of a structural node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Map,
    List,
    Text,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Map => f.write_str("map"),
            NodeKind::List => f.write_str("list"),
            NodeKind::Text => f.write_str("text"),
        }
    }
}

/// A structural node: one of the three container types.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Map(MapNode),
    List(ListNode),
    Text(TextNode),
}

impl Node {
    /// Creates an empty node of the given kind.
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Map => Node::Map(MapNode::new()),
            NodeKind::List => Node::List(ListNode::new()),
            NodeKind::Text => Node::Text(TextNode::new()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Map(_) => NodeKind::Map,
            Node::List(_) => NodeKind::List,
            Node::Text(_) => NodeKind::Text,
        }
    }

    /// Number of entries, items or characters.
    pub fn len(&self) -> usize {
        match self {
            Node::Map(map) => map.len(),
            Node::List(list) => list.len(),
            Node::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the structural nodes directly referenced by this node.
    pub fn child_ids(&self) -> Vec<NodeId> {
        match self {
            Node::Map(map) => map
                .values()
                .filter_map(|v| v.as_node().cloned())
                .collect(),
            Node::List(list) => list
                .iter()
                .filter_map(|v| v.as_node().cloned())
                .collect(),
            Node::Text(_) => Vec::new(),
        }
    }
}

/// Arena record for one node: the node itself plus its parent link.
///
/// `parent` is `None` for the root and for nodes that were created but
/// not yet attached. Removed nodes leave the arena entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
    pub node: Node,
    pub parent: Option<NodeId>,
}

impl NodeEntry {
    pub fn new(node: Node) -> Self {
        Self { node, parent: None }
    }
}
