//! Operation records: the unit of change exchanged between replicas.
//!
//! Every mutation of a document is expressed as one [`Operation`] against a
//! target node. Operations are small, independently appliable and carry
//! only positions and values, never references into a particular replica's
//! memory, so they can be serialized, transformed and replayed.
//!
//! A structural node travels by value: attaching a node ships a
//! [`NodeSnapshot`] of its whole subtree, and the receiving replica
//! materializes nodes with the same ids.

pub mod transform;

use std::{collections::BTreeMap, fmt};

use crate::{
    model::{Annotation, NodeId, NodeKind, Value},
    participants::{ParticipantId, ReplicaId},
};

pub use transform::{Side, transform, transform_sequences};

/// A value carried by an operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpValue {
    Scalar(Value),
    Node(NodeSnapshot),
}

impl OpValue {
    pub fn as_node(&self) -> Option<&NodeSnapshot> {
        match self {
            OpValue::Node(snapshot) => Some(snapshot),
            OpValue::Scalar(_) => None,
        }
    }
}

impl From<Value> for OpValue {
    fn from(value: Value) -> Self {
        OpValue::Scalar(value)
    }
}

/// Full content of a node and its descendants, with their ids.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub content: SnapshotContent,
}

impl NodeSnapshot {
    pub fn kind(&self) -> NodeKind {
        match self.content {
            SnapshotContent::Map(_) => NodeKind::Map,
            SnapshotContent::List(_) => NodeKind::List,
            SnapshotContent::Text { .. } => NodeKind::Text,
        }
    }

    /// Ids of this node and every node nested inside it.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.id.clone()];
        let nested: Box<dyn Iterator<Item = &OpValue>> = match &self.content {
            SnapshotContent::Map(entries) => Box::new(entries.iter().map(|(_, v)| v)),
            SnapshotContent::List(items) => Box::new(items.iter()),
            SnapshotContent::Text { .. } => Box::new(std::iter::empty()),
        };
        for value in nested {
            if let OpValue::Node(child) = value {
                ids.extend(child.ids());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotContent {
    Map(Vec<(String, OpValue)>),
    List(Vec<OpValue>),
    Text {
        text: String,
        annotations: Vec<Annotation>,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapOp {
    Put { key: String, value: OpValue },
    Remove { key: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListOp {
    Insert { index: usize, value: OpValue },
    Set { index: usize, value: OpValue },
    Remove { index: usize },
}

/// Text edits. Offsets and lengths count characters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextOp {
    Insert {
        offset: usize,
        text: String,
    },
    Delete {
        offset: usize,
        len: usize,
    },
    /// `value: None` clears `key` over the range.
    Annotate {
        start: usize,
        end: usize,
        key: String,
        value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantOp {
    Add(ParticipantId),
    Remove(ParticipantId),
}

impl ParticipantOp {
    pub fn participant(&self) -> &ParticipantId {
        match self {
            ParticipantOp::Add(id) | ParticipantOp::Remove(id) => id,
        }
    }
}

/// One atomic mutation of a document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum Operation {
    Map { target: NodeId, op: MapOp },
    List { target: NodeId, op: ListOp },
    Text { target: NodeId, op: TextOp },
    Participants { op: ParticipantOp },
}

impl Operation {
    /// The node this operation mutates, if it targets the data tree.
    pub fn target(&self) -> Option<&NodeId> {
        match self {
            Operation::Map { target, .. }
            | Operation::List { target, .. }
            | Operation::Text { target, .. } => Some(target),
            Operation::Participants { .. } => None,
        }
    }

    /// Short name used in logs and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Map { op: MapOp::Put { .. }, .. } => "map.put",
            Operation::Map { op: MapOp::Remove { .. }, .. } => "map.remove",
            Operation::List { op: ListOp::Insert { .. }, .. } => "list.insert",
            Operation::List { op: ListOp::Set { .. }, .. } => "list.set",
            Operation::List { op: ListOp::Remove { .. }, .. } => "list.remove",
            Operation::Text { op: TextOp::Insert { .. }, .. } => "text.insert",
            Operation::Text { op: TextOp::Delete { .. }, .. } => "text.delete",
            Operation::Text { op: TextOp::Annotate { .. }, .. } => "text.annotate",
            Operation::Participants { op: ParticipantOp::Add(_) } => "participants.add",
            Operation::Participants { op: ParticipantOp::Remove(_) } => "participants.remove",
        }
    }

    pub fn map(target: NodeId, op: MapOp) -> Self {
        Operation::Map { target, op }
    }

    pub fn list(target: NodeId, op: ListOp) -> Self {
        Operation::List { target, op }
    }

    pub fn text(target: NodeId, op: TextOp) -> Self {
        Operation::Text { target, op }
    }

    pub fn participants(op: ParticipantOp) -> Self {
        Operation::Participants { op }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Map { target, op } => match op {
                MapOp::Put { key, .. } => write!(f, "{target}: put {key}"),
                MapOp::Remove { key } => write!(f, "{target}: remove {key}"),
            },
            Operation::List { target, op } => match op {
                ListOp::Insert { index, .. } => write!(f, "{target}: insert @{index}"),
                ListOp::Set { index, .. } => write!(f, "{target}: set @{index}"),
                ListOp::Remove { index } => write!(f, "{target}: remove @{index}"),
            },
            Operation::Text { target, op } => match op {
                TextOp::Insert { offset, text } => write!(f, "{target}: insert {text:?} @{offset}"),
                TextOp::Delete { offset, len } => write!(f, "{target}: delete {offset}..{}", offset + len),
                TextOp::Annotate { start, end, key, value } => match value {
                    Some(value) => write!(f, "{target}: annotate {start}..{end} {key}={value}"),
                    None => write!(f, "{target}: clear {start}..{end} {key}"),
                },
            },
            Operation::Participants { op } => match op {
                ParticipantOp::Add(id) => write!(f, "participants: add {id}"),
                ParticipantOp::Remove(id) => write!(f, "participants: remove {id}"),
            },
        }
    }
}

/// Number of operations seen from each replica.
///
/// Attached to every record as the context it was issued in: the receiver
/// transforms the record against exactly the operations this vector does
/// not cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct VersionVector(BTreeMap<ReplicaId, u64>);

impl VersionVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations seen from `replica`.
    pub fn get(&self, replica: &ReplicaId) -> u64 {
        self.0.get(replica).copied().unwrap_or(0)
    }

    /// Records one more operation from `replica` and returns its sequence number.
    pub fn increment(&mut self, replica: &ReplicaId) -> u64 {
        let seq = self.0.entry(replica.clone()).or_insert(0);
        *seq += 1;
        *seq
    }

    /// Raises the count for `replica` to at least `seq`.
    pub fn observe(&mut self, replica: &ReplicaId, seq: u64) {
        let current = self.0.entry(replica.clone()).or_insert(0);
        *current = (*current).max(seq);
    }

    /// Returns true if operation `seq` from `replica` is covered.
    pub fn covers(&self, replica: &ReplicaId, seq: u64) -> bool {
        self.get(replica) >= seq
    }

    /// Returns true if every count in `other` is covered by `self`.
    pub fn dominates(&self, other: &VersionVector) -> bool {
        other.0.iter().all(|(replica, seq)| self.covers(replica, *seq))
    }

    /// Total number of operations counted.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, u64)> {
        self.0.iter().map(|(r, s)| (r, *s))
    }
}

/// An operation as exchanged with the transport.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OperationRecord {
    /// Participant that issued the operation.
    pub author: ParticipantId,
    /// Handle the operation was issued from.
    pub replica: ReplicaId,
    /// 1-based sequence number within the replica's operations on this document.
    pub seq: u64,
    /// Operations the replica had applied when issuing this one.
    pub context: VersionVector,
    /// RFC3339 issue time on the author's clock.
    pub timestamp: String,
    pub op: Operation,
}
