//! The mutable state behind an open handle and the single code path that
//! applies an [`Operation`] to it.
//!
//! Local calls and transformed remote records both end up in
//! [`DocumentState::apply`]. Every operation is checked completely before
//! the first change is made, so a failed operation leaves no trace.

use super::{history::History, tombstones::Tombstones};
use crate::{
    Result,
    config::DocumentConfig,
    events::{Event, EventBus, EventKind, NoOpReason, Origin, ParticipantEvent, ParticipantEventKind},
    model::{
        ListNode, MapNode, ModelError, Node, NodeId, NodeKind, NodeStore, PlainValue, Segment,
        TextNode, Value, map::validate_key,
    },
    ops::{ListOp, MapOp, NodeSnapshot, OpValue, Operation, ParticipantOp, SnapshotContent, TextOp},
    participants::{ParticipantError, ParticipantId, ParticipantRegistry, ReplicaId},
    sync::OutboundQueue,
};

/// What applying one operation did.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    /// The data tree changed.
    Data(Event),
    /// The participant registry changed.
    Participant(ParticipantEvent),
    /// Nothing to do: removing an absent key, an empty edit, or an
    /// idempotent membership change.
    Unchanged,
    /// A remote operation that cannot take effect.
    Absorbed(NoOpReason),
}

#[derive(Debug)]
pub(crate) struct DocumentState {
    pub nodes: NodeStore,
    pub tombstones: Tombstones,
    pub participants: ParticipantRegistry,
    pub bus: EventBus,
    pub outbound: OutboundQueue,
    pub history: History,
    /// The creator's private map.
    pub user: NodeId,
    replica: ReplicaId,
    next_node: u64,
}

impl DocumentState {
    pub fn new(replica: ReplicaId, creator: ParticipantId, config: &DocumentConfig) -> Self {
        let user = NodeId::private(creator.as_str());
        Self {
            nodes: NodeStore::with_root().with_private_root(user.clone()),
            tombstones: Tombstones::default(),
            participants: ParticipantRegistry::new(creator.clone()),
            bus: EventBus::new(config.event_log_capacity),
            outbound: OutboundQueue::new(),
            history: History::new(replica.clone(), creator, config.history_capacity),
            user,
            replica,
            next_node: 0,
        }
    }

    /// Creates a detached node with a fresh id.
    pub fn create_node(&mut self, node: Node) -> Result<NodeId> {
        self.next_node += 1;
        let id = NodeId::issued(self.replica.as_str(), self.next_node);
        self.nodes.insert(id.clone(), node)?;
        Ok(id)
    }

    /// Tags tombstones buried since the last call with the current version
    /// and releases those every known peer has applied.
    pub fn settle_tombstones(&mut self) {
        self.tombstones.seal(self.history.applied());
        let history = &self.history;
        let released = self
            .tombstones
            .release(|version| history.seen_by_every_peer(version));
        if released > 0 {
            tracing::trace!(released, remaining = self.tombstones.len(), "released tombstones");
        }
    }

    pub fn apply(&mut self, op: &Operation, origin: &Origin) -> Result<Outcome> {
        match op {
            Operation::Map { target, op } => self.apply_map(target, op, origin),
            Operation::List { target, op } => self.apply_list(target, op, origin),
            Operation::Text { target, op } => self.apply_text(target, op, origin),
            Operation::Participants { op } => self.apply_participants(op, origin),
        }
    }

    /// Returns true if the operation's effect must reach other replicas.
    ///
    /// Changes inside a detached subtree stay local; they travel with the
    /// snapshot shipped when the subtree is attached.
    pub fn is_shared(&self, op: &Operation) -> bool {
        op.target().is_none_or(|target| self.nodes.is_attached(target))
    }

    /// Returns true if any target of `ops` was destroyed here.
    pub fn targets_removed(&self, ops: &[Operation]) -> bool {
        ops.iter()
            .filter_map(Operation::target)
            .any(|target| self.tombstones.contains(target))
    }

    /// Checks a multi-part remote operation against the current state.
    ///
    /// Only text operations split. Deletion pieces run from the highest
    /// offset down, so every piece that fits now still fits when its turn
    /// comes.
    pub fn check_parts(&self, ops: &[Operation]) -> Result<()> {
        for op in ops {
            if let Operation::Text { target, op } = op {
                let len = self.nodes.text(target)?.len();
                let (start, end) = match op {
                    TextOp::Insert { offset, .. } => (*offset, *offset),
                    TextOp::Delete { offset, len: count } => (*offset, offset + count),
                    TextOp::Annotate { start, end, .. } => (*start, *end),
                };
                if start > end || end > len {
                    return Err(ModelError::RangeOutOfBounds { start, end, len }.into());
                }
            }
        }
        Ok(())
    }

    /// Rewrites local node references in `op` as full snapshots.
    pub fn shippable(&self, op: &Operation) -> Result<Operation> {
        let ship = |value: &OpValue| -> Result<OpValue> {
            match value {
                OpValue::Scalar(Value::Node(id)) => Ok(OpValue::Node(self.snapshot(id)?)),
                other => Ok(other.clone()),
            }
        };
        Ok(match op {
            Operation::Map {
                target,
                op: MapOp::Put { key, value },
            } => Operation::map(
                target.clone(),
                MapOp::Put {
                    key: key.clone(),
                    value: ship(value)?,
                },
            ),
            Operation::List {
                target,
                op: ListOp::Insert { index, value },
            } => Operation::list(
                target.clone(),
                ListOp::Insert {
                    index: *index,
                    value: ship(value)?,
                },
            ),
            Operation::List {
                target,
                op: ListOp::Set { index, value },
            } => Operation::list(
                target.clone(),
                ListOp::Set {
                    index: *index,
                    value: ship(value)?,
                },
            ),
            other => other.clone(),
        })
    }

    /// Full content of a node and everything below it.
    pub fn snapshot(&self, id: &NodeId) -> Result<NodeSnapshot> {
        let content = match self.nodes.node(id)? {
            Node::Map(map) => SnapshotContent::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.to_string(), self.snapshot_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            Node::List(list) => SnapshotContent::List(
                list.iter()
                    .map(|v| self.snapshot_value(v))
                    .collect::<Result<_>>()?,
            ),
            Node::Text(text) => SnapshotContent::Text {
                text: text.as_str().to_string(),
                annotations: text.annotations().to_vec(),
            },
        };
        Ok(NodeSnapshot {
            id: id.clone(),
            content,
        })
    }

    fn snapshot_value(&self, value: &Value) -> Result<OpValue> {
        match value {
            Value::Node(id) => Ok(OpValue::Node(self.snapshot(id)?)),
            scalar => Ok(OpValue::Scalar(scalar.clone())),
        }
    }

    /// Marks every node a dropped operation would have created as gone.
    pub fn bury(&mut self, op: &Operation) {
        let value = match op {
            Operation::Map {
                op: MapOp::Put { value, .. },
                ..
            }
            | Operation::List {
                op: ListOp::Insert { value, .. } | ListOp::Set { value, .. },
                ..
            } => value,
            _ => return,
        };
        if let OpValue::Node(snapshot) = value {
            self.tombstones.extend(snapshot.ids());
        }
    }

    fn apply_map(&mut self, target: &NodeId, op: &MapOp, origin: &Origin) -> Result<Outcome> {
        self.nodes.map(target)?;
        match op {
            MapOp::Put { key, value } => {
                validate_key(key)?;
                let value = self.prepare(target, value)?;
                let new_value = self.nodes.plain_value(&value);
                let previous = self.nodes.map_mut(target)?.insert(key.clone(), value.clone());
                self.adopt(target, &value)?;
                let kind = if previous.is_some() {
                    EventKind::Changed
                } else {
                    EventKind::Added
                };
                let old_value = previous.map(|old| self.discard(old));
                Ok(Outcome::Data(self.event(
                    kind,
                    target,
                    Segment::Key(key.clone()),
                    None,
                    old_value,
                    Some(new_value),
                    origin,
                )))
            }
            MapOp::Remove { key } => {
                let Some(old) = self.nodes.map_mut(target)?.remove(key) else {
                    return Ok(match origin {
                        Origin::Local => Outcome::Unchanged,
                        Origin::Remote { .. } => Outcome::Absorbed(NoOpReason::Superseded),
                    });
                };
                let old_value = self.discard(old);
                Ok(Outcome::Data(self.event(
                    EventKind::Removed,
                    target,
                    Segment::Key(key.clone()),
                    None,
                    Some(old_value),
                    None,
                    origin,
                )))
            }
        }
    }

    fn apply_list(&mut self, target: &NodeId, op: &ListOp, origin: &Origin) -> Result<Outcome> {
        let len = self.nodes.list(target)?.len();
        let check = |index: usize, limit: usize| {
            if index < limit {
                Ok(())
            } else {
                Err(ModelError::IndexOutOfBounds { index, len })
            }
        };
        match op {
            ListOp::Insert { index, value } => {
                check(*index, len + 1)?;
                let value = self.prepare(target, value)?;
                let new_value = self.nodes.plain_value(&value);
                self.nodes.list_mut(target)?.insert(*index, value.clone())?;
                self.adopt(target, &value)?;
                Ok(Outcome::Data(self.event(
                    EventKind::Added,
                    target,
                    Segment::Index(*index),
                    None,
                    None,
                    Some(new_value),
                    origin,
                )))
            }
            ListOp::Set { index, value } => {
                check(*index, len)?;
                let value = self.prepare(target, value)?;
                let new_value = self.nodes.plain_value(&value);
                let old = self.nodes.list_mut(target)?.set(*index, value.clone())?;
                self.adopt(target, &value)?;
                let old_value = self.discard(old);
                Ok(Outcome::Data(self.event(
                    EventKind::Changed,
                    target,
                    Segment::Index(*index),
                    None,
                    Some(old_value),
                    Some(new_value),
                    origin,
                )))
            }
            ListOp::Remove { index } => {
                check(*index, len)?;
                let old = self.nodes.list_mut(target)?.remove(*index)?;
                let old_value = self.discard(old);
                Ok(Outcome::Data(self.event(
                    EventKind::Removed,
                    target,
                    Segment::Index(*index),
                    None,
                    Some(old_value),
                    None,
                    origin,
                )))
            }
        }
    }

    fn apply_text(&mut self, target: &NodeId, op: &TextOp, origin: &Origin) -> Result<Outcome> {
        let text = self.nodes.text_mut(target)?;
        let (kind, offset, range, old_value, new_value) = match op {
            TextOp::Insert { offset, text: inserted } => {
                if inserted.is_empty() {
                    text.insert(*offset, "")?;
                    return Ok(Outcome::Unchanged);
                }
                text.insert(*offset, inserted)?;
                let end = offset + inserted.chars().count();
                (
                    EventKind::Added,
                    *offset,
                    *offset..end,
                    None,
                    Some(PlainValue::String(inserted.clone())),
                )
            }
            TextOp::Delete { offset, len } => {
                let removed = text.delete(*offset, offset + len)?;
                if *len == 0 {
                    return Ok(Outcome::Unchanged);
                }
                (
                    EventKind::Removed,
                    *offset,
                    *offset..offset + len,
                    Some(PlainValue::String(removed)),
                    None,
                )
            }
            TextOp::Annotate {
                start,
                end,
                key,
                value,
            } => {
                text.set_annotation(*start, *end, key, value.as_deref())?;
                if start == end {
                    return Ok(Outcome::Unchanged);
                }
                let value = value.clone().map_or(PlainValue::Null, PlainValue::String);
                (
                    EventKind::Changed,
                    *start,
                    *start..*end,
                    None,
                    Some(PlainValue::map([(key.clone(), value)])),
                )
            }
        };
        Ok(Outcome::Data(self.event(
            kind,
            target,
            Segment::Index(offset),
            Some(range),
            old_value,
            new_value,
            origin,
        )))
    }

    fn apply_participants(&mut self, op: &ParticipantOp, origin: &Origin) -> Result<Outcome> {
        let (kind, changed) = match op {
            ParticipantOp::Add(id) => (ParticipantEventKind::Added, self.participants.add(id.clone())),
            ParticipantOp::Remove(id) => match self.participants.remove(id) {
                Ok(changed) => (ParticipantEventKind::Removed, changed),
                Err(ParticipantError::LastParticipant { .. }) if !origin.is_local() => {
                    return Ok(Outcome::Absorbed(NoOpReason::LastParticipant));
                }
                Err(err) => return Err(err.into()),
            },
        };
        if !changed {
            return Ok(Outcome::Unchanged);
        }
        Ok(Outcome::Participant(ParticipantEvent {
            seq: 0,
            kind,
            participant: op.participant().clone(),
            origin: origin.clone(),
        }))
    }

    /// Turns an operation value into a value ready to store under `container`.
    ///
    /// A snapshot is materialized as new detached nodes; a reference to an
    /// existing node is checked against the single-parent tree shape.
    fn prepare(&mut self, container: &NodeId, value: &OpValue) -> Result<Value> {
        match value {
            OpValue::Scalar(Value::Node(id)) => {
                self.check_attachable(container, id)?;
                Ok(Value::Node(id.clone()))
            }
            OpValue::Scalar(scalar) => Ok(scalar.clone()),
            OpValue::Node(snapshot) => {
                for id in snapshot.ids() {
                    if self.nodes.contains(&id) || self.tombstones.contains(&id) {
                        return Err(ModelError::DuplicateNode { id }.into());
                    }
                }
                self.materialize(snapshot, None)?;
                Ok(Value::Node(snapshot.id.clone()))
            }
        }
    }

    fn check_attachable(&self, container: &NodeId, id: &NodeId) -> Result<()> {
        if id.is_root() || id.is_private() {
            return Err(ModelError::RootNotAttachable.into());
        }
        let entry = self.nodes.entry(id)?;
        if let Some(parent) = &entry.parent {
            return Err(ModelError::AlreadyAttached {
                id: id.clone(),
                parent: parent.clone(),
            }
            .into());
        }
        if self.nodes.is_within(container, id) {
            return Err(ModelError::CycleDetected { id: id.clone() }.into());
        }
        Ok(())
    }

    fn materialize(&mut self, snapshot: &NodeSnapshot, parent: Option<NodeId>) -> Result<()> {
        let node = match &snapshot.content {
            SnapshotContent::Map(entries) => {
                let mut map = MapNode::new();
                for (key, value) in entries {
                    let value = self.materialize_value(value, &snapshot.id)?;
                    map.insert(key.clone(), value);
                }
                Node::Map(map)
            }
            SnapshotContent::List(items) => {
                let mut list = ListNode::new();
                for item in items {
                    list.push(self.materialize_value(item, &snapshot.id)?);
                }
                Node::List(list)
            }
            SnapshotContent::Text { text, annotations } => {
                let mut node = TextNode::from(text.as_str());
                for a in annotations {
                    node.set_annotation(a.start, a.end, &a.key, Some(a.value.as_str()))?;
                }
                Node::Text(node)
            }
        };
        self.nodes.insert(snapshot.id.clone(), node)?;
        self.nodes.set_parent(&snapshot.id, parent)?;
        Ok(())
    }

    fn materialize_value(&mut self, value: &OpValue, parent: &NodeId) -> Result<Value> {
        match value {
            OpValue::Scalar(scalar) => Ok(scalar.clone()),
            OpValue::Node(child) => {
                self.materialize(child, Some(parent.clone()))?;
                Ok(Value::Node(child.id.clone()))
            }
        }
    }

    fn adopt(&mut self, container: &NodeId, value: &Value) -> Result<()> {
        if let Value::Node(id) = value {
            self.nodes.set_parent(id, Some(container.clone()))?;
        }
        Ok(())
    }

    /// Snapshots a value leaving the tree and destroys its subtree.
    fn discard(&mut self, value: Value) -> PlainValue {
        let plain = self.nodes.plain_value(&value);
        if let Value::Node(id) = value {
            for gone in self.nodes.subtree_ids(&id) {
                self.nodes.remove(&gone);
                self.tombstones.insert(gone);
            }
        }
        plain
    }

    #[allow(clippy::too_many_arguments)]
    fn event(
        &self,
        kind: EventKind,
        node: &NodeId,
        target: Segment,
        range: Option<std::ops::Range<usize>>,
        old_value: Option<PlainValue>,
        new_value: Option<PlainValue>,
        origin: &Origin,
    ) -> Event {
        Event {
            seq: 0,
            kind,
            node: node.clone(),
            path: self.nodes.path_of(node),
            target,
            range,
            old_value,
            new_value,
            origin: origin.clone(),
            ancestors: self.nodes.ancestors(node),
        }
    }

    /// Kind of `id`, or a usage error for an id this document never had.
    pub fn kind(&self, id: &NodeId) -> Result<NodeKind> {
        Ok(self.nodes.kind(id)?)
    }
}
