//! Document handles: one open, collaboratively shared document.
//!
//! A [`DocumentHandle`] owns the document's node tree, its participant
//! registry and its event bus. All reads and writes go through it:
//!
//! ```
//! use std::sync::Arc;
//! use sharedoc::{
//!     DocumentConfig, DocumentHandle, FixedClock, model::{PlainValue, Value},
//!     participants::ParticipantId,
//! };
//!
//! let me = ParticipantId::parse("alice@example.com")?;
//! let mut doc = DocumentHandle::create("doc-1", me, DocumentConfig::default(), Arc::new(FixedClock::default()));
//!
//! let map = doc.create_map()?;
//! doc.put("mapOne", map.clone())?;
//! doc.map_put(&map, "string", "Hello World")?;
//! doc.put("mapOne.number", 2345)?;
//!
//! assert_eq!(doc.get_value("mapOne.string")?, Some(Value::from("Hello World")));
//! assert_eq!(
//!     doc.get_plain("mapOne")?,
//!     Some(PlainValue::map([("string", PlainValue::from("Hello World")), ("number", PlainValue::from(2345))]))
//! );
//! assert_eq!(doc.take_outbound()?.len(), 3);
//! # Ok::<(), sharedoc::Error>(())
//! ```
//!
//! Locally issued operations on attached nodes are queued for the
//! transport ([`DocumentHandle::take_outbound`]). Records from other
//! replicas come back in through [`DocumentHandle::apply_remote`], which
//! transforms them against everything they had not seen and then applies
//! them through the same code path as local calls.
//!
//! Every handle is its own replica with its own [`ReplicaId`], even when
//! one participant has the document open twice.

pub mod errors;
pub(crate) mod history;
mod state;
mod tombstones;

use std::sync::Arc;

pub use errors::DocumentError;
use history::Integration;
use state::{DocumentState, Outcome};

use crate::{
    Clock, Result,
    config::DocumentConfig,
    events::{
        DiagnosticSink, Diagnostic, Event, ListenerContext, ListenerError, ListenerId, NoOpReason,
        Origin, ParticipantEvent, Scope,
    },
    model::{
        ListNode, MapNode, Node, NodeId, NodeKind, PathBuf, PlainValue, Resolved, Segment, TextNode,
        Value, resolver,
    },
    ops::{ListOp, MapOp, OpValue, Operation, OperationRecord, ParticipantOp, TextOp, VersionVector},
    participants::{ParticipantId, ReplicaId},
    sync::OpStatus,
};

/// Result of applying a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The record changed the document and produced `events` events.
    Applied { events: usize },
    /// The record was absorbed without effect.
    ConcurrentNoOp { reason: NoOpReason },
    /// The record had already been applied.
    Duplicate,
}

impl Applied {
    pub fn is_applied(&self) -> bool {
        matches!(self, Applied::Applied { .. })
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Applied::ConcurrentNoOp { .. })
    }
}

/// Sizes of the bookkeeping a handle keeps for replication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicationStats {
    /// Applied operations retained for peers not heard from yet.
    pub history: usize,
    /// Removed node ids still remembered for late remote records.
    pub tombstones: usize,
    /// Issued records whose delivery status is tracked individually.
    pub tracked_records: usize,
}

/// One open document.
///
/// A handle is single-threaded: reads, writes, remote application and
/// event dispatch all run on the caller's thread, in call order.
#[derive(Debug)]
pub struct DocumentHandle {
    id: String,
    participant: ParticipantId,
    replica: ReplicaId,
    config: DocumentConfig,
    clock: Arc<dyn Clock>,
    state: Option<DocumentState>,
}

impl DocumentHandle {
    /// Creates a new, empty document with `participant` as its only member,
    /// under a freshly generated replica id.
    pub fn create(
        id: impl Into<String>,
        participant: ParticipantId,
        config: DocumentConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::create_with_replica(id, participant, ReplicaId::random(), config, clock)
    }

    /// Like [`create`](Self::create), under a replica id chosen by the
    /// session layer. Two open handles must never share one.
    pub fn create_with_replica(
        id: impl Into<String>,
        participant: ParticipantId,
        replica: ReplicaId,
        config: DocumentConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = id.into();
        tracing::info!(document = %id, participant = %participant, %replica, "create document");
        let state = DocumentState::new(replica.clone(), participant.clone(), &config);
        Self {
            id,
            participant,
            replica,
            config,
            clock,
            state: Some(state),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The participant local operations are attributed to.
    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// The replica this handle issues records and node ids as.
    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    /// Closes the handle. Every later call fails with
    /// [`DocumentError::HandleClosed`].
    ///
    /// Nodes that were created but never attached are dropped.
    pub fn close(&mut self) -> Result<()> {
        let state = self.state.take().ok_or_else(|| self.closed())?;
        let detached = state
            .nodes
            .ids()
            .filter(|id| !id.is_private() && !state.nodes.is_attached(id))
            .count();
        tracing::info!(
            document = %self.id,
            pending = state.outbound.len(),
            detached,
            "close document"
        );
        Ok(())
    }

    fn closed(&self) -> DocumentError {
        DocumentError::HandleClosed {
            id: self.id.clone(),
        }
    }

    fn state(&self) -> Result<&DocumentState> {
        self.state.as_ref().ok_or_else(|| self.closed().into())
    }

    fn state_mut(&mut self) -> Result<&mut DocumentState> {
        match self.state.as_mut() {
            Some(state) => Ok(state),
            None => Err(DocumentError::HandleClosed {
                id: self.id.clone(),
            }
            .into()),
        }
    }

    // ---- node factory -------------------------------------------------

    /// Creates a detached, empty map. Attach it with a put, add or set.
    pub fn create_map(&mut self) -> Result<NodeId> {
        self.create_node(Node::empty(NodeKind::Map))
    }

    /// Creates a detached, empty list.
    pub fn create_list(&mut self) -> Result<NodeId> {
        self.create_node(Node::empty(NodeKind::List))
    }

    /// Creates a detached text node holding `initial`.
    pub fn create_text(&mut self, initial: &str) -> Result<NodeId> {
        self.create_node(Node::Text(TextNode::from(initial)))
    }

    fn create_node(&mut self, node: Node) -> Result<NodeId> {
        let id = self.state_mut()?.create_node(node)?;
        tracing::trace!(document = %self.id, node = %id, "create node");
        Ok(id)
    }

    // ---- reads --------------------------------------------------------

    /// The id of the root map.
    pub fn root(&self) -> NodeId {
        NodeId::root()
    }

    /// Resolves `path` from the root. Missing anywhere along the way is `None`.
    ///
    /// # Errors
    /// Only a malformed path is an error.
    pub fn get(&self, path: &str) -> Result<Option<Resolved>> {
        let path = PathBuf::parse(path)?;
        let state = self.state()?;
        Ok(resolver::resolve(&state.nodes, &NodeId::root(), &path))
    }

    /// Like [`get`](Self::get), returning the stored value itself.
    pub fn get_value(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.get(path)?.map(Resolved::into_value))
    }

    /// Like [`get`](Self::get), returning a deep snapshot.
    pub fn get_plain(&self, path: &str) -> Result<Option<PlainValue>> {
        let Some(resolved) = self.get(path)? else {
            return Ok(None);
        };
        let state = self.state()?;
        Ok(Some(state.nodes.plain_value(&resolved.into_value())))
    }

    /// Presence of `key` directly under the container at `base`.
    pub fn contains(&self, base: &str, key: &str) -> Result<bool> {
        let base = PathBuf::parse(base)?;
        let state = self.state()?;
        Ok(resolver::contains(&state.nodes, &NodeId::root(), &base, key))
    }

    /// Keys of a map, in insertion order.
    pub fn keys(&self, map: &NodeId) -> Result<Vec<String>> {
        Ok(self.map(map)?.keys().map(str::to_string).collect())
    }

    /// Entries of a map or list, or characters of a text.
    pub fn size(&self, node: &NodeId) -> Result<usize> {
        Ok(self.state()?.nodes.node(node)?.len())
    }

    pub fn kind(&self, node: &NodeId) -> Result<NodeKind> {
        self.state()?.kind(node)
    }

    pub fn map(&self, id: &NodeId) -> Result<&MapNode> {
        Ok(self.state()?.nodes.map(id)?)
    }

    pub fn list(&self, id: &NodeId) -> Result<&ListNode> {
        Ok(self.state()?.nodes.list(id)?)
    }

    pub fn text(&self, id: &NodeId) -> Result<&TextNode> {
        Ok(self.state()?.nodes.text(id)?)
    }

    /// Path of a node from the root, or `None` while it is detached.
    pub fn path_of(&self, node: &NodeId) -> Result<Option<PathBuf>> {
        let state = self.state()?;
        state.nodes.entry(node)?;
        Ok(state.nodes.path_of(node))
    }

    pub fn is_attached(&self, node: &NodeId) -> Result<bool> {
        let state = self.state()?;
        state.nodes.entry(node)?;
        Ok(state.nodes.is_attached(node))
    }

    /// The handle participant's private map.
    ///
    /// It lives beside the document root, not under it: nothing stored in
    /// it is shipped to other replicas or shows up in
    /// [`to_plain_value`](Self::to_plain_value). Edit it with the
    /// node-addressed calls; nodes attached to it stay local too.
    pub fn user_object(&self) -> Result<NodeId> {
        Ok(self.state()?.user.clone())
    }

    /// Deep snapshot of the whole document. Private maps are not included.
    pub fn to_plain_value(&self) -> Result<PlainValue> {
        self.node_plain(&NodeId::root())
    }

    /// Deep snapshot of one node.
    pub fn node_plain(&self, id: &NodeId) -> Result<PlainValue> {
        Ok(self.state()?.nodes.plain(id)?)
    }

    // ---- node-addressed mutation --------------------------------------

    /// Sets `key` in a map, replacing and destroying any previous value.
    pub fn map_put(&mut self, map: &NodeId, key: &str, value: impl Into<Value>) -> Result<()> {
        let op = Operation::map(
            map.clone(),
            MapOp::Put {
                key: key.to_string(),
                value: OpValue::Scalar(value.into()),
            },
        );
        self.submit(op).map(|_| ())
    }

    /// Removes `key` from a map. Returns the removed value, or `None` if
    /// the key was absent, in which case nothing happens at all.
    pub fn map_remove(&mut self, map: &NodeId, key: &str) -> Result<Option<PlainValue>> {
        let op = Operation::map(
            map.clone(),
            MapOp::Remove {
                key: key.to_string(),
            },
        );
        Ok(self.submit(op)?.and_then(|event| event.old_value))
    }

    /// Inserts at `index`, shifting later entries up. `index` may equal the length.
    pub fn list_insert(&mut self, list: &NodeId, index: usize, value: impl Into<Value>) -> Result<()> {
        let op = Operation::list(
            list.clone(),
            ListOp::Insert {
                index,
                value: OpValue::Scalar(value.into()),
            },
        );
        self.submit(op).map(|_| ())
    }

    /// Appends to a list and returns the new entry's index.
    pub fn list_add(&mut self, list: &NodeId, value: impl Into<Value>) -> Result<usize> {
        let index = self.size(list)?;
        self.list_insert(list, index, value)?;
        Ok(index)
    }

    /// Replaces the entry at `index`.
    pub fn list_set(&mut self, list: &NodeId, index: usize, value: impl Into<Value>) -> Result<()> {
        let op = Operation::list(
            list.clone(),
            ListOp::Set {
                index,
                value: OpValue::Scalar(value.into()),
            },
        );
        self.submit(op).map(|_| ())
    }

    /// Removes the entry at `index`, shifting later entries down.
    pub fn list_remove(&mut self, list: &NodeId, index: usize) -> Result<PlainValue> {
        let op = Operation::list(list.clone(), ListOp::Remove { index });
        Ok(self
            .submit(op)?
            .and_then(|event| event.old_value)
            .unwrap_or(PlainValue::Null))
    }

    /// Inserts unannotated `text` at character `offset`.
    pub fn text_insert(&mut self, node: &NodeId, offset: usize, text: &str) -> Result<()> {
        let op = Operation::text(
            node.clone(),
            TextOp::Insert {
                offset,
                text: text.to_string(),
            },
        );
        self.submit(op).map(|_| ())
    }

    /// Deletes the characters in `[start, end)` and returns them.
    pub fn text_delete(&mut self, node: &NodeId, start: usize, end: usize) -> Result<String> {
        let op = Operation::text(
            node.clone(),
            TextOp::Delete {
                offset: start,
                len: end.saturating_sub(start),
            },
        );
        if start > end {
            let len = self.size(node)?;
            return Err(crate::model::ModelError::RangeOutOfBounds { start, end, len }.into());
        }
        let removed = self.submit(op)?.and_then(|event| event.old_value);
        Ok(removed
            .and_then(|plain| plain.as_str().map(str::to_string))
            .unwrap_or_default())
    }

    /// Sets `key` to `value` over `[start, end)`; `None` clears it.
    pub fn text_set_annotation(
        &mut self,
        node: &NodeId,
        start: usize,
        end: usize,
        key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        let op = Operation::text(
            node.clone(),
            TextOp::Annotate {
                start,
                end,
                key: key.to_string(),
                value: value.map(str::to_string),
            },
        );
        self.submit(op).map(|_| ())
    }

    // ---- path-addressed mutation --------------------------------------

    /// Writes `value` at `path`.
    ///
    /// The last segment is a key when its parent is a map. When the parent
    /// is a list it is an index: an existing index is replaced and the
    /// index one past the end appends.
    pub fn put(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let (container, segment) = self.locate_parent(path)?;
        match segment {
            Segment::Key(key) => self.map_put(&container, &key, value),
            Segment::Index(index) if index == self.size(&container)? => {
                self.list_insert(&container, index, value)
            }
            Segment::Index(index) => self.list_set(&container, index, value),
        }
    }

    /// Removes the entry at `path` and returns it. A missing map key is `None`.
    pub fn delete(&mut self, path: &str) -> Result<Option<PlainValue>> {
        let (container, segment) = self.locate_parent(path)?;
        match segment {
            Segment::Key(key) => self.map_remove(&container, &key),
            Segment::Index(index) => self.list_remove(&container, index).map(Some),
        }
    }

    fn locate_parent(&self, path: &str) -> Result<(NodeId, Segment)> {
        let path = PathBuf::parse(path)?;
        let state = self.state()?;
        Ok(resolver::locate_parent(&state.nodes, &NodeId::root(), &path)?)
    }

    // ---- participants -------------------------------------------------

    /// Members in the order they joined.
    pub fn participants(&self) -> Result<&[ParticipantId]> {
        Ok(self.state()?.participants.list())
    }

    /// Bumped by every membership change.
    pub fn participants_version(&self) -> Result<u64> {
        Ok(self.state()?.participants.version())
    }

    /// Adds a participant. Returns false, without an event, if it was
    /// already a member.
    pub fn add_participant(&mut self, id: ParticipantId) -> Result<bool> {
        let op = Operation::participants(ParticipantOp::Add(id));
        Ok(self.submit_participants(op)?.is_some())
    }

    /// Removes a participant. Returns false, without an event, if it was
    /// not a member.
    ///
    /// # Errors
    /// The last remaining participant cannot be removed.
    pub fn remove_participant(&mut self, id: &ParticipantId) -> Result<bool> {
        let op = Operation::participants(ParticipantOp::Remove(id.clone()));
        Ok(self.submit_participants(op)?.is_some())
    }

    /// Adds or removes the public participant of this handle's domain.
    pub fn set_public(&mut self, public: bool) -> Result<bool> {
        let everyone = ParticipantId::public(self.participant.domain())?;
        if public {
            self.add_participant(everyone)
        } else {
            self.remove_participant(&everyone)
        }
    }

    /// Returns true if any domain's public participant is a member.
    pub fn is_public(&self) -> Result<bool> {
        Ok(self.state()?.participants.is_public())
    }

    // ---- events -------------------------------------------------------

    /// Registers a listener for data events in `scope`.
    pub fn subscribe<F>(&mut self, scope: Scope, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&Event, &mut ListenerContext) -> std::result::Result<(), ListenerError> + 'static,
    {
        Ok(self.state_mut()?.bus.subscribe(scope, listener))
    }

    /// Registers a listener for participant changes.
    pub fn subscribe_participants<F>(&mut self, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&ParticipantEvent, &mut ListenerContext) -> std::result::Result<(), ListenerError>
            + 'static,
    {
        Ok(self.state_mut()?.bus.subscribe_participants(listener))
    }

    /// Returns false if the listener was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> Result<bool> {
        Ok(self.state_mut()?.bus.unsubscribe(id))
    }

    /// Installs the sink for listener failures and concurrent no-ops.
    pub fn set_diagnostic_sink(&mut self, sink: impl DiagnosticSink + 'static) -> Result<()> {
        self.state_mut()?.bus.set_sink(Box::new(sink));
        Ok(())
    }

    /// Retained data events, oldest first.
    pub fn events(&self) -> Result<impl Iterator<Item = &Event>> {
        Ok(self.state()?.bus.events())
    }

    /// Retained participant events, oldest first.
    pub fn participant_events(&self) -> Result<impl Iterator<Item = &ParticipantEvent>> {
        Ok(self.state()?.bus.participant_events())
    }

    // ---- replication --------------------------------------------------

    /// Operations applied at this replica, per issuing replica.
    pub fn version(&self) -> Result<VersionVector> {
        Ok(self.state()?.history.applied().clone())
    }

    pub fn replication_stats(&self) -> Result<ReplicationStats> {
        let state = self.state()?;
        Ok(ReplicationStats {
            history: state.history.log_len(),
            tombstones: state.tombstones.len(),
            tracked_records: state.outbound.tracked(),
        })
    }

    /// Hands every queued local record to the transport.
    pub fn take_outbound(&mut self) -> Result<Vec<OperationRecord>> {
        Ok(self.state_mut()?.outbound.drain())
    }

    /// Marks a drained record as delivered.
    pub fn acknowledge(&mut self, seq: u64) -> Result<bool> {
        Ok(self.state_mut()?.outbound.acknowledge(seq))
    }

    pub fn operation_status(&self, seq: u64) -> Result<Option<OpStatus>> {
        Ok(self.state()?.outbound.status(seq))
    }

    /// Applies a record issued by another replica.
    ///
    /// Records from one replica must arrive in the order they were issued.
    /// A record whose target was removed concurrently, or that lost a
    /// last-writer-wins race, is absorbed: it returns
    /// [`Applied::ConcurrentNoOp`] rather than an error.
    ///
    /// # Errors
    /// Records out of sequence, records that predate the retained history
    /// and records that do not fit the document at all (unknown nodes,
    /// indices past the end) are rejected and leave the document unchanged.
    pub fn apply_remote(&mut self, record: OperationRecord) -> Result<Applied> {
        let tie_break = self.config.insert_tie_break;
        let report_noops = self.config.report_concurrent_noops;
        let document = self.id.clone();
        let state = self.state_mut()?;

        let prepared = match state.history.integrate(&record, tie_break)? {
            Integration::Duplicate => {
                tracing::debug!(%document, replica = %record.replica, seq = record.seq, "duplicate record");
                return Ok(Applied::Duplicate);
            }
            Integration::Ready(prepared) => prepared,
        };
        if prepared.ops != [record.op.clone()] {
            tracing::debug!(
                %document,
                replica = %record.replica,
                seq = record.seq,
                from = %record.op,
                into = ?prepared.ops.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "transformed remote operation"
            );
        }

        let origin = Origin::Remote {
            author: record.author.clone(),
        };
        let mut absorbed = if prepared.ops.is_empty() {
            Some(NoOpReason::Superseded)
        } else if state.targets_removed(&prepared.ops) {
            Some(NoOpReason::TargetRemoved)
        } else {
            None
        };

        let mut outcomes = Vec::new();
        let mut applied = Vec::new();
        if absorbed.is_none() {
            state.check_parts(&prepared.ops)?;
            for op in &prepared.ops {
                match state.apply(op, &origin)? {
                    Outcome::Absorbed(reason) => absorbed = Some(reason),
                    Outcome::Unchanged => absorbed = Some(NoOpReason::Superseded),
                    outcome => {
                        applied.push(op.clone());
                        outcomes.push(outcome);
                    }
                }
            }
        }
        if applied.is_empty() {
            state.bury(&record.op);
        }
        state.history.commit(prepared, applied);
        state.settle_tombstones();

        if outcomes.is_empty() {
            let reason = absorbed.unwrap_or(NoOpReason::Superseded);
            tracing::debug!(%document, replica = %record.replica, seq = record.seq, ?reason, "concurrent no-op");
            if report_noops {
                state.bus.report(Diagnostic::ConcurrentNoOp {
                    author: record.author.clone(),
                    seq: record.seq,
                    operation: record.op.to_string(),
                    reason,
                });
            }
            return Ok(Applied::ConcurrentNoOp { reason });
        }

        tracing::debug!(%document, replica = %record.replica, seq = record.seq, op = record.op.name(), "applied remote operation");
        let events = outcomes.len();
        for outcome in outcomes {
            publish(state, outcome);
        }
        Ok(Applied::Applied { events })
    }

    /// Applies a local operation, queues it if it is shared and publishes
    /// its event. Returns the data event, if any.
    fn submit(&mut self, op: Operation) -> Result<Option<Event>> {
        match self.submit_outcome(op)? {
            Outcome::Data(event) => Ok(Some(event)),
            _ => Ok(None),
        }
    }

    fn submit_participants(&mut self, op: Operation) -> Result<Option<ParticipantEvent>> {
        match self.submit_outcome(op)? {
            Outcome::Participant(event) => Ok(Some(event)),
            _ => Ok(None),
        }
    }

    fn submit_outcome(&mut self, op: Operation) -> Result<Outcome> {
        let me = self.participant.clone();
        let replica = self.replica.clone();
        let clock = Arc::clone(&self.clock);
        let document = self.id.clone();
        let state = self.state_mut()?;

        let outcome = state.apply(&op, &Origin::Local)?;
        if matches!(outcome, Outcome::Unchanged | Outcome::Absorbed(_)) {
            tracing::trace!(%document, %op, "local no-op");
            return Ok(outcome);
        }

        if state.is_shared(&op) {
            let shipped = state.shippable(&op)?;
            let (seq, context) = state.history.record_local(vec![shipped.clone()]);
            tracing::trace!(%document, seq, %op, "local mutation");
            state.outbound.enqueue(OperationRecord {
                author: me,
                replica,
                seq,
                context,
                timestamp: clock.now_rfc3339(),
                op: shipped,
            });
        } else {
            tracing::trace!(%document, %op, "local mutation on detached node");
        }
        state.settle_tombstones();

        Ok(publish(state, outcome))
    }
}

/// Publishes the event of an outcome and returns it with its sequence number.
fn publish(state: &mut DocumentState, outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Data(mut event) => {
            event.seq = state.bus.publish(event.clone());
            Outcome::Data(event)
        }
        Outcome::Participant(mut event) => {
            event.seq = state.bus.publish_participant(event.clone());
            Outcome::Participant(event)
        }
        other => other,
    }
}
