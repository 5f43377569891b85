//! Applied-operation history and per-peer transform bridges.
//!
//! A remote record must be transformed against every operation this replica
//! applied that the record's replica had not seen when issuing it. For each
//! peer the history keeps a *bridge*: exactly those operations, already
//! transformed to sit after everything that peer has sent so far. An
//! incoming record is folded through its replica's bridge, which at the
//! same time moves the bridge past the record.
//!
//! The log that seeds bridges for peers not heard from yet is pruned from
//! the front once every known peer has applied its entries.
//!
//! This is exact when two replicas exchange records directly. With more
//! replicas, records have to flow through a relay that re-issues them, or
//! a bridge can see its entries acknowledged out of order.

use std::collections::{HashMap, VecDeque};

use super::errors::DocumentError;
use crate::{
    config::TieBreak,
    ops::{Operation, OperationRecord, VersionVector, transform_sequences},
    participants::{ParticipantId, ReplicaId},
};

/// One applied record, as it was applied at this replica.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LogEntry {
    pub author: ParticipantId,
    pub replica: ReplicaId,
    pub seq: u64,
    pub ops: Vec<Operation>,
}

/// A bounded run of log entries that remembers what it had to forget.
#[derive(Debug, Clone, Default)]
struct Timeline {
    entries: VecDeque<LogEntry>,
    dropped: VersionVector,
}

impl Timeline {
    fn push(&mut self, entry: LogEntry, capacity: Option<usize>) {
        self.entries.push_back(entry);
        if let Some(capacity) = capacity {
            while self.entries.len() > capacity {
                self.drop_front();
            }
        }
    }

    fn drop_front(&mut self) {
        if let Some(old) = self.entries.pop_front() {
            self.dropped.observe(&old.replica, old.seq);
        }
    }

    /// Returns true if `context` saw every entry this timeline dropped.
    fn retains_everything_after(&self, context: &VersionVector) -> bool {
        context.dominates(&self.dropped)
    }
}

/// Outcome of preparing an incoming record.
#[derive(Debug)]
pub(crate) enum Integration {
    /// The record was applied before.
    Duplicate,
    /// The record transformed against its replica's bridge, ready to apply.
    Ready(Prepared),
}

/// A transformed record plus the bridge it leaves behind, committed only
/// once the operations were applied.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub author: ParticipantId,
    pub replica: ReplicaId,
    pub seq: u64,
    pub ops: Vec<Operation>,
    context: VersionVector,
    bridge: Timeline,
}

#[derive(Debug)]
pub(crate) struct History {
    replica: ReplicaId,
    author: ParticipantId,
    applied: VersionVector,
    log: Timeline,
    bridges: HashMap<ReplicaId, Timeline>,
    /// What each peer had applied when it issued its latest record.
    seen: HashMap<ReplicaId, VersionVector>,
    capacity: Option<usize>,
}

impl History {
    pub fn new(replica: ReplicaId, author: ParticipantId, capacity: Option<usize>) -> Self {
        Self {
            replica,
            author,
            applied: VersionVector::new(),
            log: Timeline::default(),
            bridges: HashMap::new(),
            seen: HashMap::new(),
            capacity,
        }
    }

    /// Operations applied per replica.
    pub fn applied(&self) -> &VersionVector {
        &self.applied
    }

    /// Entries still retained for peers not heard from yet.
    pub fn log_len(&self) -> usize {
        self.log.entries.len()
    }

    /// Returns true if at least one peer is known and every known peer had
    /// applied everything in `version` when it last issued a record.
    pub fn seen_by_every_peer(&self, version: &VersionVector) -> bool {
        !self.seen.is_empty() && self.seen.values().all(|seen| seen.dominates(version))
    }

    /// Records an operation applied locally.
    ///
    /// Returns the operation's sequence number and the context it was
    /// issued in.
    pub fn record_local(&mut self, ops: Vec<Operation>) -> (u64, VersionVector) {
        let context = self.applied.clone();
        let seq = self.applied.increment(&self.replica);
        let entry = LogEntry {
            author: self.author.clone(),
            replica: self.replica.clone(),
            seq,
            ops,
        };
        for bridge in self.bridges.values_mut() {
            bridge.push(entry.clone(), self.capacity);
        }
        self.log.push(entry, self.capacity);
        (seq, context)
    }

    /// Transforms `record` so it applies to the current state.
    ///
    /// Nothing is changed until [`History::commit`] is called with the result.
    pub fn integrate(&self, record: &OperationRecord, tie_break: TieBreak) -> Result<Integration, DocumentError> {
        let replica = &record.replica;
        let expected = self.applied.get(replica) + 1;
        if record.seq < expected {
            return Ok(Integration::Duplicate);
        }
        if record.seq > expected {
            return Err(DocumentError::OutOfOrder {
                replica: replica.clone(),
                expected,
                got: record.seq,
            });
        }
        let issued = self.applied.get(&self.replica);
        let claimed = record.context.get(&self.replica);
        if claimed > issued {
            return Err(DocumentError::UnknownContext {
                replica: replica.clone(),
                seq: record.seq,
                local: self.replica.clone(),
                claimed,
                issued,
            });
        }

        let mut bridge = match self.bridges.get(replica) {
            Some(bridge) => bridge.clone(),
            // First record from this peer: everything it has not seen.
            None => Timeline {
                entries: self
                    .log
                    .entries
                    .iter()
                    .filter(|e| &e.replica != replica)
                    .cloned()
                    .collect(),
                dropped: self.log.dropped.clone(),
            },
        };
        bridge
            .entries
            .retain(|e| !record.context.covers(&e.replica, e.seq));
        if !bridge.retains_everything_after(&record.context) {
            return Err(DocumentError::StaleContext {
                replica: replica.clone(),
                seq: record.seq,
            });
        }

        let mut incoming = vec![record.op.clone()];
        for entry in bridge.entries.iter_mut() {
            let side = tie_break.side((&record.author, replica), (&entry.author, &entry.replica));
            let (transformed, rebased) = transform_sequences(&incoming, &entry.ops, side);
            incoming = transformed;
            entry.ops = rebased;
        }

        Ok(Integration::Ready(Prepared {
            author: record.author.clone(),
            replica: replica.clone(),
            seq: record.seq,
            ops: incoming,
            context: record.context.clone(),
            bridge,
        }))
    }

    /// Marks a prepared record applied. `applied` are the operations that
    /// actually took effect, which may be fewer than were prepared.
    pub fn commit(&mut self, prepared: Prepared, applied: Vec<Operation>) {
        let Prepared {
            author,
            replica,
            seq,
            mut context,
            bridge,
            ..
        } = prepared;
        self.applied.observe(&replica, seq);
        self.bridges.insert(replica.clone(), bridge);
        context.observe(&replica, seq);
        self.seen.insert(replica.clone(), context);
        if !applied.is_empty() {
            let entry = LogEntry {
                author,
                replica,
                seq,
                ops: applied,
            };
            for (peer, bridge) in self.bridges.iter_mut() {
                if peer != &entry.replica {
                    bridge.push(entry.clone(), self.capacity);
                }
            }
            self.log.push(entry, self.capacity);
        }
        self.prune_log();
    }

    fn prune_log(&mut self) {
        while let Some(front) = self.log.entries.front() {
            let everywhere = self.seen.values().all(|seen| seen.covers(&front.replica, front.seq));
            if self.seen.is_empty() || !everywhere {
                break;
            }
            self.log.drop_front();
        }
    }
}
