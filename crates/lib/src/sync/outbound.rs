//! Outbound queue of locally issued operation records.
//!
//! The queue holds records until the transport drains them, then tracks
//! each record's delivery status by its sequence number until the
//! transport acknowledges it. Acknowledged records are folded into a
//! low-water mark: every sequence number at or below it is acknowledged,
//! so the status table only holds records still in flight.
//!
//! Records are never retried from here: a transport that fails to deliver
//! keeps the drained batch and tries again on its own schedule.

use std::collections::{BTreeMap, VecDeque};

use crate::ops::OperationRecord;

/// Delivery status of one locally issued record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Waiting in the queue.
    Queued,
    /// Handed to the transport, not yet acknowledged.
    Pending,
    /// Confirmed delivered by the transport.
    Acknowledged,
}

/// FIFO of records waiting for the transport.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    queued: VecDeque<OperationRecord>,
    status: BTreeMap<u64, OpStatus>,
    /// Highest sequence number with everything up to it acknowledged.
    acknowledged_through: u64,
}

impl OutboundQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to the back of the queue.
    pub fn enqueue(&mut self, record: OperationRecord) {
        self.status.insert(record.seq, OpStatus::Queued);
        self.queued.push_back(record);
    }

    /// Take every queued record, oldest first, and mark them pending.
    pub fn drain(&mut self) -> Vec<OperationRecord> {
        let batch: Vec<_> = self.queued.drain(..).collect();
        for record in &batch {
            self.status.insert(record.seq, OpStatus::Pending);
        }
        batch
    }

    /// Mark a pending record as delivered.
    ///
    /// Returns false if `seq` was never drained or is already acknowledged.
    pub fn acknowledge(&mut self, seq: u64) -> bool {
        match self.status.get_mut(&seq) {
            Some(status @ OpStatus::Pending) => *status = OpStatus::Acknowledged,
            _ => return false,
        }
        while self.status.get(&(self.acknowledged_through + 1)) == Some(&OpStatus::Acknowledged) {
            self.acknowledged_through += 1;
            self.status.remove(&self.acknowledged_through);
        }
        tracing::trace!(seq, through = self.acknowledged_through, "acknowledged");
        true
    }

    pub fn status(&self, seq: u64) -> Option<OpStatus> {
        if seq > 0 && seq <= self.acknowledged_through {
            return Some(OpStatus::Acknowledged);
        }
        self.status.get(&seq).copied()
    }

    /// Number of records whose status is tracked individually.
    pub fn tracked(&self) -> usize {
        self.status.len()
    }

    /// Number of records drained but not yet acknowledged.
    pub fn pending_count(&self) -> usize {
        self.status
            .values()
            .filter(|s| **s == OpStatus::Pending)
            .count()
    }

    /// Number of records waiting to be drained.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
