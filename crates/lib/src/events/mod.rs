//! Change notification.
//!
//! Every successful mutation, local or remote, produces exactly one
//! [`Event`]. Participant changes produce a [`ParticipantEvent`] instead.
//! Both are appended to a bounded log and delivered synchronously, in
//! application order, to the listeners registered on the document's
//! [`EventBus`].

mod bus;
mod diagnostics;

use std::ops::Range;

pub use bus::{EventBus, ListenerContext, ListenerId, Scope};
pub use diagnostics::{Diagnostic, DiagnosticLog, DiagnosticSink, ListenerError, NoOpReason};

use crate::{
    model::{NodeId, PathBuf, PlainValue, Segment},
    participants::ParticipantId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Added,
    Changed,
    Removed,
}

/// Where a mutation came from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum Origin {
    Local,
    Remote { author: ParticipantId },
}

impl Origin {
    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }

    pub fn author(&self) -> Option<&ParticipantId> {
        match self {
            Origin::Local => None,
            Origin::Remote { author } => Some(author),
        }
    }
}

/// One data mutation as observed at this replica.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Event {
    /// Position in this replica's event sequence, starting at 1.
    pub seq: u64,
    pub kind: EventKind,
    /// The container that changed.
    pub node: NodeId,
    /// Path of `node` at the time of the change; `None` while detached.
    pub path: Option<PathBuf>,
    /// Key or index (for text: start offset) that changed.
    pub target: Segment,
    /// Affected character range, for text events.
    pub range: Option<Range<usize>>,
    pub old_value: Option<PlainValue>,
    pub new_value: Option<PlainValue>,
    pub origin: Origin,
    /// Ancestors of `node`, nearest first. Used for subtree matching.
    #[serde(skip)]
    pub ancestors: Vec<NodeId>,
}

impl Event {
    /// The key, when the change happened in a map.
    pub fn key(&self) -> Option<&str> {
        self.target.as_key()
    }

    /// The index or offset, when the change happened in a list or text.
    pub fn index(&self) -> Option<usize> {
        self.target.as_index()
    }

    /// Full path of the changed entry, when `node` is attached.
    pub fn target_path(&self) -> Option<PathBuf> {
        self.path.clone().map(|p| p.push(&self.target))
    }

    pub fn is_local(&self) -> bool {
        self.origin.is_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParticipantEventKind {
    Added,
    Removed,
}

/// A membership change of the participant registry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParticipantEvent {
    pub seq: u64,
    pub kind: ParticipantEventKind,
    pub participant: ParticipantId,
    pub origin: Origin,
}
