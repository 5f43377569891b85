//! Diagnostics for conditions that never fail a mutation.

use std::{cell::RefCell, rc::Rc};

use thiserror::Error;

use super::ListenerId;
use crate::participants::ParticipantId;

/// Failure returned by a listener callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ListenerError {
    pub message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why a remote operation had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The target node was removed by a concurrent operation.
    TargetRemoved,
    /// A concurrent operation already covered it, or won a last-writer race.
    Superseded,
    /// A participant removal would have left the document without members.
    LastParticipant,
}

/// Something worth reporting that is not an error of the calling operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A listener returned an error or panicked.
    ListenerFailed {
        listener: ListenerId,
        event_seq: u64,
        message: String,
    },
    /// A remote operation was absorbed without effect.
    ConcurrentNoOp {
        author: ParticipantId,
        seq: u64,
        operation: String,
        reason: NoOpReason,
    },
}

/// Receiver for [`Diagnostic`]s.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// A sink that keeps every diagnostic, shareable with the code that
/// installed it.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    entries: Rc<RefCell<Vec<Diagnostic>>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.entries.borrow_mut().push(diagnostic.clone());
    }
}
