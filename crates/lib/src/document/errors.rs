//! Error types for document handles and remote application.

use thiserror::Error;

use crate::participants::ReplicaId;

/// Structured error types for document-level operations.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// The handle was closed; it accepts no further reads or writes.
    #[error("Document {id} is closed")]
    HandleClosed { id: String },

    /// No document with this id was ever opened by the manager.
    #[error("Unknown document: {id}")]
    UnknownDocument { id: String },

    /// A remote record skipped ahead in its replica's sequence.
    #[error("Out-of-order record from replica {replica}: expected seq {expected}, got {got}")]
    OutOfOrder {
        replica: ReplicaId,
        expected: u64,
        got: u64,
    },

    /// A remote record was issued against operations this replica no
    /// longer retains, so it cannot be transformed.
    #[error("Record {seq} from replica {replica} predates the retained history")]
    StaleContext { replica: ReplicaId, seq: u64 },

    /// A remote record claims to have seen operations this replica never issued.
    #[error("Record {seq} from replica {replica} claims {claimed} operations from {local}, only {issued} exist")]
    UnknownContext {
        replica: ReplicaId,
        seq: u64,
        local: ReplicaId,
        claimed: u64,
        issued: u64,
    },
}

impl DocumentError {
    /// Check if the error comes from using a closed handle
    pub fn is_closed(&self) -> bool {
        matches!(self, DocumentError::HandleClosed { .. })
    }

    /// Check if the error reports an unknown document
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentError::UnknownDocument { .. })
    }

    /// Check if the error was caused by a malformed or unusable remote record
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            DocumentError::OutOfOrder { .. }
                | DocumentError::StaleContext { .. }
                | DocumentError::UnknownContext { .. }
        )
    }
}

impl From<DocumentError> for crate::Error {
    fn from(err: DocumentError) -> Self {
        crate::Error::Document(err)
    }
}
