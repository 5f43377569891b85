//! Error types for document model operations.
//!
//! These are the usage errors a caller can provoke through the node API:
//! addressing the wrong kind of container, indexing past the end of a list
//! or text, or attaching a node somewhere the tree shape forbids.

use thiserror::Error;

use super::node::{NodeId, NodeKind};

/// Structured error types for node-level operations.
///
/// Every variant is a caller mistake and is surfaced synchronously. Losing
/// an update to a concurrent removal is *not* an error and never appears here.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// The node id was never issued by this document.
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// An operation expected one kind of container and found another.
    #[error("Node {id} is a {actual}, expected a {expected}")]
    WrongNodeKind {
        id: NodeId,
        expected: NodeKind,
        actual: NodeKind,
    },

    /// List index outside `0..=len` for inserts or `0..len` otherwise.
    #[error("List index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Text offset or range outside the current content.
    #[error("Text range {start}..{end} out of bounds (len {len})")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    /// A structural node can only have one parent.
    #[error("Node {id} is already attached to {parent}")]
    AlreadyAttached { id: NodeId, parent: NodeId },

    /// Attaching the node would make it its own ancestor.
    #[error("Cannot attach node {id} inside its own subtree")]
    CycleDetected { id: NodeId },

    /// The document root and private maps cannot be stored inside another
    /// container.
    #[error("A root node cannot be attached to a container")]
    RootNotAttachable,

    /// A node with this id already exists (duplicate remote delivery).
    #[error("Node {id} already exists")]
    DuplicateNode { id: NodeId },

    /// The map key is empty or contains a path separator.
    #[error("Invalid map key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

impl ModelError {
    /// Check if this error reports an unknown node id
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NodeNotFound { .. })
    }

    /// Check if this error is a container kind mismatch
    pub fn is_type_error(&self) -> bool {
        matches!(self, ModelError::WrongNodeKind { .. })
    }

    /// Check if this error is an index or range violation
    pub fn is_bounds_error(&self) -> bool {
        matches!(
            self,
            ModelError::IndexOutOfBounds { .. } | ModelError::RangeOutOfBounds { .. }
        )
    }

    /// Check if this error comes from violating the single-parent tree shape
    pub fn is_attachment_error(&self) -> bool {
        matches!(
            self,
            ModelError::AlreadyAttached { .. }
                | ModelError::CycleDetected { .. }
                | ModelError::RootNotAttachable
                | ModelError::DuplicateNode { .. }
        )
    }

    /// Get the node id if this error is about a specific node
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            ModelError::NodeNotFound { id }
            | ModelError::WrongNodeKind { id, .. }
            | ModelError::AlreadyAttached { id, .. }
            | ModelError::CycleDetected { id }
            | ModelError::DuplicateNode { id } => Some(id),
            _ => None,
        }
    }
}

impl From<ModelError> for crate::Error {
    fn from(err: ModelError) -> Self {
        crate::Error::Model(err)
    }
}

/// Errors from parsing or strictly resolving a path.
///
/// Plain reads never see these: a failed lookup during `get` is absent,
/// not an error. Path-addressed mutations use the strict walk and report
/// exactly which segment failed.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// Empty segment, control character or non-ASCII input.
    #[error("Malformed path '{path}': {reason}")]
    Malformed { path: String, reason: String },

    /// A segment named a key or index that does not exist.
    #[error("Path '{path}' not found at segment '{segment}'")]
    NotFound { path: String, segment: String },

    /// A list was addressed with a segment that is not a non-negative integer.
    #[error("Path '{path}': index not a number '{segment}'")]
    IndexNotANumber { path: String, segment: String },

    /// The walk reached a scalar or text node before the path ended.
    #[error("Path '{path}': '{segment}' is not a map or list")]
    NotAContainer { path: String, segment: String },
}

impl PathError {
    /// Check if the path string itself is invalid
    pub fn is_malformed(&self) -> bool {
        matches!(self, PathError::Malformed { .. })
    }

    /// Check if a lookup along the path failed
    pub fn is_not_found(&self) -> bool {
        matches!(self, PathError::NotFound { .. })
    }

    /// Check if a segment was applied to the wrong kind of container
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            PathError::IndexNotANumber { .. } | PathError::NotAContainer { .. }
        )
    }

    /// The path that failed
    pub fn path(&self) -> &str {
        match self {
            PathError::Malformed { path, .. }
            | PathError::NotFound { path, .. }
            | PathError::IndexNotANumber { path, .. }
            | PathError::NotAContainer { path, .. } => path,
        }
    }
}

impl From<PathError> for crate::Error {
    fn from(err: PathError) -> Self {
        crate::Error::Path(err)
    }
}
