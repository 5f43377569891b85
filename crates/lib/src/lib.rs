//!
//! Sharedoc: a shared document model for collaborative editing.
//! This library provides the in-memory tree that concurrent participants edit,
//! the algebra that merges their operations, and the events that report changes.
//!
//! ## Core Concepts
//!
//! Sharedoc is built around several key concepts:
//!
//! * **Values (`model::Value`)**: Scalars (null, boolean, number, string) or a reference to a structural node.
//! * **Nodes (`model::Node`)**: Maps, lists and rich text, owned by their document and addressed by `model::NodeId`.
//! * **Paths (`model::PathBuf`)**: Dot-separated strings resolved against the runtime shape of the tree.
//! * **Operations (`ops::Operation`)**: Small, serializable mutation records exchanged between replicas.
//! * **Transform (`ops::transform`)**: Re-expresses an operation against a concurrent one so every replica keeps both intents.
//! * **Events (`events::EventBus`)**: Ordered change notification, per node or per subtree.
//! * **Participants (`participants::ParticipantRegistry`)**: The identities with access to a document.
//! * **Handles (`DocumentHandle`)**: One open document, owning all of the above.
//!
//! Networking, storage and identity are left to the caller: a handle queues
//! its outgoing operation records and accepts incoming ones.

pub mod clock;
pub mod config;
pub mod constants;
pub mod document;
pub mod events;
pub mod manager;
pub mod model;
pub mod ops;
pub mod participants;
pub mod sync;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DocumentConfig, TieBreak};
pub use document::{Applied, DocumentHandle, ReplicationStats};
pub use manager::HandleManager;

/// Result type used throughout the Sharedoc library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Sharedoc library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structured node errors from the model module
    #[error(transparent)]
    Model(model::ModelError),

    /// Structured path errors from the model module
    #[error(transparent)]
    Path(model::PathError),

    /// Structured handle and remote application errors from the document module
    #[error(transparent)]
    Document(document::DocumentError),

    /// Structured participant errors from the participants module
    #[error(transparent)]
    Participant(participants::ParticipantError),

    /// Structured configuration errors from the config module
    #[error(transparent)]
    Config(config::ConfigError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Model(_) | Error::Path(_) => "model",
            Error::Document(_) => "document",
            Error::Participant(_) => "participants",
            Error::Config(_) => "config",
        }
    }

    /// Check if this error is a caller mistake that retrying cannot fix.
    pub fn is_usage_error(&self) -> bool {
        match self {
            Error::Model(_) | Error::Path(_) | Error::Participant(_) => true,
            Error::Document(document_err) => document_err.is_closed() || document_err.is_not_found(),
            Error::Config(_) => false,
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Model(model_err) => model_err.is_not_found(),
            Error::Path(path_err) => path_err.is_not_found(),
            Error::Document(document_err) => document_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error is a container type mismatch.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Model(model_err) => model_err.is_type_error(),
            Error::Path(path_err) => path_err.is_type_error(),
            _ => false,
        }
    }

    /// Check if this error is an index or range violation.
    pub fn is_bounds_error(&self) -> bool {
        match self {
            Error::Model(model_err) => model_err.is_bounds_error(),
            _ => false,
        }
    }

    /// Check if this error comes from using a closed handle.
    pub fn is_closed(&self) -> bool {
        match self {
            Error::Document(document_err) => document_err.is_closed(),
            _ => false,
        }
    }

    /// Check if this error rejected a remote record.
    pub fn is_remote_error(&self) -> bool {
        match self {
            Error::Document(document_err) => document_err.is_remote_error(),
            _ => false,
        }
    }
}
