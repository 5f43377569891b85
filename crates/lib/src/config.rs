//! Per-document configuration.
//!
//! All fields have defaults, so a config file only needs to name what it
//! changes:
//!
//! ```
//! use sharedoc::config::{DocumentConfig, TieBreak};
//!
//! let config = DocumentConfig::from_json(r#"{ "insert_tie_break": "participant_order" }"#)?;
//! assert_eq!(config.insert_tie_break, TieBreak::ParticipantOrder);
//! assert_eq!(config.event_log_capacity, Some(1024));
//! # Ok::<(), sharedoc::config::ConfigError>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ops::Side,
    participants::{ParticipantId, ReplicaId},
};

/// Default number of events retained by a document's event log.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1024;

/// How two concurrent operations that collide are ordered.
///
/// Applies to insertions at the same list index or text offset and to
/// last-writer-wins races on the same map key, list slot or annotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The operation that reaches this replica later is ordered after the
    /// one already applied. Replicas that see a different arrival order can
    /// end up with a different order of tied elements.
    #[default]
    ArrivalOrder,
    /// The operation from the greater participant address is ordered
    /// after; two replicas of one participant are ordered by replica id.
    /// Every replica reaches the same order.
    ParticipantOrder,
}

/// Who issued an operation: the participant and the replica it used.
pub type Issuer<'a> = (&'a ParticipantId, &'a ReplicaId);

impl TieBreak {
    /// Side of an `incoming` remote operation colliding with an operation
    /// issued by `applied` that this replica applied first.
    pub fn side(self, incoming: Issuer<'_>, applied: Issuer<'_>) -> Side {
        match self {
            TieBreak::ArrivalOrder => Side::After,
            TieBreak::ParticipantOrder if incoming > applied => Side::After,
            TieBreak::ParticipantOrder => Side::Before,
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },
}

impl From<ConfigError> for crate::Error {
    fn from(err: ConfigError) -> Self {
        crate::Error::Config(err)
    }
}

/// Behavior switches for one document handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Ordering of colliding concurrent operations.
    pub insert_tie_break: TieBreak,
    /// Report each remote operation absorbed as a concurrent no-op to the
    /// diagnostic sink, not only to the log.
    pub report_concurrent_noops: bool,
    /// Events kept in the event log. `None` keeps all of them.
    pub event_log_capacity: Option<usize>,
    /// Applied operations kept for transforming late remote operations.
    /// `None` keeps all of them.
    pub history_capacity: Option<usize>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            insert_tie_break: TieBreak::default(),
            report_concurrent_noops: false,
            event_log_capacity: Some(DEFAULT_EVENT_LOG_CAPACITY),
            history_capacity: None,
        }
    }
}

impl DocumentConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.insert_tie_break = tie_break;
        self
    }

    pub fn with_concurrent_noop_reports(mut self, enabled: bool) -> Self {
        self.report_concurrent_noops = enabled;
        self
    }

    pub fn with_event_log_capacity(mut self, capacity: Option<usize>) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    pub fn with_history_capacity(mut self, capacity: Option<usize>) -> Self {
        self.history_capacity = capacity;
        self
    }
}
