//! Table of open document handles.
//!
//! The manager is an ordinary value owned by whoever drives the session.
//! It creates handles on first open, hands out references by document id
//! and remembers which ids were closed.

use std::{collections::HashMap, sync::Arc};

use crate::{
    Clock, Result, SystemClock,
    config::DocumentConfig,
    document::{DocumentError, DocumentHandle},
    participants::ParticipantId,
};

/// Open/close lifecycle for the documents of one local participant.
///
/// ```
/// use sharedoc::{DocumentConfig, HandleManager, participants::ParticipantId};
///
/// let me = ParticipantId::parse("alice@example.com")?;
/// let mut manager = HandleManager::new(me, DocumentConfig::default());
///
/// manager.open_or_create("notes").put("title", "Shopping")?;
/// assert!(manager.is_open("notes"));
///
/// manager.close("notes")?;
/// assert!(manager.get("notes").unwrap_err().is_usage_error());
/// # Ok::<(), sharedoc::Error>(())
/// ```
#[derive(Debug)]
pub struct HandleManager {
    participant: ParticipantId,
    config: DocumentConfig,
    clock: Arc<dyn Clock>,
    handles: HashMap<String, DocumentHandle>,
}

impl HandleManager {
    /// Creates a manager whose documents are attributed to `participant`.
    pub fn new(participant: ParticipantId, config: DocumentConfig) -> Self {
        Self {
            participant,
            config,
            clock: Arc::new(SystemClock),
            handles: HashMap::new(),
        }
    }

    /// Replaces the time source used for new handles.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn participant(&self) -> &ParticipantId {
        &self.participant
    }

    /// Returns the open handle for `id`, creating a new document if there
    /// is none. Reopening a closed id starts an empty document.
    pub fn open_or_create(&mut self, id: &str) -> &mut DocumentHandle {
        let Self {
            participant,
            config,
            clock,
            handles,
        } = self;
        let fresh = || {
            DocumentHandle::create(id, participant.clone(), config.clone(), Arc::clone(clock))
        };
        handles
            .entry(id.to_string())
            .and_modify(|handle| {
                if handle.is_closed() {
                    *handle = fresh();
                }
            })
            .or_insert_with(&fresh)
    }

    /// # Errors
    /// [`DocumentError::HandleClosed`] for a closed id and
    /// [`DocumentError::UnknownDocument`] for one never opened.
    pub fn get(&self, id: &str) -> Result<&DocumentHandle> {
        match self.handles.get(id) {
            Some(handle) if handle.is_closed() => Err(closed(id)),
            Some(handle) => Ok(handle),
            None => Err(unknown(id)),
        }
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut DocumentHandle> {
        match self.handles.get_mut(id) {
            Some(handle) if handle.is_closed() => Err(closed(id)),
            Some(handle) => Ok(handle),
            None => Err(unknown(id)),
        }
    }

    /// Closes the handle for `id`.
    pub fn close(&mut self, id: &str) -> Result<()> {
        self.handles
            .get_mut(id)
            .ok_or_else(|| unknown(id))?
            .close()
    }

    /// Closes every open handle.
    pub fn close_all(&mut self) {
        for handle in self.handles.values_mut() {
            if !handle.is_closed() {
                // Cannot fail on an open handle.
                let _ = handle.close();
            }
        }
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.handles.get(id).is_some_and(|h| !h.is_closed())
    }

    /// Ids of all open documents, sorted.
    pub fn open_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .handles
            .iter()
            .filter(|(_, h)| !h.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

fn closed(id: &str) -> crate::Error {
    DocumentError::HandleClosed { id: id.to_string() }.into()
}

fn unknown(id: &str) -> crate::Error {
    DocumentError::UnknownDocument { id: id.to_string() }.into()
}
