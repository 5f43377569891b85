//! Error types for the participant registry
use thiserror::Error;

use super::ParticipantId;

#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParticipantError {
    #[error("Invalid participant address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid replica id '{token}': {reason}")]
    InvalidReplica { token: String, reason: String },

    #[error("Cannot remove {id}: a document always keeps at least one participant")]
    LastParticipant { id: ParticipantId },
}

impl ParticipantError {
    /// Check if the error is a malformed participant address.
    pub fn is_invalid_address(&self) -> bool {
        matches!(self, ParticipantError::InvalidAddress { .. })
    }

    /// Check if the error is a malformed replica id.
    pub fn is_invalid_replica(&self) -> bool {
        matches!(self, ParticipantError::InvalidReplica { .. })
    }

    /// Check if the error is a refused removal of the last member.
    pub fn is_last_participant(&self) -> bool {
        matches!(self, ParticipantError::LastParticipant { .. })
    }
}

impl From<ParticipantError> for crate::Error {
    fn from(err: ParticipantError) -> Self {
        crate::Error::Participant(err)
    }
}
