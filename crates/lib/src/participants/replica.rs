//! Replica identity.
//!
//! One participant may have a document open in several places at once,
//! each with its own handle. Sequence numbers, version vectors and node ids
//! are scoped to the replica, never to the participant, so two handles of
//! the same participant still see each other's edits as concurrent.

use std::{fmt, str::FromStr};

use rand::{Rng, distributions::Alphanumeric};

use super::ParticipantError;

/// Length of a generated replica token.
const TOKEN_LEN: usize = 16;

const MAX_LEN: usize = 64;

/// An opaque token naming one open handle of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ReplicaId(String);

impl ReplicaId {
    /// Validates a token supplied by the session layer.
    ///
    /// ```
    /// # use sharedoc::participants::ReplicaId;
    /// assert!(ReplicaId::parse("tab-1").is_ok());
    /// assert!(ReplicaId::parse("tab:1").is_err());
    /// assert!(ReplicaId::parse("").is_err());
    /// ```
    pub fn parse(token: &str) -> Result<Self, ParticipantError> {
        let invalid = |reason: &str| ParticipantError::InvalidReplica {
            token: token.to_string(),
            reason: reason.to_string(),
        };
        if token.is_empty() {
            return Err(invalid("empty"));
        }
        if token.len() > MAX_LEN {
            return Err(invalid("longer than 64 characters"));
        }
        if !token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("only ASCII letters, digits, '-' and '_' are allowed"));
        }
        Ok(Self(token.to_string()))
    }

    /// A fresh random token.
    pub fn random() -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReplicaId {
    type Err = ParticipantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> serde::Deserialize<'de> for ReplicaId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ReplicaId::parse(&s).map_err(serde::de::Error::custom)
    }
}
