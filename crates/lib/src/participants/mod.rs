//! Participants: the identities with access to a document.
//!
//! The registry lives beside the data tree rather than inside it. Changes
//! travel as their own operations and raise their own events, since access
//! control and UI presence key off them specifically.
//!
//! A participant address is `name@domain`. The address with an empty name,
//! `@domain`, is the domain's public participant: adding it makes the
//! document readable by everyone in that domain.

pub mod errors;
pub mod replica;

use std::{fmt, str::FromStr};

use crate::constants::{ADDRESS_SEPARATOR, NODE_ID_SEPARATOR};

pub use errors::ParticipantError;
pub use replica::ReplicaId;

/// A validated participant address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Parses and validates an address.
    ///
    /// ```
    /// # use sharedoc::participants::ParticipantId;
    /// assert!(ParticipantId::parse("alice@example.com").is_ok());
    /// assert!(ParticipantId::parse("@example.com").unwrap().is_public());
    /// assert!(ParticipantId::parse("alice").is_err());
    /// ```
    pub fn parse(address: &str) -> Result<Self, ParticipantError> {
        let invalid = |reason: &str| ParticipantError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };
        let Some((_, domain)) = address.split_once(ADDRESS_SEPARATOR) else {
            return Err(invalid("missing '@'"));
        };
        if domain.is_empty() {
            return Err(invalid("empty domain"));
        }
        if domain.contains(ADDRESS_SEPARATOR) {
            return Err(invalid("more than one '@'"));
        }
        if address.chars().any(|c| c.is_whitespace() || c.is_control() || c == NODE_ID_SEPARATOR) {
            return Err(invalid("whitespace, control characters and ':' are not allowed"));
        }
        Ok(Self(address.to_ascii_lowercase()))
    }

    /// The public participant of `domain`.
    pub fn public(domain: &str) -> Result<Self, ParticipantError> {
        Self::parse(&format!("{ADDRESS_SEPARATOR}{domain}"))
    }

    pub fn name(&self) -> &str {
        self.0.split_once(ADDRESS_SEPARATOR).map_or("", |(name, _)| name)
    }

    pub fn domain(&self) -> &str {
        self.0.split_once(ADDRESS_SEPARATOR).map_or("", |(_, domain)| domain)
    }

    /// Returns true for a domain's public participant (`@domain`).
    pub fn is_public(&self) -> bool {
        self.name().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = ParticipantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ParticipantId {
    type Error = ParticipantError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl<'de> serde::Deserialize<'de> for ParticipantId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ParticipantId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Ordered set of participants for one document.
///
/// Membership changes bump `version`; idempotent calls do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRegistry {
    members: Vec<ParticipantId>,
    version: u64,
}

impl ParticipantRegistry {
    /// Creates a registry seeded with the document's creator.
    pub fn new(creator: ParticipantId) -> Self {
        Self {
            members: vec![creator],
            version: 1,
        }
    }

    /// Adds a participant. Returns false if it was already a member.
    pub fn add(&mut self, id: ParticipantId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        self.members.push(id);
        self.version += 1;
        true
    }

    /// Removes a participant. Returns false if it was not a member.
    ///
    /// # Errors
    /// Refuses to remove the only remaining member.
    pub fn remove(&mut self, id: &ParticipantId) -> Result<bool, ParticipantError> {
        let Some(index) = self.members.iter().position(|m| m == id) else {
            return Ok(false);
        };
        if self.members.len() == 1 {
            return Err(ParticipantError::LastParticipant { id: id.clone() });
        }
        self.members.remove(index);
        self.version += 1;
        Ok(true)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.contains(id)
    }

    /// Members in the order they joined.
    pub fn list(&self) -> &[ParticipantId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns true if any domain's public participant is a member.
    pub fn is_public(&self) -> bool {
        self.members.iter().any(ParticipantId::is_public)
    }
}
