//! Ids of destroyed nodes.
//!
//! A remote record issued before its replica saw a removal can still name
//! the removed node. Tombstones let such records be absorbed as concurrent
//! no-ops instead of failing as unknown targets. Once every known peer has
//! applied the removal no such record can arrive, and the ids are released.

use std::collections::{HashSet, VecDeque};

use crate::{model::NodeId, ops::VersionVector};

#[derive(Debug, Default)]
pub(crate) struct Tombstones {
    ids: HashSet<NodeId>,
    /// Buried since the last [`Tombstones::seal`].
    unsealed: Vec<NodeId>,
    /// Sealed batches, oldest first, with the version they were buried at.
    batches: VecDeque<(VersionVector, Vec<NodeId>)>,
}

impl Tombstones {
    pub fn insert(&mut self, id: NodeId) {
        if self.ids.insert(id.clone()) {
            self.unsealed.push(id);
        }
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            self.insert(id);
        }
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Tags everything buried since the last call with `version`, the
    /// replica's version right after the burying operation.
    pub fn seal(&mut self, version: &VersionVector) {
        if !self.unsealed.is_empty() {
            let batch = std::mem::take(&mut self.unsealed);
            self.batches.push_back((version.clone(), batch));
        }
    }

    /// Releases sealed batches, oldest first, while `released` accepts
    /// their version. Returns the number of ids released.
    pub fn release(&mut self, released: impl Fn(&VersionVector) -> bool) -> usize {
        let mut count = 0;
        while let Some((version, _)) = self.batches.front() {
            if !released(version) {
                break;
            }
            if let Some((_, ids)) = self.batches.pop_front() {
                for id in ids {
                    self.ids.remove(&id);
                    count += 1;
                }
            }
        }
        count
    }
}
