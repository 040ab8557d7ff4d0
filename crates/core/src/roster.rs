//! Dense membership index with O(1) insertion and removal.
//!
//! Membership is a dense array plus a position map; removal swaps the last
//! element into the vacated slot and truncates (swap-and-pop). Used for
//! company employee registries and per-company active-stream indexes, where
//! both enumeration and constant-time removal are needed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::IdentityId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    members: Vec<IdentityId>,
    positions: HashMap<IdentityId, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns `false` if already present.
    pub fn insert(&mut self, id: IdentityId) -> bool {
        if self.positions.contains_key(&id) {
            return false;
        }
        self.positions.insert(id, self.members.len());
        self.members.push(id);
        true
    }

    /// Remove a member via swap-and-pop. Returns `false` if absent.
    pub fn remove(&mut self, id: IdentityId) -> bool {
        let Some(pos) = self.positions.remove(&id) else {
            return false;
        };
        let last = self.members.len() - 1;
        self.members.swap(pos, last);
        self.members.pop();
        if pos < last {
            let moved = self.members[pos];
            self.positions.insert(moved, pos);
        }
        true
    }

    pub fn contains(&self, id: IdentityId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn as_slice(&self) -> &[IdentityId] {
        &self.members
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityId> {
        self.members.iter()
    }
}
