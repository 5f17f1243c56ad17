//! Resource lock table.
//!
//! A lock pins one resource-requirement (by index within the operation's
//! requirement list) to a specific resource, overriding automatic selection.
//! The table is sparse: an unlocked index has no entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ResourceKey;

/// Sparse map from requirement index to the pinned resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocks {
    locks: BTreeMap<usize, ResourceKey>,
}

impl ResourceLocks {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `requirement_index` to `resource`, replacing any previous pin.
    ///
    /// Returns the previously pinned resource.
    pub fn lock(&mut self, requirement_index: usize, resource: ResourceKey) -> Option<ResourceKey> {
        self.locks.insert(requirement_index, resource)
    }

    /// Removes the pin on `requirement_index`.
    pub fn unlock(&mut self, requirement_index: usize) -> Option<ResourceKey> {
        self.locks.remove(&requirement_index)
    }

    /// The resource pinned to `requirement_index`.
    pub fn locked(&self, requirement_index: usize) -> Option<ResourceKey> {
        self.locks.get(&requirement_index).copied()
    }

    /// Whether any requirement is pinned.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Number of pinned requirements.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Iterates `(index, resource)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, ResourceKey)> + '_ {
        self.locks.iter().map(|(i, r)| (*i, *r))
    }

    /// Removes every entry pointing at a deleted resource.
    ///
    /// Returns the number of entries removed.
    pub fn remove_resource(&mut self, resource: ResourceKey) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, r| *r != resource);
        before - self.locks.len()
    }

    /// Drops entries whose index no longer exists after the requirement list
    /// shrank to `requirement_count`. Remaining indices are kept as-is.
    ///
    /// Returns the indices dropped.
    pub fn truncate(&mut self, requirement_count: usize) -> Vec<usize> {
        let stale = self.locks.split_off(&requirement_count);
        stale.into_keys().collect()
    }

    /// Removes every pin.
    pub fn clear(&mut self) {
        self.locks.clear();
    }
}

impl FromIterator<(usize, ResourceKey)> for ResourceLocks {
    fn from_iter<I: IntoIterator<Item = (usize, ResourceKey)>>(iter: I) -> Self {
        Self {
            locks: iter.into_iter().collect(),
        }
    }
}
