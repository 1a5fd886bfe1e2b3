//! Capped, de-duplicating dataset accumulator
//!
//! All mutation goes through [`MetadataStore::commit`], which checks capacity
//! and uniqueness under the same lock as the insert. Callers never need to
//! pre-check; a pre-check would race with other workers anyway.

use crate::models::{DatasetEntry, ObjectId};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Why a commit was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommitRefusal {
    #[error("store is full")]
    Full,

    #[error("object already committed")]
    Duplicate,
}

#[derive(Debug, Default)]
struct StoreState {
    entries: Vec<DatasetEntry>,
    ids: HashSet<ObjectId>,
}

/// Thread-safe dataset accumulator
#[derive(Debug)]
pub struct MetadataStore {
    capacity: usize,
    state: Mutex<StoreState>,
}

impl MetadataStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // entries and ids are only updated together after all checks pass
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add an entry if there is room and its identifier is new
    pub fn commit(&self, entry: DatasetEntry) -> Result<(), CommitRefusal> {
        let mut state = self.lock();

        if state.ids.contains(&entry.object_id()) {
            return Err(CommitRefusal::Duplicate);
        }
        if state.entries.len() >= self.capacity {
            return Err(CommitRefusal::Full);
        }

        state.ids.insert(entry.object_id());
        state.entries.push(entry);
        Ok(())
    }

    /// `commit` reduced to accepted / not accepted
    pub fn try_commit(&self, entry: DatasetEntry) -> bool {
        self.commit(entry).is_ok()
    }

    /// Point-in-time copy of all entries in commit order
    pub fn snapshot(&self) -> Vec<DatasetEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.lock().ids.contains(&object_id)
    }
}
