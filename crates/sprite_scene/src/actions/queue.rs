//! Per-node FIFO of pending actions
//!
//! Key policy: keys are not unique. [`ActionQueue::find`] returns the first
//! entry carrying a key, [`ActionQueue::remove_by_key`] removes every entry
//! carrying it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::foundation::sync::lock;

use super::action::ActionRef;

/// Ordered queue of actions guarded by its own lock
#[derive(Debug, Default)]
pub struct ActionQueue {
    entries: Mutex<VecDeque<ActionRef>>,
}

impl ActionQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue holding the given entries (shared, not cloned)
    pub fn from_entries(entries: impl IntoIterator<Item = ActionRef>) -> Self {
        Self {
            entries: Mutex::new(entries.into_iter().collect()),
        }
    }

    /// Append to the tail
    pub fn push(&self, action: ActionRef) {
        lock(&self.entries).push_back(action);
    }

    /// The entry that the next tick advances
    pub fn head(&self) -> Option<ActionRef> {
        lock(&self.entries).front().cloned()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// First entry with the given key
    pub fn find(&self, key: &str) -> Option<ActionRef> {
        lock(&self.entries).iter().find(|action| action.has_key(key)).cloned()
    }

    /// Keys of every entry, in queue order
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).iter().map(|action| action.key()).collect()
    }

    /// Detach every entry with the given key and return them in queue order
    pub fn remove_by_key(&self, key: &str) -> Vec<ActionRef> {
        let mut entries = lock(&self.entries);
        let mut removed = Vec::new();
        entries.retain(|action| {
            if action.has_key(key) {
                removed.push(Arc::clone(action));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove one specific entry; returns false if it is no longer queued
    pub fn remove_entry(&self, action: &ActionRef) -> bool {
        let mut entries = lock(&self.entries);
        match entries.iter().position(|queued| Arc::ptr_eq(queued, action)) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Detach every entry
    pub fn drain(&self) -> Vec<ActionRef> {
        lock(&self.entries).drain(..).collect()
    }

    /// Snapshot of the entries (the same references, in order)
    pub fn snapshot(&self) -> Vec<ActionRef> {
        lock(&self.entries).iter().cloned().collect()
    }
}
