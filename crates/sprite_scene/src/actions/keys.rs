//! Key generation for queued actions
//!
//! Actions enqueued without an explicit key receive one from the node's
//! [`KeySource`]. Keys only need to be stable and readable; uniqueness is
//! not required by the queue.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Capability that hands out keys for actions enqueued without one
pub trait KeySource: Send + Sync + fmt::Debug {
    /// Produce the next key
    fn next_key(&self) -> String;
}

/// Monotonic counter keys: `action-0`, `action-1`, ...
#[derive(Debug)]
pub struct SequentialKeys {
    prefix: String,
    next: AtomicU64,
}

impl SequentialKeys {
    /// Counter keys with the default `action` prefix
    pub fn new() -> Self {
        Self::with_prefix("action")
    }

    /// Counter keys with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for SequentialKeys {
    fn next_key(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}
