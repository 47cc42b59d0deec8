//! Action instances and their lifecycle
//!
//! An [`Action`] wraps an [`ActionKind`] with the state a queue needs: a
//! mutable key, a weak reference to the node it targets, an optional
//! completion callback and the lifecycle phase.
//!
//! ```text
//! Pending ──start()──▶ Active ──step() finishes──▶ Completed
//!    │                   │
//!    └──────cancel()─────┴──────────────────────▶ Cancelled
//! ```
//!
//! Each piece of state sits behind its own lock. The driver lock is held
//! while a step runs (and therefore while a custom closure runs); every other
//! lock is a leaf, so a closure may freely query or edit its node's queue.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::foundation::sync::{lock, read, write};
use crate::scene::{Node, NodeRef};

use super::kind::{ActionKind, Driver};
use super::timing::TimingFunction;

/// Shared handle to a queued action
pub type ActionRef = Arc<Action>;

/// Callback fired once when an action completes successfully
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle phase of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    /// Enqueued, not yet started
    Pending,
    /// Started and advancing
    Active,
    /// Finished; removed from its queue with the completion fired
    Completed,
    /// Removed before finishing; completion never fires
    Cancelled,
}

/// Outcome of a single [`Action::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    /// More steps are needed
    Running,
    /// The action reached its end this step
    Completed,
    /// The action was cancelled and must not be advanced
    Cancelled,
}

#[derive(Debug)]
struct Lifecycle {
    phase: ActionPhase,
    elapsed: f32,
}

/// A time-driven mutation queued on a node
pub struct Action {
    kind: ActionKind,
    timing: TimingFunction,
    key: RwLock<String>,
    target: RwLock<Weak<Node>>,
    lifecycle: Mutex<Lifecycle>,
    completion: Mutex<Option<Completion>>,
    driver: Mutex<Option<Driver>>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("key", &*read(&self.key))
            .field("kind", &self.kind)
            .field("timing", &self.timing)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Action {
    /// Create a pending action with linear timing
    pub fn new(kind: ActionKind) -> ActionRef {
        Self::with_timing(kind, TimingFunction::Linear)
    }

    /// Create a pending action with an easing curve applied to every tween it drives
    pub fn with_timing(kind: ActionKind, timing: TimingFunction) -> ActionRef {
        Arc::new(Self {
            kind,
            timing,
            key: RwLock::new(String::new()),
            target: RwLock::new(Weak::new()),
            lifecycle: Mutex::new(Lifecycle { phase: ActionPhase::Pending, elapsed: 0.0 }),
            completion: Mutex::new(None),
            driver: Mutex::new(None),
        })
    }

    /// What this action does
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Easing curve
    pub fn timing(&self) -> TimingFunction {
        self.timing
    }

    /// Current key
    pub fn key(&self) -> String {
        read(&self.key).clone()
    }

    /// Replace the key
    pub fn set_key(&self, key: impl Into<String>) {
        *write(&self.key) = key.into();
    }

    pub(crate) fn has_key(&self, key: &str) -> bool {
        read(&self.key).as_str() == key
    }

    /// Node this action was last enqueued on, if it is still alive
    pub fn target(&self) -> Option<NodeRef> {
        read(&self.target).upgrade()
    }

    /// Point the action at a node
    pub fn set_target(&self, node: Weak<Node>) {
        *write(&self.target) = node;
    }

    /// Attach (or replace) the completion callback
    pub fn set_completion<F>(&self, completion: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *lock(&self.completion) = Some(Box::new(completion));
    }

    /// Whether a completion callback is still attached
    pub fn has_completion(&self) -> bool {
        lock(&self.completion).is_some()
    }

    pub(crate) fn take_completion(&self) -> Option<Completion> {
        lock(&self.completion).take()
    }

    /// Lifecycle phase
    pub fn phase(&self) -> ActionPhase {
        lock(&self.lifecycle).phase
    }

    /// Total seconds this action has been stepped
    pub fn elapsed(&self) -> f32 {
        lock(&self.lifecycle).elapsed
    }

    /// Enter `Active`. Calling it again, or after the action ended, does nothing.
    pub fn start(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.phase == ActionPhase::Pending {
            lifecycle.phase = ActionPhase::Active;
            *lock(&self.driver) = Some(Driver::new(&self.kind));
        }
    }

    /// Advance one step of `dt` seconds against `target`
    ///
    /// A pending action is started first. Steps on an ended action are
    /// ignored and report the terminal status.
    pub fn step(&self, target: &Node, dt: f32) -> ActionStatus {
        self.start();
        match self.phase() {
            ActionPhase::Active => {}
            ActionPhase::Completed => return ActionStatus::Completed,
            ActionPhase::Cancelled | ActionPhase::Pending => return ActionStatus::Cancelled,
        }

        let finished = {
            let mut driver = lock(&self.driver);
            match driver.as_mut() {
                Some(driver) => driver.advance(target, dt, self.timing).is_some(),
                None => true,
            }
        };

        let mut lifecycle = lock(&self.lifecycle);
        lifecycle.elapsed += dt;
        match lifecycle.phase {
            ActionPhase::Active if finished => {
                lifecycle.phase = ActionPhase::Completed;
                ActionStatus::Completed
            }
            ActionPhase::Active => ActionStatus::Running,
            ActionPhase::Completed => ActionStatus::Completed,
            ActionPhase::Cancelled | ActionPhase::Pending => ActionStatus::Cancelled,
        }
    }

    /// Move to `Cancelled` and drop the completion without calling it
    ///
    /// Returns false, changing nothing, once the action has ended. A
    /// completed action keeps its phase and its completion.
    pub fn cancel(&self) -> bool {
        {
            let mut lifecycle = lock(&self.lifecycle);
            if matches!(lifecycle.phase, ActionPhase::Completed | ActionPhase::Cancelled) {
                return false;
            }
            lifecycle.phase = ActionPhase::Cancelled;
        }
        drop(self.take_completion());
        true
    }

    /// Force `Cancelled` from any phase and drop the completion
    ///
    /// Used by whoever dequeues the action from a node's queue: once it is
    /// out of the queue its completion can no longer fire, so a completed
    /// phase must not be left behind either.
    pub(crate) fn revoke(&self) {
        lock(&self.lifecycle).phase = ActionPhase::Cancelled;
        drop(self.take_completion());
    }
}
