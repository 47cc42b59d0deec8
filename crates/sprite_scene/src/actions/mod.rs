//! Action scheduling
//!
//! Actions are time-driven mutations queued on a node. The tick traversal
//! (see [`Node::tick`](crate::scene::Node::tick)) advances only the head of
//! each queue per frame; concurrent animations on one node are expressed
//! with [`ActionKind::Group`].

mod action;
mod keys;
mod kind;
mod queue;
mod timing;

pub use action::{Action, ActionPhase, ActionRef, ActionStatus, Completion};
pub use keys::{KeySource, SequentialKeys};
pub use kind::{ActionKind, CustomBlock};
pub use queue::ActionQueue;
pub use timing::TimingFunction;
