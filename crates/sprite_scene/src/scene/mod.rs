//! Scene graph: nodes, tree mutation, and the render and tick traversals
//!
//! See [`node`] for the locking discipline shared by every operation here.

pub mod attachments;
pub mod error;
pub mod node;
pub mod render;
pub mod tick;

#[cfg(test)]
mod tests;

pub use attachments::{Attachments, Handle};
pub use error::{SceneError, StructuralViolation};
pub use node::{Node, NodeFlags, NodeId, NodeRef, NodeState};
pub use render::{DrawStats, NodeContent, Renderer, TransformStack};
pub use tick::TickStats;
