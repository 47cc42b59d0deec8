//! Scene graph errors

use thiserror::Error;

/// Tree mutations that would break a structural invariant
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralViolation {
    /// The node is already a child of some node; detach it first
    #[error("node already has a parent")]
    AlreadyHasParent,

    /// The node is the receiver or one of its ancestors
    #[error("attaching the node would create a cycle")]
    WouldCreateCycle,

    /// Scene roots are always the top of their tree
    #[error("a scene root cannot be attached as a child")]
    SceneAsChild,

    /// Insertion index past the end of the child sequence
    #[error("insertion index {index} out of bounds for {len} children")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Current number of children
        len: usize,
    },
}

/// Errors reported by node operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// Rejected tree mutation
    #[error("structural violation: {0}")]
    StructuralViolation(#[from] StructuralViolation),

    /// Operation exists on the node API but has no implementation
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),

    /// Node content failed to draw
    #[error("content draw failed: {0}")]
    Content(String),
}
