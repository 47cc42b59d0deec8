//! Opaque values a node stores and hands back without interpreting
//!
//! User data, physics bodies and constraints belong to collaborators outside
//! the scene graph. Nodes only keep a shared reference so callers can get the
//! exact same value back.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased reference to a collaborator value
#[derive(Clone)]
pub struct Handle(Arc<dyn Any + Send + Sync>);

impl Handle {
    /// Wrap a value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the value if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether two handles refer to the same value
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Collaborator slots carried by every node
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    /// Caller-owned data
    pub user_data: Option<Handle>,
    /// Physics body owned by the physics collaborator
    pub physics_body: Option<Handle>,
    /// Reach constraint for inverse kinematics
    pub reach_constraints: Option<Handle>,
    /// Layout constraints
    pub constraints: Option<Vec<Handle>>,
}
