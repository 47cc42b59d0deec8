//! Scene nodes and tree mutation
//!
//! Nodes are always handled through [`NodeRef`] (`Arc<Node>`). A parent owns
//! its children through strong references; children point back at their
//! parent and at their scene root through weak references.
//!
//! ## Guarded regions
//!
//! Every node carries four independent locks:
//!
//! - `state`: geometry, flags, identity, attachments
//! - `links`: parent and scene back-references
//! - `children`: the ordered child sequence
//! - the action queue (see [`ActionQueue`])
//!
//! Acquisition order, everywhere in the crate:
//!
//! 1. a parent's `children` may be held while taking a child's `links`;
//! 2. a node's `links` may be held while reading its parent's `links`
//!    (child-then-parent, never the reverse);
//! 3. two `children` locks are never held at once: recursive walks snapshot
//!    the child list, release it, then descend.
//!
//! Attach operations additionally take the process-wide reparent guard for
//! their ancestor check and link update, so two concurrent attaches can never
//! close a cycle between them. Per-node locks are not enough for this: the
//! ancestor check of `a.add_child(b)` only reads `a`'s parent chain, and the
//! one of `b.add_child(a)` only reads `b`'s, so both checks can pass before
//! either parent link is written.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use bitflags::bitflags;

use crate::actions::{ActionQueue, KeySource, SequentialKeys};
use crate::foundation::math::{Point2, Rect};
use crate::foundation::sync::{lock, read, write};

use super::attachments::{Attachments, Handle};
use super::error::{SceneError, StructuralViolation};
use super::render::NodeContent;

/// Shared reference to a node
pub type NodeRef = Arc<Node>;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Serializes ancestor checks with parent-link updates across all attaches
static REPARENT_GUARD: Mutex<()> = Mutex::new(());

/// Process-unique node identifier, used for logging and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Boolean node state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Suspends this node's action advancement (children keep ticking)
        const PAUSED = 1 << 0;
        /// Skips this node's content and children during drawing
        const HIDDEN = 1 << 1;
        /// Node accepts user input
        const USER_INTERACTION_ENABLED = 1 << 2;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::USER_INTERACTION_ENABLED
    }
}

/// Per-node values copied by value on [`Node::copy`]
#[derive(Debug, Clone)]
pub struct NodeState {
    /// Optional, non-unique name
    pub name: Option<String>,
    /// Position in the parent's coordinate space
    pub position: Point2,
    /// Draw order depth, passed as the z translation
    pub z_position: f32,
    /// Rotation around z in radians
    pub z_rotation: f32,
    /// Horizontal scale factor
    pub x_scale: f32,
    /// Vertical scale factor
    pub y_scale: f32,
    /// Opacity
    pub alpha: f32,
    /// Multiplier on the delta time fed to this node's actions
    pub speed: f32,
    /// Cached bounding rectangle
    pub frame: Rect,
    /// Paused / hidden / interaction flags
    pub flags: NodeFlags,
    /// Opaque collaborator values
    pub attachments: Attachments,
    /// What the node itself draws between its transform and its children
    pub content: Option<Arc<dyn NodeContent>>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            name: None,
            position: Point2::origin(),
            z_position: 0.0,
            z_rotation: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
            alpha: 1.0,
            speed: 1.0,
            frame: Rect::zero(),
            flags: NodeFlags::default(),
            attachments: Attachments::default(),
            content: None,
        }
    }
}

#[derive(Debug, Default)]
struct Links {
    parent: Weak<Node>,
    scene: Weak<Node>,
}

/// A scene graph node
pub struct Node {
    id: NodeId,
    is_scene: bool,
    this: Weak<Node>,
    state: RwLock<NodeState>,
    links: RwLock<Links>,
    children: Mutex<Vec<NodeRef>>,
    pub(super) actions: ActionQueue,
    pub(super) keys: Arc<dyn KeySource>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lock-free on purpose: nodes are logged from inside guarded sections
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("is_scene", &self.is_scene)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Create a detached node with default state
    pub fn new() -> NodeRef {
        Self::with_state(NodeState::default())
    }

    /// Create a detached node with a name
    pub fn named(name: impl Into<String>) -> NodeRef {
        Self::with_state(NodeState {
            name: Some(name.into()),
            ..NodeState::default()
        })
    }

    /// Create a detached node from explicit state
    pub fn with_state(state: NodeState) -> NodeRef {
        Self::create(false, state, Vec::new(), ActionQueue::new(), Arc::new(SequentialKeys::new()))
    }

    /// Create a node whose generated action keys come from `keys`
    pub fn with_key_source(keys: Arc<dyn KeySource>) -> NodeRef {
        Self::create(false, NodeState::default(), Vec::new(), ActionQueue::new(), keys)
    }

    /// Create a scene root: its scene reference is itself and it can never
    /// be attached under another node
    pub fn new_scene() -> NodeRef {
        Self::create(true, NodeState::default(), Vec::new(), ActionQueue::new(), Arc::new(SequentialKeys::new()))
    }

    fn create(
        is_scene: bool,
        state: NodeState,
        children: Vec<NodeRef>,
        actions: ActionQueue,
        keys: Arc<dyn KeySource>,
    ) -> NodeRef {
        Arc::new_cyclic(|this| Self {
            id: NodeId::next(),
            is_scene,
            this: this.clone(),
            state: RwLock::new(state),
            links: RwLock::new(Links {
                parent: Weak::new(),
                scene: if is_scene { this.clone() } else { Weak::new() },
            }),
            children: Mutex::new(children),
            actions,
            keys,
        })
    }

    /// Shallow copy
    ///
    /// Scalar and geometry fields are copied by value. The child sequence
    /// and the action queue of the copy hold the *same* node and action
    /// references as the source; nothing below this node is cloned. The
    /// copy itself is detached (no parent, no scene unless it is a scene
    /// root), and the shared children keep their original parent.
    pub fn copy(&self) -> NodeRef {
        let state = read(&self.state).clone();
        let children = lock(&self.children).clone();
        let actions = ActionQueue::from_entries(self.actions.snapshot());
        let copy = Self::create(self.is_scene, state, children, actions, Arc::clone(&self.keys));
        log::debug!("Node {} copied to {}", self.id, copy.id);
        copy
    }

    // ------------------------------------------------------------------
    // Identity and state
    // ------------------------------------------------------------------

    /// Process-unique id
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn downgrade(&self) -> Weak<Node> {
        self.this.clone()
    }

    /// Whether this node was created with [`Node::new_scene`]
    pub fn is_scene_root(&self) -> bool {
        self.is_scene
    }

    /// Snapshot of every copied-by-value field
    pub fn state(&self) -> NodeState {
        read(&self.state).clone()
    }

    /// Mutate state under the node's state lock
    ///
    /// The closure must not call back into this node's state accessors.
    pub fn update_state<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> R {
        f(&mut write(&self.state))
    }

    /// Name, if set
    pub fn name(&self) -> Option<String> {
        read(&self.state).name.clone()
    }

    /// Set or clear the name
    pub fn set_name(&self, name: Option<String>) {
        write(&self.state).name = name;
    }

    /// Position in the parent's space
    pub fn position(&self) -> Point2 {
        read(&self.state).position
    }

    /// Set the position
    pub fn set_position(&self, position: Point2) {
        write(&self.state).position = position;
    }

    /// Depth used as the z translation
    pub fn z_position(&self) -> f32 {
        read(&self.state).z_position
    }

    /// Set the depth
    pub fn set_z_position(&self, z: f32) {
        write(&self.state).z_position = z;
    }

    /// Rotation around z in radians
    pub fn z_rotation(&self) -> f32 {
        read(&self.state).z_rotation
    }

    /// Set the rotation
    pub fn set_z_rotation(&self, radians: f32) {
        write(&self.state).z_rotation = radians;
    }

    /// Horizontal scale
    pub fn x_scale(&self) -> f32 {
        read(&self.state).x_scale
    }

    /// Vertical scale
    pub fn y_scale(&self) -> f32 {
        read(&self.state).y_scale
    }

    /// Set both scale factors to the same value
    pub fn set_scale(&self, scale: f32) {
        self.set_xy_scale(scale, scale);
    }

    /// Set the scale factors independently
    pub fn set_xy_scale(&self, x: f32, y: f32) {
        let mut state = write(&self.state);
        state.x_scale = x;
        state.y_scale = y;
    }

    /// Opacity
    pub fn alpha(&self) -> f32 {
        read(&self.state).alpha
    }

    /// Set the opacity
    pub fn set_alpha(&self, alpha: f32) {
        write(&self.state).alpha = alpha;
    }

    /// Action speed multiplier
    pub fn speed(&self) -> f32 {
        read(&self.state).speed
    }

    /// Set the action speed multiplier
    pub fn set_speed(&self, speed: f32) {
        write(&self.state).speed = speed;
    }

    /// Cached bounding rectangle
    pub fn frame(&self) -> Rect {
        read(&self.state).frame
    }

    /// Replace the cached bounding rectangle
    pub fn set_frame(&self, frame: Rect) {
        write(&self.state).frame = frame;
    }

    /// Whether `point` lies inside this node's frame
    pub fn contains_point(&self, point: Point2) -> bool {
        self.frame().contains_point(point)
    }

    /// All flags at once
    pub fn flags(&self) -> NodeFlags {
        read(&self.state).flags
    }

    fn set_flag(&self, flag: NodeFlags, value: bool) {
        write(&self.state).flags.set(flag, value);
    }

    /// Whether action advancement is suspended for this node
    pub fn is_paused(&self) -> bool {
        self.flags().contains(NodeFlags::PAUSED)
    }

    /// Suspend or resume this node's actions
    pub fn set_paused(&self, paused: bool) {
        self.set_flag(NodeFlags::PAUSED, paused);
    }

    /// Whether drawing skips this node's content and children
    pub fn is_hidden(&self) -> bool {
        self.flags().contains(NodeFlags::HIDDEN)
    }

    /// Hide or show
    pub fn set_hidden(&self, hidden: bool) {
        self.set_flag(NodeFlags::HIDDEN, hidden);
    }

    /// Whether the node accepts user input
    pub fn is_user_interaction_enabled(&self) -> bool {
        self.flags().contains(NodeFlags::USER_INTERACTION_ENABLED)
    }

    /// Enable or disable user input
    pub fn set_user_interaction_enabled(&self, enabled: bool) {
        self.set_flag(NodeFlags::USER_INTERACTION_ENABLED, enabled);
    }

    /// Drawable content
    pub fn content(&self) -> Option<Arc<dyn NodeContent>> {
        read(&self.state).content.clone()
    }

    /// Set or clear the drawable content
    pub fn set_content(&self, content: Option<Arc<dyn NodeContent>>) {
        write(&self.state).content = content;
    }

    /// Caller-owned data
    pub fn user_data(&self) -> Option<Handle> {
        read(&self.state).attachments.user_data.clone()
    }

    /// Store caller-owned data
    pub fn set_user_data(&self, data: Option<Handle>) {
        write(&self.state).attachments.user_data = data;
    }

    /// Physics body handle
    pub fn physics_body(&self) -> Option<Handle> {
        read(&self.state).attachments.physics_body.clone()
    }

    /// Store a physics body handle
    pub fn set_physics_body(&self, body: Option<Handle>) {
        write(&self.state).attachments.physics_body = body;
    }

    /// Reach constraint handle
    pub fn reach_constraints(&self) -> Option<Handle> {
        read(&self.state).attachments.reach_constraints.clone()
    }

    /// Store a reach constraint handle
    pub fn set_reach_constraints(&self, constraints: Option<Handle>) {
        write(&self.state).attachments.reach_constraints = constraints;
    }

    /// Constraint handles
    pub fn constraints(&self) -> Option<Vec<Handle>> {
        read(&self.state).attachments.constraints.clone()
    }

    /// Store constraint handles
    pub fn set_constraints(&self, constraints: Option<Vec<Handle>>) {
        write(&self.state).attachments.constraints = constraints;
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Parent node, if attached
    pub fn parent(&self) -> Option<NodeRef> {
        read(&self.links).parent.upgrade()
    }

    /// Scene root of the tree this node belongs to
    pub fn scene(&self) -> Option<NodeRef> {
        read(&self.links).scene.upgrade()
    }

    /// Whether `parent` is this node's current parent (no allocation, no upgrade)
    pub fn is_child_of(&self, parent: &Node) -> bool {
        ptr::eq(read(&self.links).parent.as_ptr(), parent)
    }

    /// Strict ancestor test: true iff `candidate` is found walking parent links upward
    pub fn is_descendant_of(&self, candidate: &Node) -> bool {
        let mut current = self.parent();
        while let Some(node) = current {
            if ptr::eq(Arc::as_ptr(&node), candidate) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Snapshot of the child sequence
    pub fn children(&self) -> Vec<NodeRef> {
        lock(&self.children).clone()
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        lock(&self.children).len()
    }

    /// First direct child with the given name
    pub fn child_named(&self, name: &str) -> Option<NodeRef> {
        lock(&self.children)
            .iter()
            .find(|child| read(&child.state).name.as_deref() == Some(name))
            .cloned()
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    /// Append `node` to the child sequence
    ///
    /// Rejects nodes that already have a parent, scene roots, this node and
    /// its ancestors. Use [`Node::move_to_parent`] to reparent.
    pub fn add_child(&self, node: &NodeRef) -> Result<(), SceneError> {
        self.attach(node, None)
    }

    /// Insert `node` at `index` in the child sequence (same rules as [`Node::add_child`])
    pub fn insert_child(&self, node: &NodeRef, index: usize) -> Result<(), SceneError> {
        self.attach(node, Some(index))
    }

    fn attach(&self, node: &NodeRef, index: Option<usize>) -> Result<(), SceneError> {
        let result = self.link_child(node, index);
        match &result {
            Ok(()) => {
                node.resync_scene();
                log::debug!("Node {} attached to {}", node.id, self.id);
            }
            Err(e) => log::warn!("Rejected attaching node {} to {}: {}", node.id, self.id, e),
        }
        result
    }

    fn link_child(&self, node: &NodeRef, index: Option<usize>) -> Result<(), SceneError> {
        if node.is_scene {
            return Err(StructuralViolation::SceneAsChild.into());
        }

        let _guard = lock(&REPARENT_GUARD);
        if ptr::eq(Arc::as_ptr(node), self) || self.is_descendant_of(node) {
            return Err(StructuralViolation::WouldCreateCycle.into());
        }

        let mut children = lock(&self.children);
        let index = match index {
            Some(index) if index > children.len() => {
                return Err(StructuralViolation::IndexOutOfBounds { index, len: children.len() }.into());
            }
            Some(index) => index,
            None => children.len(),
        };

        {
            let mut links = write(&node.links);
            if links.parent.upgrade().is_some() {
                return Err(StructuralViolation::AlreadyHasParent.into());
            }
            links.parent = self.this.clone();
        }
        children.insert(index, Arc::clone(node));
        Ok(())
    }

    /// Detach `self` from its current parent (if any) and append it to `new_parent`
    ///
    /// Cycle checks run before detaching, so a rejected move leaves the node
    /// where it was.
    pub fn move_to_parent(self: &Arc<Self>, new_parent: &Node) -> Result<(), SceneError> {
        if self.is_scene {
            return Err(StructuralViolation::SceneAsChild.into());
        }
        if ptr::eq(Arc::as_ptr(self), new_parent) || new_parent.is_descendant_of(self) {
            return Err(StructuralViolation::WouldCreateCycle.into());
        }
        if self.is_child_of(new_parent) {
            return Ok(());
        }
        self.remove_from_parent();
        new_parent.add_child(self)
    }

    /// Remove `node` from the child sequence; returns false if it was not a child
    pub fn remove_child(&self, node: &Node) -> bool {
        let removed = {
            let mut children = lock(&self.children);
            match children.iter().position(|child| ptr::eq(Arc::as_ptr(child), node)) {
                Some(index) => {
                    let child = children.remove(index);
                    write(&child.links).parent = Weak::new();
                    Some(child)
                }
                None => None,
            }
        };

        match removed {
            Some(child) => {
                child.resync_scene();
                log::debug!("Node {} removed from {}", child.id, self.id);
                true
            }
            None => false,
        }
    }

    /// Remove every node in `nodes` that is a direct child; returns how many were removed
    pub fn remove_children(&self, nodes: &[NodeRef]) -> usize {
        let removed = {
            let mut children = lock(&self.children);
            let mut removed = Vec::new();
            children.retain(|child| {
                if nodes.iter().any(|node| Arc::ptr_eq(node, child)) {
                    write(&child.links).parent = Weak::new();
                    removed.push(Arc::clone(child));
                    false
                } else {
                    true
                }
            });
            removed
        };

        for child in &removed {
            child.resync_scene();
        }
        log::debug!("Removed {} children from node {}", removed.len(), self.id);
        removed.len()
    }

    /// Remove every child; returns the detached nodes
    pub fn remove_all_children(&self) -> Vec<NodeRef> {
        let removed = {
            let mut children = lock(&self.children);
            for child in children.iter() {
                write(&child.links).parent = Weak::new();
            }
            std::mem::take(&mut *children)
        };

        for child in &removed {
            child.resync_scene();
        }
        log::debug!("Removed all {} children from node {}", removed.len(), self.id);
        removed
    }

    /// Detach from the parent; no-op (returns false) when there is none
    ///
    /// Queued actions stay on the detached node.
    pub fn remove_from_parent(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => false,
        }
    }

    /// Re-derive the scene reference for this subtree from each node's parent
    ///
    /// Each node's scene is written under its own `links` lock while reading
    /// the parent's, so whichever mutation touched a parent last also
    /// determines what its descendants end up with.
    fn resync_scene(&self) {
        {
            let mut links = write(&self.links);
            links.scene = if self.is_scene {
                self.this.clone()
            } else {
                match links.parent.upgrade() {
                    Some(parent) => read(&parent.links).scene.clone(),
                    None => Weak::new(),
                }
            };
        }
        for child in self.children() {
            child.resync_scene();
        }
    }

    // ------------------------------------------------------------------
    // Surface without an implementation
    // ------------------------------------------------------------------

    /// Deepest descendant containing `point`
    pub fn node_at(&self, _point: Point2) -> Result<Option<NodeRef>, SceneError> {
        Err(SceneError::Unimplemented("node_at"))
    }

    /// Every descendant containing `point`
    pub fn nodes_at(&self, _point: Point2) -> Result<Vec<NodeRef>, SceneError> {
        Err(SceneError::Unimplemented("nodes_at"))
    }

    /// Convert `point` from `node`'s space into this node's space
    pub fn convert_from(&self, _point: Point2, _node: &Node) -> Result<Point2, SceneError> {
        Err(SceneError::Unimplemented("convert_from"))
    }

    /// Convert `point` from this node's space into `node`'s space
    pub fn convert_to(&self, _point: Point2, _node: &Node) -> Result<Point2, SceneError> {
        Err(SceneError::Unimplemented("convert_to"))
    }

    /// Whether the accumulated frames of both nodes overlap
    pub fn intersects(&self, _node: &Node) -> Result<bool, SceneError> {
        Err(SceneError::Unimplemented("intersects"))
    }

    /// Visit descendants matching a name pattern; the callback can set its flag to stop
    pub fn enumerate_child_nodes<F>(&self, _name: &str, _visit: F) -> Result<(), SceneError>
    where
        F: FnMut(&NodeRef, &mut bool),
    {
        Err(SceneError::Unimplemented("enumerate_child_nodes"))
    }

    /// Union of this node's frame with every descendant's
    pub fn calculate_accumulated_frame(&self) -> Result<Rect, SceneError> {
        Err(SceneError::Unimplemented("calculate_accumulated_frame"))
    }
}
