//! Render traversal
//!
//! Drawing is delegated to a [`Renderer`], which only has to understand a
//! save/restore transform stack. Each node applies its own transform in a
//! fixed order (translate, rotate, scale), draws its [`NodeContent`] and then
//! each child between a `save_state`/`restore_state` pair.
//!
//! The traversal never aborts a frame because of one node: content errors
//! and panics raised while drawing a child subtree are logged, counted in
//! [`DrawStats`], and the renderer stack is rebalanced before moving on to
//! the next sibling.

use std::fmt;
use std::ops::AddAssign;
use std::panic::{self, AssertUnwindSafe};

use crate::foundation::math::{Mat4, Point2, Point3, Rotation3, Vec3};

use super::error::SceneError;
use super::node::{Node, NodeFlags};

/// Transform-stack drawing backend
pub trait Renderer {
    /// Translate the current transform
    fn translate(&mut self, x: f32, y: f32, z: f32);
    /// Rotate the current transform by euler angles (radians) around x, y and z
    fn rotate(&mut self, axis_angles: Vec3);
    /// Scale the current transform in x and y
    fn scale(&mut self, sx: f32, sy: f32);
    /// Push a copy of the current transform
    fn save_state(&mut self);
    /// Pop back to the last saved transform
    fn restore_state(&mut self);
}

/// What a node draws in its own coordinate space, before its children
pub trait NodeContent: Send + Sync + fmt::Debug {
    /// Issue draw calls for `node`
    fn draw(&self, node: &Node, renderer: &mut dyn Renderer) -> Result<(), SceneError>;
}

/// Counters collected by one render traversal
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    /// Nodes whose transform was applied
    pub nodes_visited: usize,
    /// Visited nodes that were not hidden
    pub nodes_drawn: usize,
    /// Snapshot children skipped because they were removed mid-traversal
    pub nodes_skipped: usize,
    /// Content errors and panics caught
    pub faults: usize,
}

impl AddAssign for DrawStats {
    fn add_assign(&mut self, other: Self) {
        self.nodes_visited += other.nodes_visited;
        self.nodes_drawn += other.nodes_drawn;
        self.nodes_skipped += other.nodes_skipped;
        self.faults += other.faults;
    }
}

/// Wraps the caller's renderer and counts unmatched saves
struct Balanced<'a> {
    inner: &'a mut dyn Renderer,
    depth: usize,
}

impl Balanced<'_> {
    fn unwind_to(&mut self, depth: usize) {
        while self.depth > depth {
            self.restore_state();
        }
    }
}

impl Renderer for Balanced<'_> {
    fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.inner.translate(x, y, z);
    }

    fn rotate(&mut self, axis_angles: Vec3) {
        self.inner.rotate(axis_angles);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.inner.scale(sx, sy);
    }

    fn save_state(&mut self) {
        self.depth += 1;
        self.inner.save_state();
    }

    fn restore_state(&mut self) {
        // Content that restores more than it saved must not pop the caller's state
        if self.depth > 0 {
            self.depth -= 1;
            self.inner.restore_state();
        }
    }
}

impl Node {
    /// Draw this node and its subtree
    ///
    /// The caller's current renderer state is left as this node's transform;
    /// wrap the call in `save_state`/`restore_state` to undo it.
    pub fn draw(&self, renderer: &mut dyn Renderer) -> DrawStats {
        let mut stats = DrawStats::default();
        let mut balanced = Balanced { inner: renderer, depth: 0 };
        self.draw_into(&mut balanced, &mut stats);
        balanced.unwind_to(0);
        stats
    }

    fn draw_into(&self, renderer: &mut Balanced<'_>, stats: &mut DrawStats) {
        let state = self.state();
        stats.nodes_visited += 1;

        renderer.translate(state.position.x, state.position.y, state.z_position);
        renderer.rotate(Vec3::new(0.0, 0.0, state.z_rotation));
        renderer.scale(state.x_scale, state.y_scale);

        if state.flags.contains(NodeFlags::HIDDEN) {
            return;
        }
        stats.nodes_drawn += 1;

        if let Some(content) = &state.content {
            let depth = renderer.depth;
            let result = panic::catch_unwind(AssertUnwindSafe(|| content.draw(self, &mut *renderer)));
            renderer.unwind_to(depth);
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("Content of node {} failed to draw: {}", self.id(), e);
                    stats.faults += 1;
                }
                Err(_) => {
                    log::error!("Content of node {} panicked while drawing", self.id());
                    stats.faults += 1;
                }
            }
        }

        for child in self.children() {
            if !child.is_child_of(self) {
                log::trace!("Skipping node {} removed from {} during draw", child.id(), self.id());
                stats.nodes_skipped += 1;
                continue;
            }

            let depth = renderer.depth;
            renderer.save_state();
            let result = panic::catch_unwind(AssertUnwindSafe(|| child.draw_into(&mut *renderer, &mut *stats)));
            renderer.unwind_to(depth);
            if result.is_err() {
                log::error!("Drawing subtree of node {} panicked", child.id());
                stats.faults += 1;
            }
        }
    }
}

/// Renderer that accumulates the current transform in a matrix
///
/// Useful on its own for computing world positions and as the transform half
/// of a real backend.
#[derive(Debug, Clone)]
pub struct TransformStack {
    current: Mat4,
    saved: Vec<Mat4>,
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformStack {
    /// Start from the identity transform with an empty stack
    pub fn new() -> Self {
        Self {
            current: Mat4::identity(),
            saved: Vec::new(),
        }
    }

    /// Current transform
    pub fn current(&self) -> &Mat4 {
        &self.current
    }

    /// Number of saved states
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Map a point from the current local space into the root space
    pub fn transform_point(&self, point: Point2) -> Point2 {
        let world = self.current.transform_point(&Point3::new(point.x, point.y, 0.0));
        Point2::new(world.x, world.y)
    }
}

impl Renderer for TransformStack {
    fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.current *= Mat4::new_translation(&Vec3::new(x, y, z));
    }

    fn rotate(&mut self, axis_angles: Vec3) {
        let rotation = Rotation3::from_euler_angles(axis_angles.x, axis_angles.y, axis_angles.z);
        self.current *= rotation.to_homogeneous();
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.current *= Mat4::new_nonuniform_scaling(&Vec3::new(sx, sy, 1.0));
    }

    fn save_state(&mut self) {
        self.saved.push(self.current);
    }

    fn restore_state(&mut self) {
        match self.saved.pop() {
            Some(saved) => self.current = saved,
            None => log::warn!("restore_state called with an empty transform stack"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeRef;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Translate(f32, f32, f32),
        Rotate(f32),
        Scale(f32, f32),
        Save,
        Restore,
    }

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<Call>,
    }

    impl Renderer for Recorder {
        fn translate(&mut self, x: f32, y: f32, z: f32) {
            self.calls.push(Call::Translate(x, y, z));
        }
        fn rotate(&mut self, axis_angles: Vec3) {
            self.calls.push(Call::Rotate(axis_angles.z));
        }
        fn scale(&mut self, sx: f32, sy: f32) {
            self.calls.push(Call::Scale(sx, sy));
        }
        fn save_state(&mut self) {
            self.calls.push(Call::Save);
        }
        fn restore_state(&mut self) {
            self.calls.push(Call::Restore);
        }
    }

    impl Recorder {
        fn balance(&self) -> i32 {
            self.calls.iter().fold(0, |depth, call| match call {
                Call::Save => depth + 1,
                Call::Restore => depth - 1,
                _ => depth,
            })
        }
    }

    /// Collects the names of the nodes it was drawn for
    #[derive(Debug, Default)]
    struct Label {
        drawn: Mutex<Vec<String>>,
    }

    impl NodeContent for Label {
        fn draw(&self, node: &Node, _renderer: &mut dyn Renderer) -> Result<(), SceneError> {
            self.drawn.lock().unwrap().push(node.name().unwrap_or_default());
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl NodeContent for Broken {
        fn draw(&self, _node: &Node, _renderer: &mut dyn Renderer) -> Result<(), SceneError> {
            Err(SceneError::Content("missing texture".into()))
        }
    }

    #[derive(Debug)]
    struct Panicking;

    impl NodeContent for Panicking {
        fn draw(&self, _node: &Node, renderer: &mut dyn Renderer) -> Result<(), SceneError> {
            renderer.save_state();
            renderer.save_state();
            panic!("content exploded");
        }
    }

    fn labelled(name: &str, label: &Arc<Label>) -> NodeRef {
        let node = Node::named(name);
        node.set_content(Some(Arc::clone(label) as Arc<dyn NodeContent>));
        node
    }

    #[test]
    fn test_transform_order() {
        let node = Node::new();
        node.set_position(Point2::new(1.0, 2.0));
        node.set_z_position(3.0);
        node.set_z_rotation(0.5);
        node.set_xy_scale(4.0, 5.0);

        let mut recorder = Recorder::default();
        let stats = node.draw(&mut recorder);

        assert_eq!(
            recorder.calls,
            vec![Call::Translate(1.0, 2.0, 3.0), Call::Rotate(0.5), Call::Scale(4.0, 5.0)]
        );
        assert_eq!(stats.nodes_drawn, 1);
    }

    #[test]
    fn test_children_wrapped_in_save_restore() {
        let root = Node::new();
        let a = Node::new();
        let b = Node::new();
        let leaf = Node::new();
        root.add_child(&a).unwrap();
        root.add_child(&b).unwrap();
        a.add_child(&leaf).unwrap();

        let mut recorder = Recorder::default();
        let stats = root.draw(&mut recorder);

        assert_eq!(stats.nodes_visited, 4);
        assert_eq!(recorder.calls.iter().filter(|c| **c == Call::Save).count(), 3);
        assert_eq!(recorder.balance(), 0);
        assert_eq!(recorder.calls[3], Call::Save);
        assert_eq!(recorder.calls.last(), Some(&Call::Restore));
    }

    #[test]
    fn test_content_drawn_in_child_order() {
        let label = Arc::new(Label::default());
        let root = labelled("root", &label);
        for name in ["first", "second", "third"] {
            root.add_child(&labelled(name, &label)).unwrap();
        }

        root.draw(&mut Recorder::default());

        assert_eq!(*label.drawn.lock().unwrap(), vec!["root", "first", "second", "third"]);
    }

    #[test]
    fn test_hidden_node_skips_content_and_children() {
        let label = Arc::new(Label::default());
        let root = labelled("root", &label);
        let hidden = labelled("hidden", &label);
        hidden.add_child(&labelled("under-hidden", &label)).unwrap();
        hidden.set_hidden(true);
        root.add_child(&hidden).unwrap();

        let mut recorder = Recorder::default();
        let stats = root.draw(&mut recorder);

        assert_eq!(*label.drawn.lock().unwrap(), vec!["root"]);
        assert_eq!(stats.nodes_visited, 2);
        assert_eq!(stats.nodes_drawn, 1);
        assert_eq!(recorder.balance(), 0);
    }

    #[test]
    fn test_content_error_is_counted_and_children_still_drawn() {
        let label = Arc::new(Label::default());
        let root = Node::new();
        root.set_content(Some(Arc::new(Broken)));
        root.add_child(&labelled("child", &label)).unwrap();

        let stats = root.draw(&mut Recorder::default());

        assert_eq!(stats.faults, 1);
        assert_eq!(*label.drawn.lock().unwrap(), vec!["child"]);
    }

    #[test]
    fn test_panicking_child_does_not_stop_siblings() {
        let label = Arc::new(Label::default());
        let root = Node::new();
        let bad = Node::new();
        bad.set_content(Some(Arc::new(Panicking)));
        bad.add_child(&labelled("under-bad", &label)).unwrap();
        root.add_child(&labelled("before", &label)).unwrap();
        root.add_child(&bad).unwrap();
        root.add_child(&labelled("after", &label)).unwrap();

        let mut recorder = Recorder::default();
        let stats = root.draw(&mut recorder);

        assert_eq!(stats.faults, 1);
        assert_eq!(*label.drawn.lock().unwrap(), vec!["before", "under-bad", "after"]);
        assert_eq!(recorder.balance(), 0);
    }

    #[test]
    fn test_transform_stack_accumulates() {
        let mut stack = TransformStack::new();
        stack.translate(10.0, 0.0, 0.0);
        stack.save_state();
        stack.rotate(Vec3::new(0.0, 0.0, FRAC_PI_2));
        stack.scale(2.0, 2.0);

        let p = stack.transform_point(Point2::new(1.0, 0.0));
        assert_relative_eq!(p, Point2::new(10.0, 2.0), epsilon = 1e-5);
        assert_eq!(stack.depth(), 1);

        stack.restore_state();
        let p = stack.transform_point(Point2::new(1.0, 0.0));
        assert_relative_eq!(p, Point2::new(11.0, 0.0), epsilon = 1e-5);

        // Unbalanced restore leaves the transform alone
        stack.restore_state();
        assert_eq!(stack.depth(), 0);
        assert_relative_eq!(stack.transform_point(Point2::origin()), Point2::new(10.0, 0.0));
    }

    #[test]
    fn test_transform_stack_through_tree() {
        let root = Node::new();
        root.set_position(Point2::new(5.0, 5.0));
        let child = Node::new();
        child.set_position(Point2::new(1.0, 0.0));
        child.set_scale(3.0);
        root.add_child(&child).unwrap();

        let mut stack = TransformStack::new();
        root.draw(&mut stack);

        // Child state was restored, only the root transform remains
        assert_eq!(stack.depth(), 0);
        assert_relative_eq!(stack.transform_point(Point2::origin()), Point2::new(5.0, 5.0));
    }
}
