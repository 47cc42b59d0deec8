//! Action queues on nodes and the tick traversal

use std::ops::AddAssign;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::actions::{ActionRef, ActionStatus};

use super::node::Node;

/// Counters collected by one tick traversal
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// Nodes reached by the traversal
    pub nodes_visited: usize,
    /// Queue heads stepped
    pub actions_stepped: usize,
    /// Actions that finished and were dequeued by this traversal
    pub actions_completed: usize,
    /// Panics caught inside action steps or completions
    pub faults: usize,
}

impl AddAssign for TickStats {
    fn add_assign(&mut self, other: Self) {
        self.nodes_visited += other.nodes_visited;
        self.actions_stepped += other.actions_stepped;
        self.actions_completed += other.actions_completed;
        self.faults += other.faults;
    }
}

impl Node {
    /// Enqueue `action` under a generated key and return the key
    pub fn run_action(&self, action: &ActionRef) -> String {
        let key = self.keys.next_key();
        self.enqueue(action, key.clone());
        key
    }

    /// Enqueue `action` under a caller-supplied key
    pub fn run_action_with_key(&self, action: &ActionRef, key: impl Into<String>) {
        self.enqueue(action, key.into());
    }

    /// Enqueue `action` with a callback fired exactly once when it completes
    ///
    /// The callback is dropped unfired if the action is removed first.
    pub fn run_action_with_completion<F>(&self, action: &ActionRef, completion: F) -> String
    where
        F: FnOnce() + Send + 'static,
    {
        action.set_completion(completion);
        self.run_action(action)
    }

    fn enqueue(&self, action: &ActionRef, key: String) {
        log::trace!("Node {} queued action '{}'", self.id(), key);
        action.set_key(key);
        action.set_target(self.downgrade());
        self.actions.push(Arc::clone(action));
    }

    /// Whether any action is queued
    pub fn has_actions(&self) -> bool {
        !self.actions.is_empty()
    }

    /// First queued action carrying `key`
    pub fn action(&self, key: &str) -> Option<ActionRef> {
        self.actions.find(key)
    }

    /// Keys of the queued actions, head first
    pub fn action_keys(&self) -> Vec<String> {
        self.actions.keys()
    }

    /// Snapshot of the queued actions, head first
    pub fn actions(&self) -> Vec<ActionRef> {
        self.actions.snapshot()
    }

    /// Cancel and dequeue every action carrying `key`; returns how many were removed
    ///
    /// An action that finished its last step but has not been dequeued by the
    /// tick yet is cancelled too, and its completion never fires.
    pub fn remove_action(&self, key: &str) -> usize {
        let removed = self.actions.remove_by_key(key);
        for action in &removed {
            action.revoke();
        }
        if !removed.is_empty() {
            log::debug!("Node {} cancelled {} action(s) keyed '{}'", self.id(), removed.len(), key);
        }
        removed.len()
    }

    /// Cancel and dequeue every action
    pub fn remove_all_actions(&self) -> usize {
        let removed = self.actions.drain();
        for action in &removed {
            action.revoke();
        }
        removed.len()
    }

    /// Advance the queue head of every non-paused node in this subtree by `dt` seconds
    ///
    /// Each node scales `dt` by its own speed. A node's children are ticked
    /// from a snapshot taken after the node itself, and children removed in
    /// the meantime are skipped.
    pub fn tick(&self, dt: f32) -> TickStats {
        let mut stats = TickStats::default();
        self.tick_into(dt, &mut stats);
        stats
    }

    fn tick_into(&self, dt: f32, stats: &mut TickStats) {
        stats.nodes_visited += 1;
        if !self.is_paused() {
            self.step_head(dt * self.speed(), stats);
        }

        for child in self.children() {
            if child.is_child_of(self) {
                child.tick_into(dt, stats);
            }
        }
    }

    fn step_head(&self, dt: f32, stats: &mut TickStats) {
        let Some(head) = self.actions.head() else {
            return;
        };
        stats.actions_stepped += 1;

        match panic::catch_unwind(AssertUnwindSafe(|| head.step(self, dt))) {
            Ok(ActionStatus::Running) => {}
            Ok(ActionStatus::Completed) => {
                // Whoever dequeues the entry decides between completion and cancellation.
                // A failed removal means a remover got there first and revoked it.
                if !self.actions.remove_entry(&head) {
                    return;
                }
                stats.actions_completed += 1;
                log::trace!("Node {} completed action '{}'", self.id(), head.key());
                if let Some(completion) = head.take_completion() {
                    if panic::catch_unwind(AssertUnwindSafe(completion)).is_err() {
                        log::error!("Completion of action '{}' on node {} panicked", head.key(), self.id());
                        stats.faults += 1;
                    }
                }
            }
            Ok(ActionStatus::Cancelled) => {
                self.actions.remove_entry(&head);
            }
            Err(_) => {
                log::error!("Action '{}' on node {} panicked; cancelling it", head.key(), self.id());
                head.revoke();
                self.actions.remove_entry(&head);
                stats.faults += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionKind, ActionPhase, SequentialKeys};
    use crate::foundation::math::Point2;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_generated_keys_are_sequential() {
        let node = Node::new();
        let first = node.run_action(&Action::new(ActionKind::wait(1.0)));
        let second = node.run_action(&Action::new(ActionKind::wait(1.0)));
        assert_eq!(first, "action-0");
        assert_eq!(second, "action-1");
        assert_eq!(node.action_keys(), vec!["action-0", "action-1"]);
    }

    #[test]
    fn test_injected_key_source() {
        let node = Node::with_key_source(Arc::new(SequentialKeys::with_prefix("anim")));
        assert_eq!(node.run_action(&Action::new(ActionKind::wait(1.0))), "anim-0");
    }

    #[test]
    fn test_run_action_sets_target() {
        let node = Node::new();
        let action = Action::new(ActionKind::wait(1.0));
        node.run_action_with_key(&action, "idle");

        assert!(action.target().is_some_and(|t| Arc::ptr_eq(&t, &node)));
        assert!(node.action("idle").is_some_and(|a| Arc::ptr_eq(&a, &action)));
        assert!(node.has_actions());
    }

    #[test]
    fn test_completion_fires_exactly_once() {
        let node = Node::new();
        let (fired, completion) = counter();
        let action = Action::new(ActionKind::move_by(10.0, 0.0, 1.0));
        node.run_action_with_completion(&action, completion);

        let stats = node.tick(0.5);
        assert_eq!(stats.actions_completed, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let stats = node.tick(0.5);
        assert_eq!(stats.actions_completed, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(action.phase(), ActionPhase::Completed);
        assert!(!node.has_actions());
        assert_relative_eq!(node.position(), Point2::new(10.0, 0.0));

        node.tick(1.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_before_completion_never_fires() {
        let node = Node::new();
        let (fired, completion) = counter();
        let action = Action::new(ActionKind::wait(1.0));
        let key = node.run_action_with_completion(&action, completion);

        node.tick(0.5);
        assert_eq!(node.remove_action(&key), 1);
        node.tick(1.0);

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(action.phase(), ActionPhase::Cancelled);
    }

    #[test]
    fn test_remove_after_final_step_cancels() {
        let node = Node::new();
        let (fired, completion) = counter();
        let action = Action::new(ActionKind::wait(0.5));
        let key = node.run_action_with_completion(&action, completion);

        // Finished but still queued, as if a remover ran between step and dequeue
        action.step(&node, 0.5);
        assert_eq!(action.phase(), ActionPhase::Completed);
        assert_eq!(node.remove_action(&key), 1);

        assert_eq!(action.phase(), ActionPhase::Cancelled);
        assert!(!action.has_completion());
        assert_eq!(node.tick(1.0).actions_completed, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_only_head_advances() {
        let node = Node::new();
        let first = Action::new(ActionKind::wait(1.0));
        let second = Action::new(ActionKind::move_by(5.0, 0.0, 1.0));
        node.run_action(&first);
        node.run_action(&second);

        node.tick(0.25);

        assert_relative_eq!(first.elapsed(), 0.25);
        assert_eq!(second.phase(), ActionPhase::Pending);
        assert_eq!(second.elapsed(), 0.0);
        assert_relative_eq!(node.position(), Point2::origin());
    }

    #[test]
    fn test_next_action_starts_on_following_tick() {
        let node = Node::new();
        node.run_action(&Action::new(ActionKind::wait(0.5)));
        let second = Action::new(ActionKind::rotate_by(1.0, 1.0));
        node.run_action(&second);

        node.tick(0.5);
        assert_eq!(second.phase(), ActionPhase::Pending);
        node.tick(0.5);
        assert_relative_eq!(node.z_rotation(), 0.5);
    }

    #[test]
    fn test_paused_node_does_not_advance_but_children_do() {
        let parent = Node::new();
        let child = Node::new();
        parent.add_child(&child).unwrap();
        parent.set_paused(true);

        let parent_action = Action::new(ActionKind::wait(1.0));
        let child_action = Action::new(ActionKind::wait(1.0));
        parent.run_action(&parent_action);
        child.run_action(&child_action);

        let stats = parent.tick(0.5);

        assert_eq!(stats.nodes_visited, 2);
        assert_eq!(parent_action.phase(), ActionPhase::Pending);
        assert_relative_eq!(child_action.elapsed(), 0.5);
    }

    #[test]
    fn test_speed_scales_delta() {
        let node = Node::new();
        node.set_speed(2.0);
        let action = Action::new(ActionKind::move_by(4.0, 0.0, 1.0));
        node.run_action(&action);

        node.tick(0.25);
        assert_relative_eq!(action.elapsed(), 0.5);
        assert_relative_eq!(node.position(), Point2::new(2.0, 0.0));
    }

    #[test]
    fn test_remove_all_actions_cancels_everything() {
        let node = Node::new();
        let (fired, completion) = counter();
        let a = Action::new(ActionKind::wait(1.0));
        let b = Action::new(ActionKind::wait(1.0));
        node.run_action_with_completion(&a, completion);
        node.run_action(&b);

        assert_eq!(node.remove_all_actions(), 2);
        assert!(!node.has_actions());
        assert_eq!(a.phase(), ActionPhase::Cancelled);
        assert_eq!(b.phase(), ActionPhase::Cancelled);
        node.tick(2.0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_action_removes_every_match() {
        let node = Node::new();
        node.run_action_with_key(&Action::new(ActionKind::wait(1.0)), "dup");
        node.run_action_with_key(&Action::new(ActionKind::wait(1.0)), "keep");
        node.run_action_with_key(&Action::new(ActionKind::wait(1.0)), "dup");

        assert_eq!(node.remove_action("dup"), 2);
        assert_eq!(node.remove_action("missing"), 0);
        assert_eq!(node.action_keys(), vec!["keep"]);
    }

    #[test]
    fn test_panicking_action_is_cancelled_and_counted() {
        let node = Node::new();
        let sibling = Node::new();
        let root = Node::new();
        root.add_child(&node).unwrap();
        root.add_child(&sibling).unwrap();

        let bad = Action::new(ActionKind::custom(1.0, |_, _| panic!("bad block")));
        node.run_action(&bad);
        let good = Action::new(ActionKind::wait(1.0));
        sibling.run_action(&good);

        let stats = root.tick(0.5);

        assert_eq!(stats.faults, 1);
        assert_eq!(bad.phase(), ActionPhase::Cancelled);
        assert!(!node.has_actions());
        assert_relative_eq!(good.elapsed(), 0.5);
    }

    #[test]
    fn test_custom_block_can_edit_own_queue() {
        let node = Node::new();
        let follow_up = Action::new(ActionKind::wait(1.0));
        let queued = Arc::clone(&follow_up);
        let action = Action::new(ActionKind::custom(0.0, move |target, _| {
            target.run_action_with_key(&queued, "follow-up");
        }));
        node.run_action(&action);

        node.tick(0.1);

        assert_eq!(node.action_keys(), vec!["follow-up"]);
    }

    #[test]
    fn test_detached_node_keeps_actions() {
        let parent = Node::new();
        let child = Node::new();
        parent.add_child(&child).unwrap();
        let action = Action::new(ActionKind::wait(1.0));
        child.run_action(&action);

        child.remove_from_parent();
        parent.tick(1.0);
        assert!(child.has_actions());

        child.tick(1.0);
        assert_eq!(action.phase(), ActionPhase::Completed);
    }

    #[test]
    fn test_tick_stats_accumulate() {
        let mut total = TickStats::default();
        total += TickStats { nodes_visited: 2, actions_stepped: 1, actions_completed: 1, faults: 0 };
        total += TickStats { nodes_visited: 3, actions_stepped: 0, actions_completed: 0, faults: 1 };
        assert_eq!(total, TickStats { nodes_visited: 5, actions_stepped: 1, actions_completed: 1, faults: 1 });
    }
}
