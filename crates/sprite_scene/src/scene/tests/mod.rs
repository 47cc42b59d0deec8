//! Whole-tree scenarios exercising mutation, tick and draw together


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;

use crate::actions::{Action, ActionKind, ActionPhase};
use crate::foundation::logging;
use crate::foundation::math::Point2;
use crate::scene::{Node, NodeRef, TransformStack};

/// scene -> [ship -> [gun, flame], hud]
pub(super) fn build_scene() -> (NodeRef, Vec<NodeRef>) {
    let scene = Node::new_scene();
    let ship = Node::named("ship");
    let gun = Node::named("gun");
    let flame = Node::named("flame");
    let hud = Node::named("hud");

    scene.add_child(&ship).unwrap();
    ship.add_child(&gun).unwrap();
    ship.add_child(&flame).unwrap();
    scene.add_child(&hud).unwrap();

    (scene, vec![ship, gun, flame, hud])
}

#[test]
fn test_subtree_moves_between_scenes() {
    logging::init_for_tests();
    let (scene, nodes) = build_scene();
    let other = Node::new_scene();
    let ship = &nodes[0];

    ship.move_to_parent(&other).unwrap();

    for node in &nodes[..3] {
        assert!(node.scene().is_some_and(|s| Arc::ptr_eq(&s, &other)));
    }
    assert!(nodes[3].scene().is_some_and(|s| Arc::ptr_eq(&s, &scene)));
    assert_eq!(scene.child_count(), 1);
}

#[test]
fn test_detached_subtree_can_be_reattached() {
    let (scene, nodes) = build_scene();
    let ship = &nodes[0];
    let gun = &nodes[1];

    ship.remove_from_parent();
    assert!(gun.scene().is_none());

    scene.insert_child(ship, 0).unwrap();
    assert!(gun.scene().is_some_and(|s| Arc::ptr_eq(&s, &scene)));
    assert!(Arc::ptr_eq(&scene.children()[0], ship));
}

#[test]
fn test_actions_across_tree_then_draw() {
    logging::init_for_tests();
    let (scene, nodes) = build_scene();
    let ship = &nodes[0];
    let gun = &nodes[1];
    let completed = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&completed);
    ship.run_action_with_completion(&Action::new(ActionKind::move_to(10.0, 0.0, 1.0)), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let spin = Action::new(ActionKind::Sequence(vec![
        ActionKind::wait(0.5),
        ActionKind::rotate_by(1.0, 0.5),
    ]));
    gun.run_action_with_key(&spin, "spin");
    gun.set_position(Point2::new(0.0, 2.0));

    let mut total = 0;
    for _ in 0..4 {
        let stats = scene.tick(0.25);
        assert_eq!(stats.nodes_visited, 5);
        total += stats.actions_completed;
    }

    assert_eq!(total, 2);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
    assert_eq!(spin.phase(), ActionPhase::Completed);
    assert_relative_eq!(gun.z_rotation(), 1.0);

    let mut stack = TransformStack::new();
    let stats = scene.draw(&mut stack);
    assert_eq!(stats.nodes_drawn, 5);
    assert_eq!(stats.faults, 0);
    assert_eq!(stack.depth(), 0);
}

#[test]
fn test_copy_of_populated_node() {
    let (_scene, nodes) = build_scene();
    let ship = &nodes[0];
    ship.set_position(Point2::new(4.0, -1.0));
    let action = Action::new(ActionKind::wait(3.0));
    ship.run_action(&action);

    let copy = ship.copy();

    assert_eq!(copy.position(), ship.position());
    assert!(copy.parent().is_none());
    assert!(copy.scene().is_none());
    let children = copy.children();
    assert!(Arc::ptr_eq(&children[0], &nodes[1]));
    assert!(Arc::ptr_eq(&children[1], &nodes[2]));
    assert!(Arc::ptr_eq(&copy.actions()[0], &action));
    assert!(nodes[1].is_child_of(ship));
}
