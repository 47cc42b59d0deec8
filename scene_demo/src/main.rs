//! Scene graph demo application
//!
//! Builds a small fleet scene, lets a worker thread shuffle ships between
//! formations while the main thread runs frames, and logs every draw call
//! at trace level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use sprite_scene::prelude::*;
use thiserror::Error;

const FRAMES: usize = 240;
const FRAME_DELTA: f32 = 1.0 / 60.0;

#[derive(Error, Debug)]
enum AppError {
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Worker thread panicked")]
    Worker,
}

/// Forwards draw calls to a transform stack and traces them
#[derive(Default)]
struct LoggingRenderer {
    stack: TransformStack,
    calls: usize,
}

impl Renderer for LoggingRenderer {
    fn translate(&mut self, x: f32, y: f32, z: f32) {
        log::trace!("translate({:.2}, {:.2}, {:.2})", x, y, z);
        self.calls += 1;
        self.stack.translate(x, y, z);
    }

    fn rotate(&mut self, axis_angles: Vec3) {
        log::trace!("rotate({:.3})", axis_angles.z);
        self.calls += 1;
        self.stack.rotate(axis_angles);
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        log::trace!("scale({:.2}, {:.2})", sx, sy);
        self.calls += 1;
        self.stack.scale(sx, sy);
    }

    fn save_state(&mut self) {
        self.stack.save_state();
    }

    fn restore_state(&mut self) {
        self.stack.restore_state();
    }
}

/// Hull outline; traces the ship it is drawn for
#[derive(Debug)]
struct Hull;

impl NodeContent for Hull {
    fn draw(&self, node: &Node, _renderer: &mut dyn Renderer) -> Result<(), SceneError> {
        log::trace!("hull '{}'", node.name().unwrap_or_default());
        Ok(())
    }
}

fn build_fleet(root: &NodeRef) -> Result<(Vec<NodeRef>, Vec<NodeRef>), AppError> {
    let formations: Vec<_> = (0..3)
        .map(|i| {
            let formation = Node::named(format!("formation-{}", i));
            formation.set_position(Point2::new(i as f32 * 200.0, 100.0));
            formation
        })
        .collect();
    for formation in &formations {
        root.add_child(formation)?;
        formation.run_action(&Action::with_timing(
            ActionKind::rotate_by(std::f32::consts::TAU, 4.0),
            TimingFunction::EaseInOut,
        ));
    }

    let hull: Arc<dyn NodeContent> = Arc::new(Hull);
    let mut ships = Vec::new();
    for i in 0..8 {
        let ship = Node::named(format!("ship-{}", i));
        ship.set_content(Some(Arc::clone(&hull)));
        ship.set_position(Point2::new(0.0, i as f32 * 10.0));
        formations[i % formations.len()].add_child(&ship)?;
        ships.push(ship);
    }

    Ok((formations, ships))
}

fn run() -> Result<(), AppError> {
    let mut runner = SceneRunner::with_new_scene(SceneConfig {
        stats_log_interval: 60,
        ..SceneConfig::default()
    })?;
    let (formations, ships) = build_fleet(runner.root())?;
    log::info!("Fleet ready: {} formations, {} ships", formations.len(), ships.len());

    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        let running = Arc::clone(&running);
        let formations = formations.clone();
        let ships = ships.clone();
        thread::spawn(move || -> Result<usize, SceneError> {
            let mut rng = rand::thread_rng();
            let mut moves = 0;
            while running.load(Ordering::Acquire) {
                let ship = &ships[rng.gen_range(0..ships.len())];
                let target = &formations[rng.gen_range(0..formations.len())];
                ship.move_to_parent(target)?;
                ship.remove_action("drift");
                ship.run_action_with_key(
                    &Action::new(ActionKind::move_by(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0), 0.5)),
                    "drift",
                );
                moves += 1;
                thread::sleep(Duration::from_millis(rng.gen_range(1..5)));
            }
            Ok(moves)
        })
    };

    let mut renderer = LoggingRenderer::default();
    let mut faults = 0;
    for _ in 0..FRAMES {
        let stats = runner.frame(&mut renderer, FRAME_DELTA);
        faults += stats.faults();
        thread::sleep(Duration::from_millis(1));
    }

    running.store(false, Ordering::Release);
    let moves = worker.join().map_err(|_| AppError::Worker)??;

    log::info!(
        "Ran {} frames, {} renderer calls, {} ship moves, {} faults",
        runner.frame_count(),
        renderer.calls,
        moves,
        faults
    );
    Ok(())
}

fn main() {
    sprite_scene::foundation::logging::init();

    log::info!("Starting scene graph demo");
    if let Err(e) = run() {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}
