//! Frame driver
//!
//! [`SceneRunner`] owns a scene root and advances it one frame at a time:
//! one tick traversal followed by one render traversal. It is meant to be
//! driven from a single frame thread while other threads edit the tree.

use std::path::Path;

use crate::{
    config::{Config, ConfigError, SceneConfig},
    foundation::time::{Stopwatch, Timer},
    scene::{DrawStats, Node, NodeRef, Renderer, TickStats},
};
use thiserror::Error;

/// Result of one [`SceneRunner::frame`]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Delta actually fed to the tick traversal
    pub delta_time: f32,
    /// Tick traversal counters
    pub tick: TickStats,
    /// Render traversal counters
    pub draw: DrawStats,
}

impl FrameStats {
    /// Faults caught by either traversal
    pub fn faults(&self) -> usize {
        self.tick.faults + self.draw.faults
    }
}

/// Owns a scene root and runs frames against it
pub struct SceneRunner {
    root: NodeRef,
    timer: Timer,
    config: SceneConfig,
    frames: u64,
}

impl SceneRunner {
    /// Create a runner around an existing root
    pub fn new(root: NodeRef, config: SceneConfig) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!(
            "Scene runner ready (max delta {}s, time scale {})",
            config.max_frame_delta,
            config.time_scale
        );
        Ok(Self {
            root,
            timer: Timer::new(),
            config,
            frames: 0,
        })
    }

    /// Create a runner around a fresh scene root
    pub fn with_new_scene(config: SceneConfig) -> Result<Self, EngineError> {
        Self::new(Node::new_scene(), config)
    }

    /// Create a runner with configuration read from a `.toml` or `.ron` file
    pub fn from_config_file(root: NodeRef, path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let config = SceneConfig::load_from_file(path)?;
        Self::new(root, config)
    }

    /// Scene root
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Active configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Number of frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Run one frame with an explicit delta in seconds
    pub fn frame(&mut self, renderer: &mut dyn Renderer, delta_time: f32) -> FrameStats {
        let delta_time = self.config.effective_delta(delta_time);
        let mut stopwatch = Stopwatch::start_new();

        let tick = self.root.tick(delta_time);
        let tick_millis = stopwatch.lap_millis();
        renderer.save_state();
        let draw = self.root.draw(renderer);
        renderer.restore_state();
        let draw_millis = stopwatch.elapsed_millis();

        self.frames += 1;
        let stats = FrameStats {
            frame: self.frames,
            delta_time,
            tick,
            draw,
        };

        if stats.faults() > 0 {
            log::warn!("Frame {} caught {} fault(s)", stats.frame, stats.faults());
        }
        let interval = self.config.stats_log_interval;
        if interval > 0 && self.frames % interval == 0 {
            log::debug!(
                "Frame {}: {} nodes ticked, {} actions completed ({:.2}ms), {} nodes drawn ({:.2}ms)",
                stats.frame,
                tick.nodes_visited,
                tick.actions_completed,
                tick_millis,
                draw.nodes_drawn,
                draw_millis
            );
        }
        stats
    }

    /// Run one frame using the wall-clock time since the previous call
    ///
    /// The first call measures from the call itself, not from construction.
    pub fn run_frame(&mut self, renderer: &mut dyn Renderer) -> FrameStats {
        if self.timer.frame_count() == 0 {
            self.timer.reset();
        }
        let delta_time = self.timer.update();
        self.frame(renderer, delta_time)
    }
}

/// Errors raised while setting up a [`SceneRunner`]
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
