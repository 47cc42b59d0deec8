//! # Sprite Scene
//!
//! A retained-mode 2D scene graph whose tree can be edited from any thread
//! while a single frame thread advances actions and draws it.
//!
//! ## Features
//!
//! - **Node tree**: parent/child hierarchy with scene roots, shallow copy and
//!   structural checks on every attach
//! - **Render traversal**: depth-first drawing through a save/restore
//!   transform stack ([`scene::Renderer`])
//! - **Action scheduler**: per-node FIFO of timed actions with keys,
//!   completion callbacks and cancellation
//! - **Frame driver**: [`SceneRunner`] ticks then draws, with clamped deltas
//!   from a [`SceneConfig`] file
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sprite_scene::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runner = SceneRunner::with_new_scene(SceneConfig::default())?;
//!
//!     let ship = Node::named("ship");
//!     runner.root().add_child(&ship)?;
//!     ship.run_action(&Action::new(ActionKind::move_by(100.0, 0.0, 2.0)));
//!
//!     let mut renderer = TransformStack::new();
//!     for _ in 0..120 {
//!         runner.frame(&mut renderer, 1.0 / 60.0);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate, clippy::new_ret_no_self)]

pub mod actions;
pub mod config;
pub mod foundation;
pub mod scene;

mod engine;

pub use config::{Config, ConfigError, SceneConfig};
pub use engine::{EngineError, FrameStats, SceneRunner};

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        actions::{Action, ActionKind, ActionPhase, ActionRef, KeySource, TimingFunction},
        foundation::{
            math::{Point2, Rect, Vec2, Vec3},
            time::{Stopwatch, Timer},
        },
        scene::{Handle, Node, NodeContent, NodeRef, Renderer, SceneError, TransformStack},
        Config, EngineError, FrameStats, SceneConfig, SceneRunner,
    };
}
