//! Action variants and the per-step driver that applies them to a node
//!
//! [`ActionKind`] is the declarative description a caller builds. When an
//! action starts, the kind is turned into a [`Driver`] tree that carries the
//! mutable progress (elapsed time, captured start values, sequence cursor).

use std::fmt;
use std::sync::Arc;

use crate::foundation::math::{Point2, Vec2};
use crate::scene::Node;

use super::timing::TimingFunction;

/// Closure driven by [`ActionKind::Custom`]: receives the target node and the
/// elapsed time in seconds (clamped to the action's duration).
pub type CustomBlock = Arc<dyn Fn(&Node, f32) + Send + Sync>;

/// Declarative description of what an action does to its target
#[derive(Clone)]
pub enum ActionKind {
    /// Translate by a relative offset
    MoveBy {
        /// Offset applied over the duration
        delta: Vec2,
        /// Seconds
        duration: f32,
    },
    /// Translate to an absolute position
    MoveTo {
        /// Final position
        position: Point2,
        /// Seconds
        duration: f32,
    },
    /// Rotate around z by a relative angle (radians)
    RotateBy {
        /// Angle added over the duration
        angle: f32,
        /// Seconds
        duration: f32,
    },
    /// Rotate around z to an absolute angle (radians)
    RotateTo {
        /// Final angle
        angle: f32,
        /// Seconds
        duration: f32,
    },
    /// Multiply the current scale factors
    ScaleBy {
        /// X multiplier
        x: f32,
        /// Y multiplier
        y: f32,
        /// Seconds
        duration: f32,
    },
    /// Scale to absolute factors
    ScaleTo {
        /// Final x scale
        x: f32,
        /// Final y scale
        y: f32,
        /// Seconds
        duration: f32,
    },
    /// Animate alpha to an absolute value
    FadeAlphaTo {
        /// Final alpha
        alpha: f32,
        /// Seconds
        duration: f32,
    },
    /// Do nothing for a while
    Wait {
        /// Seconds
        duration: f32,
    },
    /// Run the members one after another
    Sequence(Vec<ActionKind>),
    /// Run the members side by side; finishes when the longest one does
    Group(Vec<ActionKind>),
    /// Call a closure every step for the given duration
    Custom {
        /// Seconds
        duration: f32,
        /// Per-step callback
        block: CustomBlock,
    },
}

impl fmt::Debug for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveBy { delta, duration } => write!(f, "MoveBy({}, {}; {}s)", delta.x, delta.y, duration),
            Self::MoveTo { position, duration } => write!(f, "MoveTo({}, {}; {}s)", position.x, position.y, duration),
            Self::RotateBy { angle, duration } => write!(f, "RotateBy({}; {}s)", angle, duration),
            Self::RotateTo { angle, duration } => write!(f, "RotateTo({}; {}s)", angle, duration),
            Self::ScaleBy { x, y, duration } => write!(f, "ScaleBy({}, {}; {}s)", x, y, duration),
            Self::ScaleTo { x, y, duration } => write!(f, "ScaleTo({}, {}; {}s)", x, y, duration),
            Self::FadeAlphaTo { alpha, duration } => write!(f, "FadeAlphaTo({}; {}s)", alpha, duration),
            Self::Wait { duration } => write!(f, "Wait({}s)", duration),
            Self::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
            Self::Group(members) => f.debug_tuple("Group").field(members).finish(),
            Self::Custom { duration, .. } => write!(f, "Custom({}s)", duration),
        }
    }
}

impl ActionKind {
    /// Relative move
    pub fn move_by(dx: f32, dy: f32, duration: f32) -> Self {
        Self::MoveBy { delta: Vec2::new(dx, dy), duration }
    }

    /// Absolute move
    pub fn move_to(x: f32, y: f32, duration: f32) -> Self {
        Self::MoveTo { position: Point2::new(x, y), duration }
    }

    /// Relative rotation in radians
    pub fn rotate_by(angle: f32, duration: f32) -> Self {
        Self::RotateBy { angle, duration }
    }

    /// Absolute rotation in radians
    pub fn rotate_to(angle: f32, duration: f32) -> Self {
        Self::RotateTo { angle, duration }
    }

    /// Uniform relative scale
    pub fn scale_by(factor: f32, duration: f32) -> Self {
        Self::ScaleBy { x: factor, y: factor, duration }
    }

    /// Uniform absolute scale
    pub fn scale_to(scale: f32, duration: f32) -> Self {
        Self::ScaleTo { x: scale, y: scale, duration }
    }

    /// Alpha animation
    pub fn fade_alpha_to(alpha: f32, duration: f32) -> Self {
        Self::FadeAlphaTo { alpha, duration }
    }

    /// Delay
    pub fn wait(duration: f32) -> Self {
        Self::Wait { duration }
    }

    /// Closure-driven action
    pub fn custom<F>(duration: f32, block: F) -> Self
    where
        F: Fn(&Node, f32) + Send + Sync + 'static,
    {
        Self::Custom { duration, block: Arc::new(block) }
    }

    /// Nominal duration in seconds
    pub fn duration(&self) -> f32 {
        match self {
            Self::MoveBy { duration, .. }
            | Self::MoveTo { duration, .. }
            | Self::RotateBy { duration, .. }
            | Self::RotateTo { duration, .. }
            | Self::ScaleBy { duration, .. }
            | Self::ScaleTo { duration, .. }
            | Self::FadeAlphaTo { duration, .. }
            | Self::Wait { duration }
            | Self::Custom { duration, .. } => *duration,
            Self::Sequence(steps) => steps.iter().map(Self::duration).sum(),
            Self::Group(members) => members.iter().map(Self::duration).fold(0.0, f32::max),
        }
    }
}

/// Property a tween interpolates, plus how its end value is derived
#[derive(Debug, Clone, Copy)]
pub(crate) enum Tween {
    MoveBy(Vec2),
    MoveTo(Point2),
    RotateBy(f32),
    RotateTo(f32),
    ScaleBy(f32, f32),
    ScaleTo(f32, f32),
    FadeTo(f32),
}

impl Tween {
    fn sample(self, node: &Node) -> [f32; 2] {
        match self {
            Self::MoveBy(_) | Self::MoveTo(_) => {
                let p = node.position();
                [p.x, p.y]
            }
            Self::RotateBy(_) | Self::RotateTo(_) => [node.z_rotation(), 0.0],
            Self::ScaleBy(..) | Self::ScaleTo(..) => [node.x_scale(), node.y_scale()],
            Self::FadeTo(_) => [node.alpha(), 0.0],
        }
    }

    fn end(self, start: [f32; 2]) -> [f32; 2] {
        match self {
            Self::MoveBy(delta) => [start[0] + delta.x, start[1] + delta.y],
            Self::MoveTo(position) => [position.x, position.y],
            Self::RotateBy(angle) => [start[0] + angle, 0.0],
            Self::RotateTo(angle) => [angle, 0.0],
            Self::ScaleBy(x, y) => [start[0] * x, start[1] * y],
            Self::ScaleTo(x, y) => [x, y],
            Self::FadeTo(alpha) => [alpha, 0.0],
        }
    }

    fn apply(self, node: &Node, value: [f32; 2]) {
        node.update_state(|state| match self {
            Self::MoveBy(_) | Self::MoveTo(_) => state.position = Point2::new(value[0], value[1]),
            Self::RotateBy(_) | Self::RotateTo(_) => state.z_rotation = value[0],
            Self::ScaleBy(..) | Self::ScaleTo(..) => {
                state.x_scale = value[0];
                state.y_scale = value[1];
            }
            Self::FadeTo(_) => state.alpha = value[0],
        });
    }
}

fn lerp(from: f32, to: f32, factor: f32) -> f32 {
    from + (to - from) * factor
}

/// Relative slack when deciding whether accumulated time reached a duration.
/// Fixed-step deltas such as `0.1` do not sum exactly in `f32`.
const DURATION_TOLERANCE: f32 = 1e-5;

/// Whether `elapsed` covers `duration`, and the seconds left over if it does
fn finish(elapsed: f32, duration: f32) -> Option<f32> {
    if duration <= 0.0 {
        Some(elapsed.max(0.0))
    } else if elapsed >= duration * (1.0 - DURATION_TOLERANCE) {
        Some((elapsed - duration).max(0.0))
    } else {
        None
    }
}

/// Mutable progress for one [`ActionKind`]
pub(crate) enum Driver {
    Tween {
        tween: Tween,
        duration: f32,
        elapsed: f32,
        // (start, end), captured on the first step so sequenced tweens
        // begin from wherever the previous step left the node
        endpoints: Option<([f32; 2], [f32; 2])>,
    },
    Wait {
        duration: f32,
        elapsed: f32,
    },
    Sequence {
        steps: Vec<Driver>,
        current: usize,
    },
    Group {
        members: Vec<Driver>,
        finished: Vec<bool>,
    },
    Custom {
        block: CustomBlock,
        duration: f32,
        elapsed: f32,
    },
}

impl Driver {
    pub(crate) fn new(kind: &ActionKind) -> Self {
        let tween = |tween: Tween, duration: f32| Self::Tween { tween, duration, elapsed: 0.0, endpoints: None };
        match kind {
            ActionKind::MoveBy { delta, duration } => tween(Tween::MoveBy(*delta), *duration),
            ActionKind::MoveTo { position, duration } => tween(Tween::MoveTo(*position), *duration),
            ActionKind::RotateBy { angle, duration } => tween(Tween::RotateBy(*angle), *duration),
            ActionKind::RotateTo { angle, duration } => tween(Tween::RotateTo(*angle), *duration),
            ActionKind::ScaleBy { x, y, duration } => tween(Tween::ScaleBy(*x, *y), *duration),
            ActionKind::ScaleTo { x, y, duration } => tween(Tween::ScaleTo(*x, *y), *duration),
            ActionKind::FadeAlphaTo { alpha, duration } => tween(Tween::FadeTo(*alpha), *duration),
            ActionKind::Wait { duration } => Self::Wait { duration: *duration, elapsed: 0.0 },
            ActionKind::Sequence(steps) => Self::Sequence {
                steps: steps.iter().map(Self::new).collect(),
                current: 0,
            },
            ActionKind::Group(members) => Self::Group {
                finished: vec![false; members.len()],
                members: members.iter().map(Self::new).collect(),
            },
            ActionKind::Custom { duration, block } => Self::Custom {
                block: Arc::clone(block),
                duration: *duration,
                elapsed: 0.0,
            },
        }
    }

    /// Advance by `dt` seconds
    ///
    /// Returns `None` while running, or `Some(leftover)` once finished, where
    /// `leftover` is the part of `dt` the action did not need. Sequences hand
    /// the leftover to their next step within the same call.
    pub(crate) fn advance(&mut self, node: &Node, dt: f32, timing: TimingFunction) -> Option<f32> {
        match self {
            Self::Tween { tween, duration, elapsed, endpoints } => {
                let (from, to) = *endpoints.get_or_insert_with(|| {
                    let start = tween.sample(node);
                    (start, tween.end(start))
                });
                *elapsed += dt;
                let finished = finish(*elapsed, *duration);
                let t = if finished.is_some() { 1.0 } else { *elapsed / *duration };
                let factor = timing.evaluate(t);
                tween.apply(node, [lerp(from[0], to[0], factor), lerp(from[1], to[1], factor)]);
                finished
            }
            Self::Wait { duration, elapsed } => {
                *elapsed += dt;
                finish(*elapsed, *duration)
            }
            Self::Sequence { steps, current } => {
                let mut remaining = dt;
                while let Some(step) = steps.get_mut(*current) {
                    remaining = step.advance(node, remaining, timing)?;
                    *current += 1;
                }
                Some(remaining)
            }
            Self::Group { members, finished } => {
                // The member finishing last decides how much time is left
                let mut leftover: Option<f32> = None;
                for (member, done) in members.iter_mut().zip(finished.iter_mut()) {
                    if !*done {
                        if let Some(rest) = member.advance(node, dt, timing) {
                            *done = true;
                            leftover = Some(leftover.map_or(rest, |current| current.min(rest)));
                        }
                    }
                }
                if finished.iter().all(|done| *done) {
                    Some(leftover.unwrap_or(dt))
                } else {
                    None
                }
            }
            Self::Custom { block, duration, elapsed } => {
                *elapsed += dt;
                let finished = finish(*elapsed, *duration);
                block(node, if finished.is_some() { *duration } else { *elapsed });
                finished
            }
        }
    }
}
