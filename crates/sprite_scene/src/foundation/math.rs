//! Math utilities and types
//!
//! Provides the math types used by node geometry and the transform stack.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Matrix4, Rotation3, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Axis-aligned 2D rectangle (origin + size)
///
/// Value type: nodes copy rectangles in and out, they are never shared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Bottom-left corner
    pub origin: Point2,
    /// Width and height
    pub size: Vec2,
}

impl Default for Rect {
    fn default() -> Self {
        Self::zero()
    }
}

impl Rect {
    /// Create a rectangle from its origin and dimensions
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point2::new(x, y),
            size: Vec2::new(width, height),
        }
    }

    /// Empty rectangle at the origin
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Smallest x coordinate
    pub fn min_x(&self) -> f32 {
        self.origin.x
    }

    /// Smallest y coordinate
    pub fn min_y(&self) -> f32 {
        self.origin.y
    }

    /// Largest x coordinate
    pub fn max_x(&self) -> f32 {
        self.origin.x + self.size.x
    }

    /// Largest y coordinate
    pub fn max_y(&self) -> f32 {
        self.origin.y + self.size.y
    }

    /// Check if this rectangle contains a point (edges inclusive)
    pub fn contains_point(&self, point: Point2) -> bool {
        point.x >= self.min_x() && point.x <= self.max_x() &&
        point.y >= self.min_y() && point.y <= self.max_y()
    }
}
