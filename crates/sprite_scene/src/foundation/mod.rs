//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the scene graph:
//! - Math types and the 2D rectangle value type
//! - Poison-tolerant lock helpers shared by every node region
//! - Frame time management
//! - Logging utilities

pub mod math;
pub mod sync;
pub mod time;
pub mod logging;
