//! Vector type alias for 2D world coordinates.

use nalgebra::Vector2;

/// 2D vector type for world positions, extents, and slope components.
///
/// This is a simple alias for `nalgebra::Vector2<f64>`, used throughout the
/// crate for lobe centers, grid coordinates, and gradient vectors.
pub type Vec2 = Vector2<f64>;
