//! Elliptical lobe geometry
//!
//! A lobe is one discrete unit of deposited lava: an oriented ellipse carrying
//! a thickness and a count of downstream descendents used as its hazard
//! weight. The rasterizer consumes lobes through the [`LobeGeometry`] trait so
//! that tests can substitute degenerate or instrumented mock shapes.

use serde::{Deserialize, Serialize};

use crate::core_types::Vec2;

/// Geometry queries the rasterization engine needs from a lobe shape.
///
/// Implementations must describe a convex shape: every horizontal line
/// intersects the boundary in at most one chord.
pub trait LobeGeometry {
    /// Center of the shape in world coordinates.
    fn center(&self) -> Vec2;

    /// Deposited thickness of this lobe.
    fn thickness(&self) -> f64;

    /// Number of downstream lobes budded from this one; the hazard weight.
    fn n_descendents(&self) -> u32;

    /// Axis-aligned half-extents of the shape's oriented bounding box.
    fn extent_xy(&self) -> Vec2;

    /// True if `point` lies on or inside the shape boundary.
    fn is_point_in_lobe(&self, point: Vec2) -> bool;

    /// Both crossing points of the shape boundary with the segment
    /// `p1 -> p2`, ordered along the segment, or `None` if the segment
    /// misses the shape.
    fn line_segment_intersects(&self, p1: Vec2, p2: Vec2) -> Option<(Vec2, Vec2)>;

    /// `npoints` points sampled at uniform parameter angle along the
    /// perimeter, starting on the first semi-axis.
    fn rasterize_perimeter(&self, npoints: usize) -> Vec<Vec2>;
}

/// An elliptical lava lobe.
///
/// The ellipse is described by its center, the two semi-axes and the
/// azimuthal angle of the first semi-axis, measured counter-clockwise from
/// the +x axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lobe {
    /// Center of the ellipse in world coordinates.
    pub center: Vec2,
    /// Semi-axis lengths `(a, b)`.
    pub semi_axes: Vec2,
    /// Orientation of the `a` semi-axis, radians counter-clockwise from +x.
    pub azimuthal_angle: f64,
    /// Thickness deposited where the lobe covers the grid.
    pub thickness: f64,
    /// Number of downstream lobes; used as the hazard weight.
    pub n_descendents: u32,
}

impl Lobe {
    /// Create a lobe with zero thickness and no descendents.
    pub fn new(center: Vec2, semi_axes: Vec2, azimuthal_angle: f64) -> Self {
        Lobe {
            center,
            semi_axes,
            azimuthal_angle,
            thickness: 0.0,
            n_descendents: 0,
        }
    }

    /// Transform a world point into the lobe frame, where the ellipse is
    /// axis-aligned and centered at the origin.
    fn to_local(&self, point: Vec2) -> Vec2 {
        let diff = point - self.center;
        let (sin_a, cos_a) = self.azimuthal_angle.sin_cos();
        Vec2::new(
            cos_a * diff.x + sin_a * diff.y,
            -sin_a * diff.x + cos_a * diff.y,
        )
    }
}

impl LobeGeometry for Lobe {
    fn center(&self) -> Vec2 {
        self.center
    }

    fn thickness(&self) -> f64 {
        self.thickness
    }

    fn n_descendents(&self) -> u32 {
        self.n_descendents
    }

    fn extent_xy(&self) -> Vec2 {
        let (sin_a, cos_a) = self.azimuthal_angle.sin_cos();
        let (a, b) = (self.semi_axes.x, self.semi_axes.y);
        Vec2::new(
            (a * cos_a).hypot(b * sin_a),
            (a * sin_a).hypot(b * cos_a),
        )
    }

    fn is_point_in_lobe(&self, point: Vec2) -> bool {
        let local = self.to_local(point);
        let rx = local.x / self.semi_axes.x;
        let ry = local.y / self.semi_axes.y;
        rx * rx + ry * ry <= 1.0
    }

    fn line_segment_intersects(&self, p1: Vec2, p2: Vec2) -> Option<(Vec2, Vec2)> {
        let q1 = self.to_local(p1);
        let q2 = self.to_local(p2);
        let dir = q2 - q1;
        let (a, b) = (self.semi_axes.x, self.semi_axes.y);

        // Substituting q1 + t*dir into the ellipse equation gives a quadratic
        // in the segment parameter t.
        let qa = (dir.x / a).powi(2) + (dir.y / b).powi(2);
        let qb = 2.0 * (q1.x * dir.x / (a * a) + q1.y * dir.y / (b * b));
        let qc = (q1.x / a).powi(2) + (q1.y / b).powi(2) - 1.0;

        if qa == 0.0 {
            return None;
        }
        let discriminant = qb * qb - 4.0 * qa * qc;
        if discriminant < 0.0 {
            return None;
        }

        let sqrt_d = discriminant.sqrt();
        let t_first = (-qb - sqrt_d) / (2.0 * qa);
        let t_second = (-qb + sqrt_d) / (2.0 * qa);

        // The chord must overlap the segment itself, not just the infinite line.
        if t_second < 0.0 || t_first > 1.0 {
            return None;
        }
        let t_first = t_first.max(0.0);
        let t_second = t_second.min(1.0);

        let dir_world = p2 - p1;
        Some((p1 + t_first * dir_world, p1 + t_second * dir_world))
    }

    fn rasterize_perimeter(&self, npoints: usize) -> Vec<Vec2> {
        let (sin_a, cos_a) = self.azimuthal_angle.sin_cos();
        let (a, b) = (self.semi_axes.x, self.semi_axes.y);

        (0..npoints)
            .map(|i| {
                let phi = 2.0 * std::f64::consts::PI * i as f64 / npoints as f64;
                let local = Vec2::new(a * phi.cos(), b * phi.sin());
                self.center
                    + Vec2::new(
                        cos_a * local.x - sin_a * local.y,
                        sin_a * local.x + cos_a * local.y,
                    )
            })
            .collect()
    }
}
