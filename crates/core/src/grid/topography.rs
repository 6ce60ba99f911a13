//! Elevation grid with deposited-thickness and hazard fields
//!
//! [`Topography`] owns the coordinate arrays of a uniform grid together with
//! the height field mutated by lobe deposition and the hazard field filled by
//! flow-hazard accumulation. Sample `(ix, iy)` holds the value at the cell
//! whose lower-left corner is `(x_coords[ix], y_coords[iy])`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{LobeGeometry, Vec2};
use crate::grid::raster::{IntersectionCache, ScanScratch};

/// Sub-cell column samples used when depositing a lobe.
const DEPOSITION_SAMPLES: usize = 30;

/// Errors produced by grid point queries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TopographyError {
    /// The queried point lies outside the grid's half-open domain.
    #[error("point ({x}, {y}) lies outside the grid domain")]
    OutOfDomain {
        /// World x coordinate of the offending point.
        x: f64,
        /// World y coordinate of the offending point.
        y: f64,
    },
}

/// Grid-index bounding box, each bound clamped to the valid index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Lowest included x index.
    pub x_lower: usize,
    /// Highest included x index.
    pub x_higher: usize,
    /// Lowest included y index.
    pub y_lower: usize,
    /// Highest included y index.
    pub y_higher: usize,
}

/// Which per-cell field a snapshot exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Output {
    /// The deposited-height field.
    Height,
    /// The accumulated flow-hazard field.
    Hazard,
}

/// Field snapshot handed to an external writer for persistence.
///
/// The core produces the raw grid description and values; serialization to a
/// concrete file format is a collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// World coordinates of the grid's lower-left corner.
    pub lower_left_corner: Vec2,
    /// Uniform cell spacing.
    pub cell_size: f64,
    /// Number of samples along x.
    pub nx: usize,
    /// Number of samples along y.
    pub ny: usize,
    /// Field values, x-major (`ix * ny + iy`).
    pub data: Vec<f64>,
}

/// Uniform elevation grid with height and hazard fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topography {
    /// Strictly increasing x coordinates of cell lower-left corners.
    pub(crate) x_coords: Vec<f64>,
    /// Strictly increasing y coordinates of cell lower-left corners.
    pub(crate) y_coords: Vec<f64>,
    /// Height field, x-major (`ix * ny + iy`).
    pub(crate) height: Vec<f64>,
    /// Flow-hazard field, same shape as the height field.
    pub(crate) hazard: Vec<f64>,
    /// Per-flow cache of lobe cell classifications.
    #[serde(skip)]
    pub(crate) cache: IntersectionCache,
    /// Scanline scratch buffers reused across classifications.
    #[serde(skip)]
    pub(crate) scratch: ScanScratch,
}

impl Topography {
    /// Create a topography from a height field and its coordinate arrays.
    ///
    /// `height` is x-major with shape `(x_coords.len(), y_coords.len())`.
    /// Uniform spacing, identical along both axes, is a precondition.
    pub fn new(height: Vec<f64>, x_coords: Vec<f64>, y_coords: Vec<f64>) -> Self {
        assert!(
            x_coords.len() >= 2 && y_coords.len() >= 2,
            "Topography needs at least two coordinates per axis"
        );
        assert_eq!(
            height.len(),
            x_coords.len() * y_coords.len(),
            "Height field shape mismatch"
        );
        debug_assert!(
            (x_coords[1] - x_coords[0] - (y_coords[1] - y_coords[0])).abs() < 1e-9,
            "x and y spacing must match"
        );

        let hazard = vec![0.0; height.len()];
        Topography {
            x_coords,
            y_coords,
            height,
            hazard,
            cache: IntersectionCache::default(),
            scratch: ScanScratch::default(),
        }
    }

    /// Number of samples along x.
    #[inline]
    pub fn nx(&self) -> usize {
        self.x_coords.len()
    }

    /// Number of samples along y.
    #[inline]
    pub fn ny(&self) -> usize {
        self.y_coords.len()
    }

    /// Uniform cell spacing, derived from the coordinate arrays.
    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.x_coords[1] - self.x_coords[0]
    }

    #[inline]
    pub(crate) fn cell_index(&self, ix: usize, iy: usize) -> usize {
        ix * self.ny() + iy
    }

    /// Height sample at grid position.
    #[inline]
    pub fn height_at(&self, ix: usize, iy: usize) -> f64 {
        self.height[self.cell_index(ix, iy)]
    }

    /// Hazard sample at grid position.
    #[inline]
    pub fn hazard_at(&self, ix: usize, iy: usize) -> f64 {
        self.hazard[self.cell_index(ix, iy)]
    }

    /// Locate the grid cell containing `point`.
    ///
    /// The domain is half-open on both axes: a point on a cell's lower or
    /// left edge belongs to that cell, a point on the upper or right edge to
    /// the neighboring one.
    ///
    /// # Errors
    /// [`TopographyError::OutOfDomain`] when `point` lies outside
    /// `[x[0], x[last] + h) x [y[0], y[last] + h)`.
    pub fn locate_point(&self, point: Vec2) -> Result<(usize, usize), TopographyError> {
        let h = self.cell_size();
        let outside_x =
            point.x < self.x_coords[0] || point.x >= self.x_coords[self.nx() - 1] + h;
        let outside_y =
            point.y < self.y_coords[0] || point.y >= self.y_coords[self.ny() - 1] + h;

        if outside_x || outside_y {
            return Err(TopographyError::OutOfDomain {
                x: point.x,
                y: point.y,
            });
        }

        let idx_x = ((point.x - self.x_coords[0]) / h) as usize;
        let idx_y = ((point.y - self.y_coords[0]) / h) as usize;
        Ok((idx_x, idx_y))
    }

    /// True if `point` lies within `ceil(radius / h)` cells of any grid edge.
    ///
    /// Drivers use this to decide whether a lobe would have to be clipped
    /// against the domain boundary.
    pub fn is_point_near_boundary(&self, point: Vec2, radius: f64) -> bool {
        let h = self.cell_size();
        let n = (radius / h).ceil();

        let near_x = point.x < self.x_coords[0] + n * h
            || point.x >= self.x_coords[self.nx() - 1] - n * h;
        let near_y = point.y < self.y_coords[0] + n * h
            || point.y >= self.y_coords[self.ny() - 1] - n * h;
        near_x || near_y
    }

    /// Bounding box of the cell containing `center` expanded by
    /// `ceil(extent / h)` cells per direction.
    ///
    /// Never fails: the center cell is found by raw floor division and every
    /// bound is clamped independently to the valid index range, so
    /// out-of-range requests are silently truncated.
    pub fn bounding_box(&self, center: Vec2, extent_x: f64, extent_y: f64) -> BoundingBox {
        let h = self.cell_size();
        let idx_x = ((center.x - self.x_coords[0]) / h).floor() as i64;
        let idx_y = ((center.y - self.y_coords[0]) / h).floor() as i64;
        let cells_x = (extent_x / h).ceil() as i64;
        let cells_y = (extent_y / h).ceil() as i64;

        let clamp = |idx: i64, len: usize| idx.clamp(0, len as i64 - 1) as usize;
        BoundingBox {
            x_lower: clamp(idx_x - cells_x, self.nx()),
            x_higher: clamp(idx_x + cells_x, self.nx()),
            y_lower: clamp(idx_y - cells_y, self.ny()),
            y_higher: clamp(idx_y + cells_y, self.ny()),
        }
    }

    /// Interpolated height and downhill slope at `point`.
    ///
    /// Selects one of the two triangles spanning the 2x2 sample neighborhood
    /// around `point` (lower-left or upper-right, by squared distance to the
    /// lower-left sample against `h^2 / 2`) and fits a plane through its three
    /// height samples. The returned vector is the negated gradient, pointing
    /// downhill. Continuous across the triangle split, but the slope may jump
    /// exactly on the diagonal.
    ///
    /// # Errors
    /// [`TopographyError::OutOfDomain`] when `point` lies outside the grid.
    pub fn height_and_slope(&self, point: Vec2) -> Result<(f64, Vec2), TopographyError> {
        let (idx_x, idx_y) = self.locate_point(point)?;
        let h = self.cell_size();
        let cell_center = Vec2::new(
            self.x_coords[idx_x] + 0.5 * h,
            self.y_coords[idx_y] + 0.5 * h,
        );

        // The 2x2 neighborhood straddling the point, clamped at grid edges.
        let (idx_x_lower, idx_x_higher) = if point.x > cell_center.x {
            (idx_x, (idx_x + 1).min(self.nx() - 1))
        } else {
            (idx_x.saturating_sub(1), idx_x)
        };
        let (idx_y_lower, idx_y_higher) = if point.y > cell_center.y {
            (idx_y, (idx_y + 1).min(self.ny() - 1))
        } else {
            (idx_y.saturating_sub(1), idx_y)
        };

        let center_lower_left = Vec2::new(
            self.x_coords[idx_x_lower] + 0.5 * h,
            self.y_coords[idx_y_lower] + 0.5 * h,
        );

        // Which triangle are we in?
        let diff = point - center_lower_left;
        let dist2 = diff.x * diff.x + diff.y * diff.y;

        let (corner_height, alpha, beta, corner) = if dist2 < 0.5 * h * h {
            // Lower-left triangle
            let z = self.height_at(idx_x_lower, idx_y_lower);
            let alpha = (self.height_at(idx_x_higher, idx_y_lower) - z) / h;
            let beta = (self.height_at(idx_x_lower, idx_y_higher) - z) / h;
            (z, alpha, beta, center_lower_left)
        } else {
            // Upper-right triangle
            let z = self.height_at(idx_x_higher, idx_y_higher);
            let alpha = (z - self.height_at(idx_x_lower, idx_y_higher)) / h;
            let beta = (z - self.height_at(idx_x_higher, idx_y_lower)) / h;
            let corner = Vec2::new(
                self.x_coords[idx_x_higher] + 0.5 * h,
                self.y_coords[idx_y_higher] + 0.5 * h,
            );
            (z, alpha, beta, corner)
        };

        let height =
            corner_height + alpha * (point.x - corner.x) + beta * (point.y - corner.y);
        let slope = Vec2::new(alpha, beta);

        Ok((height, -slope))
    }

    /// Overwrite the height sample of the cell containing `point`.
    ///
    /// # Errors
    /// [`TopographyError::OutOfDomain`] when `point` lies outside the grid.
    pub fn set_height(&mut self, point: Vec2, value: f64) -> Result<(), TopographyError> {
        let (idx_x, idx_y) = self.locate_point(point)?;
        let idx = self.cell_index(idx_x, idx_y);
        self.height[idx] = value;
        Ok(())
    }

    /// Deposit a lobe: add `fraction * thickness` to every covered cell.
    ///
    /// Permanently mutates the height field; calling twice for the same lobe
    /// deposits it twice.
    pub fn add_lobe<L: LobeGeometry>(&mut self, lobe: &L, cache_index: Option<usize>) {
        let coverage = self.compute_coverage(lobe, cache_index, DEPOSITION_SAMPLES);

        for ((idx_x, idx_y), fraction) in coverage {
            let idx = self.cell_index(idx_x, idx_y);
            self.height[idx] += fraction * lobe.thickness();
        }
    }

    /// Lowest-elevation point among `npoints` perimeter samples of `lobe`.
    ///
    /// The returned point seeds the growth direction of a child lobe
    /// (steepest-descent heuristic).
    ///
    /// # Errors
    /// [`TopographyError::OutOfDomain`] when a perimeter sample falls outside
    /// the grid.
    pub fn find_preliminary_budding_point<L: LobeGeometry>(
        &self,
        lobe: &L,
        npoints: usize,
    ) -> Result<Vec2, TopographyError> {
        assert!(npoints > 0, "perimeter sampling needs at least one point");

        let mut lowest = (f64::INFINITY, Vec2::zeros());
        for point in lobe.rasterize_perimeter(npoints) {
            let (height, _) = self.height_and_slope(point)?;
            if height < lowest.0 {
                lowest = (height, point);
            }
        }
        Ok(lowest.1)
    }

    /// Resize and clear the per-flow intersection cache to `n` lobe slots.
    pub fn reset_intersection_cache(&mut self, n: usize) {
        tracing::debug!(slots = n, "resetting intersection cache");
        self.cache.reset(n);
    }

    /// Export the requested field for persistence by an external writer.
    pub fn to_snapshot(&self, output: Output) -> FieldSnapshot {
        let data = match output {
            Output::Height => self.height.clone(),
            Output::Hazard => self.hazard.clone(),
        };

        FieldSnapshot {
            lower_left_corner: Vec2::new(self.x_coords[0], self.y_coords[0]),
            cell_size: self.cell_size(),
            nx: self.nx(),
            ny: self.ny(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_coords(start: f64, n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    fn flat_topography(start: f64, n: usize, level: f64) -> Topography {
        let coords = uniform_coords(start, n, 1.0);
        Topography::new(vec![level; n * n], coords.clone(), coords)
    }

    #[test]
    fn locate_point_and_cell_size() {
        let x_coords = uniform_coords(0.5, 19, 1.0);
        let y_coords = uniform_coords(4.5, 6, 1.0);
        let topo = Topography::new(vec![0.0; 19 * 6], x_coords, y_coords);

        assert_relative_eq!(topo.cell_size(), 1.0);
        assert_eq!(topo.locate_point(Vec2::new(11.4, 7.6)), Ok((10, 3)));
    }

    #[test]
    fn locate_point_is_left_closed_right_open() {
        let topo = flat_topography(0.0, 3, 0.0);

        // A point on a lower/left edge belongs to that cell.
        assert_eq!(topo.locate_point(Vec2::new(0.0, 0.0)), Ok((0, 0)));
        assert_eq!(topo.locate_point(Vec2::new(1.0, 0.5)), Ok((1, 0)));
        // A point on an upper/right edge belongs to the next cell.
        assert_eq!(topo.locate_point(Vec2::new(2.0, 2.0)), Ok((2, 2)));
        // The domain itself is half-open.
        assert_eq!(
            topo.locate_point(Vec2::new(3.0 - 1e-12, 0.0)),
            Ok((2, 0))
        );
        assert!(topo.locate_point(Vec2::new(3.0, 0.0)).is_err());
        assert!(topo.locate_point(Vec2::new(-0.1, 0.0)).is_err());
        assert!(topo.locate_point(Vec2::new(0.0, 5.0)).is_err());
    }

    #[test]
    fn bounding_box_without_clamping() {
        let x_coords = uniform_coords(0.5, 19, 1.0);
        let y_coords = uniform_coords(4.5, 6, 1.0);
        let topo = Topography::new(vec![0.0; 19 * 6], x_coords, y_coords);

        let bbox = topo.bounding_box(Vec2::new(11.4, 7.6), 2.0, 2.0);
        assert_eq!(bbox.x_lower, 8);
        assert_eq!(bbox.x_higher, 12);
        assert_eq!(bbox.y_lower, 1);
        assert_eq!(bbox.y_higher, 5);
    }

    #[test]
    fn bounding_box_clamps_at_edges() {
        let topo = flat_topography(0.0, 4, 0.0);

        // Center in the corner cell, extent far past the grid.
        let bbox = topo.bounding_box(Vec2::new(0.2, 3.8), 10.0, 10.0);
        assert_eq!(bbox.x_lower, 0);
        assert_eq!(bbox.x_higher, 3);
        assert_eq!(bbox.y_lower, 0);
        assert_eq!(bbox.y_higher, 3);

        // Center outside the domain still yields ordered, in-range bounds.
        let bbox = topo.bounding_box(Vec2::new(-5.0, 1.5), 1.0, 1.0);
        assert!(bbox.x_lower <= bbox.x_higher);
        assert!(bbox.x_higher <= 3);
    }

    #[test]
    fn near_boundary_detection() {
        let topo = flat_topography(0.0, 10, 0.0);

        assert!(topo.is_point_near_boundary(Vec2::new(0.5, 5.0), 1.0));
        assert!(topo.is_point_near_boundary(Vec2::new(9.5, 5.0), 1.0));
        assert!(!topo.is_point_near_boundary(Vec2::new(5.0, 5.0), 1.0));
        // A larger radius widens the boundary band.
        assert!(topo.is_point_near_boundary(Vec2::new(5.0, 5.0), 4.5));
    }

    #[test]
    fn flat_field_interpolates_to_itself() {
        let topo = flat_topography(-2.0, 4, 5.0);

        let (height, slope) = topo.height_and_slope(Vec2::new(0.3, -0.7)).unwrap();
        assert_relative_eq!(height, 5.0);
        assert_relative_eq!(slope.x, 0.0);
        assert_relative_eq!(slope.y, 0.0);
    }

    #[test]
    fn inclined_plane_interpolation_and_downhill_slope() {
        // Height equal to the sample's x coordinate: a plane of slope 1 in x.
        let coords = uniform_coords(0.0, 8, 1.0);
        let mut height = vec![0.0; 8 * 8];
        for ix in 0..8 {
            for iy in 0..8 {
                height[ix * 8 + iy] = coords[ix];
            }
        }
        let topo = Topography::new(height, coords.clone(), coords);

        let point = Vec2::new(3.7, 4.2);
        let (h, slope) = topo.height_and_slope(point).unwrap();
        // Samples sit at cell centers, so the plane is x - h/2.
        assert_relative_eq!(h, point.x - 0.5, epsilon = 1e-12);
        assert_relative_eq!(slope.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(slope.y, 0.0);
    }

    #[test]
    fn interpolation_is_continuous_across_the_triangle_split() {
        let coords = uniform_coords(0.0, 4, 1.0);
        let mut topo = Topography::new(vec![0.0; 16], coords.clone(), coords);
        // A corner set with nonzero twist so the two planes differ.
        topo.height = (0..16).map(|i| (i * i % 7) as f64).collect();

        // The split boundary passes through the midpoint between the two
        // off-diagonal sample centers; approach it from both sides.
        let mid = Vec2::new(2.0, 2.0);
        let eps = 1e-9;
        let below = topo
            .height_and_slope(mid - Vec2::new(eps, eps))
            .unwrap()
            .0;
        let above = topo
            .height_and_slope(mid + Vec2::new(eps, eps))
            .unwrap()
            .0;
        assert_relative_eq!(below, above, epsilon = 1e-6);
    }

    #[test]
    fn set_height_and_snapshot() {
        let mut topo = flat_topography(0.0, 3, 1.0);
        topo.set_height(Vec2::new(1.5, 0.5), 7.0).unwrap();

        let snapshot = topo.to_snapshot(Output::Height);
        assert_relative_eq!(snapshot.lower_left_corner.x, 0.0);
        assert_relative_eq!(snapshot.cell_size, 1.0);
        assert_eq!(snapshot.nx, 3);
        assert_eq!(snapshot.ny, 3);
        assert_relative_eq!(snapshot.data[topo.cell_index(1, 0)], 7.0);

        let hazard = topo.to_snapshot(Output::Hazard);
        assert!(hazard.data.iter().all(|&v| v == 0.0));
    }
}
