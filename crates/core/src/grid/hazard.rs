//! Flow-hazard accumulation
//!
//! The hazard of a cell within one flow is the maximum descendent count over
//! all lobes that touched it: a worst-case proxy for how consequential the
//! location is to eventual flow paths. The fold is a pure maximum, so lobe
//! processing order never affects the result.

use rayon::prelude::*;

use crate::core_types::LobeGeometry;
use crate::grid::raster::ScanScratch;
use crate::grid::topography::Topography;

impl Topography {
    /// Recompute the hazard field for one flow.
    ///
    /// Zeroes the field, then folds `max(hazard, n_descendents)` over every
    /// cell touched by each lobe. Each lobe's position in the sequence is
    /// used as its cache index, so a prior deposition pass over the same
    /// sequence is reused (and vice versa).
    pub fn accumulate_hazard<L: LobeGeometry>(&mut self, lobes: &[L]) {
        tracing::debug!(n_lobes = lobes.len(), "accumulating flow hazard");
        self.hazard.fill(0.0);

        for (index, lobe) in lobes.iter().enumerate() {
            let cells = self.cells_intersecting_lobe(lobe, Some(index));
            let weight = f64::from(lobe.n_descendents());

            for &(idx_x, idx_y) in cells.enclosed.iter().chain(&cells.intersecting) {
                let idx = self.cell_index(idx_x, idx_y);
                self.hazard[idx] = self.hazard[idx].max(weight);
            }
        }
    }

    /// Parallel variant of [`accumulate_hazard`]: lobes are sharded across
    /// workers and the per-worker fields merged with a cell-wise maximum.
    ///
    /// Classifies with per-worker scratch buffers and bypasses the
    /// intersection cache; the resulting field is identical to the
    /// sequential fold because the max-merge is commutative and associative.
    ///
    /// [`accumulate_hazard`]: Topography::accumulate_hazard
    pub fn accumulate_hazard_parallel<L: LobeGeometry + Sync>(&mut self, lobes: &[L]) {
        tracing::debug!(n_lobes = lobes.len(), "accumulating flow hazard in parallel");
        let n_cells = self.hazard.len();

        let merged = {
            let topo = &*self;
            lobes
                .par_iter()
                .fold(
                    || vec![0.0f64; n_cells],
                    |mut field, lobe| {
                        let mut scratch = ScanScratch::default();
                        let cells = topo.scanline_classify(lobe, &mut scratch);
                        let weight = f64::from(lobe.n_descendents());

                        for &(idx_x, idx_y) in cells.enclosed.iter().chain(&cells.intersecting)
                        {
                            let idx = topo.cell_index(idx_x, idx_y);
                            field[idx] = field[idx].max(weight);
                        }
                        field
                    },
                )
                .reduce(
                    || vec![0.0f64; n_cells],
                    |mut left, right| {
                        for (cell, value) in left.iter_mut().zip(right) {
                            *cell = cell.max(value);
                        }
                        left
                    },
                )
        };

        self.hazard = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{Lobe, Vec2};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn overlapping_lobes() -> Vec<Lobe> {
        let mut lobes = vec![
            Lobe::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 1.0), 0.0),
            Lobe::new(Vec2::new(1.0, 0.5), Vec2::new(1.5, 1.5), 0.0),
            Lobe::new(Vec2::new(-1.0, -0.5), Vec2::new(1.0, 0.8), 0.9),
            Lobe::new(Vec2::new(0.5, 1.5), Vec2::new(0.9, 0.6), 2.2),
        ];
        lobes[0].n_descendents = 7;
        lobes[1].n_descendents = 3;
        lobes[2].n_descendents = 11;
        lobes[3].n_descendents = 1;
        lobes
    }

    fn test_topography() -> Topography {
        let coords: Vec<f64> = (0..12).map(|i| -6.0 + f64::from(i)).collect();
        Topography::new(vec![0.0; 12 * 12], coords.clone(), coords)
    }

    #[test]
    fn hazard_is_max_not_sum() {
        let mut topo = test_topography();
        let lobes = overlapping_lobes();
        topo.reset_intersection_cache(lobes.len());

        topo.accumulate_hazard(&lobes);

        let max_hazard = topo
            .hazard
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        assert_eq!(max_hazard, 11.0);

        // Every touched cell carries the weight of some touching lobe.
        for &value in &topo.hazard {
            assert!([0.0, 1.0, 3.0, 7.0, 11.0].contains(&value));
        }
    }

    #[test]
    fn hazard_is_order_invariant() {
        let mut topo = test_topography();
        let mut lobes = overlapping_lobes();

        topo.reset_intersection_cache(lobes.len());
        topo.accumulate_hazard(&lobes);
        let reference = topo.hazard.clone();

        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..5 {
            lobes.shuffle(&mut rng);
            // Cache indices follow sequence position, so a reshuffled
            // sequence needs a fresh cache.
            topo.reset_intersection_cache(lobes.len());
            topo.accumulate_hazard(&lobes);
            assert_eq!(topo.hazard, reference);
        }
    }

    #[test]
    fn parallel_accumulation_matches_sequential() {
        let mut topo = test_topography();
        let lobes = overlapping_lobes();

        topo.reset_intersection_cache(lobes.len());
        topo.accumulate_hazard(&lobes);
        let sequential = topo.hazard.clone();

        topo.accumulate_hazard_parallel(&lobes);
        assert_eq!(topo.hazard, sequential);
    }

    #[test]
    fn accumulation_resets_previous_pass() {
        let mut topo = test_topography();
        let lobes = overlapping_lobes();

        topo.reset_intersection_cache(lobes.len());
        topo.accumulate_hazard(&lobes);

        // A second pass over a single far-away lobe must not keep stale
        // hazard from the first pass.
        let mut lonely = Lobe::new(Vec2::new(4.0, 4.0), Vec2::new(0.8, 0.8), 0.0);
        lonely.n_descendents = 2;
        topo.reset_intersection_cache(1);
        topo.accumulate_hazard(&[lonely]);

        let max_hazard = topo
            .hazard
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        assert_eq!(max_hazard, 2.0);
    }
}
