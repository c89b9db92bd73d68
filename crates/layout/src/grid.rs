use glam::Vec2;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::zones::ExclusionZones;

/// Upper bound on cells per axis.
pub const MAX_CELLS_PER_AXIS: u32 = 1024;

/// Regular grid over a square area centered on the origin, with each cell
/// center jittered by a bounded random offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPlacer {
    /// Edge length of one cell.
    pub cell_size: f32,
    /// The grid covers `[-half_extent, half_extent]` on both axes.
    pub half_extent: f32,
    /// Maximum jitter as a fraction of half a cell, clamped to `0..=1`.
    pub jitter: f32,
}

impl Default for GridPlacer {
    fn default() -> Self {
        Self {
            cell_size: 15.0,
            half_extent: 120.0,
            jitter: 0.6,
        }
    }
}

impl GridPlacer {
    pub fn new(cell_size: f32, half_extent: f32, jitter: f32) -> Self {
        Self {
            cell_size,
            half_extent,
            jitter,
        }
    }

    /// Cells per axis, capped at [`MAX_CELLS_PER_AXIS`].
    pub fn cells_per_axis(&self) -> u32 {
        if !(self.cell_size > 0.0 && self.half_extent > 0.0) {
            return 0;
        }
        let cells = ((self.half_extent * 2.0) / self.cell_size).floor();
        if cells.is_finite() {
            (cells as u32).min(MAX_CELLS_PER_AXIS)
        } else {
            0
        }
    }

    /// Copy of this placer with jitter reduced so that points in
    /// neighbouring cells stay at least `spacing` apart on each axis.
    /// Squares of side `spacing` centered on the points never overlap.
    pub fn spaced(&self, spacing: f32) -> Self {
        let limit = if self.cell_size > 0.0 {
            (1.0 - spacing / self.cell_size).max(0.0)
        } else {
            0.0
        };
        Self {
            jitter: self.jitter.clamp(0.0, 1.0).min(limit),
            ..*self
        }
    }

    /// Every jittered cell center that falls outside the exclusions, in
    /// row-major order.
    pub fn candidates<R: Rng + ?Sized>(&self, rng: &mut R, exclusions: &ExclusionZones) -> Vec<Vec2> {
        let cells = self.cells_per_axis();
        let max_offset = self.cell_size * 0.5 * self.jitter.clamp(0.0, 1.0);
        let mut pool = Vec::with_capacity((cells * cells) as usize);
        for row in 0..cells {
            for col in 0..cells {
                let center = Vec2::new(
                    -self.half_extent + (col as f32 + 0.5) * self.cell_size,
                    -self.half_extent + (row as f32 + 0.5) * self.cell_size,
                );
                // Draw both offsets even for rejected cells so the sequence
                // does not depend on the exclusion list.
                let offset = if max_offset > 0.0 {
                    Vec2::new(
                        rng.gen_range(-max_offset..=max_offset),
                        rng.gen_range(-max_offset..=max_offset),
                    )
                } else {
                    Vec2::ZERO
                };
                let point = center + offset;
                if !exclusions.contains(point) {
                    pool.push(point);
                }
            }
        }
        pool
    }

    /// Draw up to `count` distinct candidates. Returns fewer when the pool
    /// is smaller than `count`.
    pub fn place<R: Rng + ?Sized>(
        &self,
        count: usize,
        rng: &mut R,
        exclusions: &ExclusionZones,
    ) -> Vec<Vec2> {
        let mut pool = self.candidates(rng, exclusions);
        if pool.len() < count {
            tracing::debug!(
                requested = count,
                available = pool.len(),
                "grid pool smaller than request"
            );
        }
        let take = count.min(pool.len());
        let (chosen, _) = pool.partial_shuffle(rng, take);
        chosen.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use skillcity_common::Rect;

    fn roads() -> ExclusionZones {
        ExclusionZones::from_rects([
            Rect::from_center_size(Vec2::ZERO, Vec2::new(240.0, 10.0)),
            Rect::from_center_size(Vec2::ZERO, Vec2::new(10.0, 240.0)),
            Rect::from_center_size(Vec2::new(40.0, 40.0), Vec2::new(30.0, 30.0)),
        ])
    }

    #[test]
    fn placements_avoid_every_exclusion() {
        let placer = GridPlacer::default();
        let zones = roads();
        let mut rng = StdRng::seed_from_u64(7);
        let points = placer.place(200, &mut rng, &zones);
        assert!(!points.is_empty());
        for p in &points {
            assert!(!zones.contains(*p), "{p} is inside an exclusion");
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let placer = GridPlacer::default();
        let zones = roads();
        let a = placer.place(40, &mut StdRng::seed_from_u64(42), &zones);
        let b = placer.place(40, &mut StdRng::seed_from_u64(42), &zones);
        let c = placer.place(40, &mut StdRng::seed_from_u64(43), &zones);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn short_pool_returns_everything_available() {
        // 4x4 grid; exclude the left half entirely.
        let placer = GridPlacer::new(10.0, 20.0, 0.0);
        let zones = ExclusionZones::from_rects([Rect::new(
            Vec2::new(-20.0, -20.0),
            Vec2::new(0.0, 20.0),
        )]);
        let mut rng = StdRng::seed_from_u64(1);
        let available = placer.candidates(&mut rng, &zones).len();
        assert_eq!(available, 8);

        let points = placer.place(50, &mut StdRng::seed_from_u64(1), &zones);
        assert_eq!(points.len(), 8);
    }

    #[test]
    fn draws_are_without_replacement() {
        let placer = GridPlacer::new(10.0, 50.0, 0.5);
        let points = placer.place(60, &mut StdRng::seed_from_u64(9), &ExclusionZones::new());
        assert_eq!(points.len(), 60);
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn jitter_stays_inside_cell() {
        let placer = GridPlacer::new(10.0, 10.0, 1.0);
        let points = placer.candidates(&mut StdRng::seed_from_u64(3), &ExclusionZones::new());
        assert_eq!(points.len(), 4);
        for p in points {
            assert!(p.x.abs() <= 10.0 && p.y.abs() <= 10.0);
        }
    }

    #[test]
    fn degenerate_grid_is_empty() {
        let placer = GridPlacer::new(0.0, 10.0, 0.5);
        assert_eq!(placer.cells_per_axis(), 0);
        assert!(placer.place(5, &mut StdRng::seed_from_u64(0), &ExclusionZones::new()).is_empty());
        assert_eq!(GridPlacer::new(f32::NAN, 10.0, 0.5).cells_per_axis(), 0);
        assert_eq!(GridPlacer::new(1.0, f32::INFINITY, 0.5).cells_per_axis(), 0);
    }

    #[test]
    fn tiny_cells_are_capped() {
        let placer = GridPlacer::new(1e-6, 120.0, 0.5);
        assert_eq!(placer.cells_per_axis(), MAX_CELLS_PER_AXIS);
    }

    #[test]
    fn spaced_points_keep_their_distance() {
        let placer = GridPlacer::new(15.0, 120.0, 0.6).spaced(11.5);
        assert!(placer.jitter < 0.6);
        let points = placer.candidates(&mut StdRng::seed_from_u64(4), &ExclusionZones::new());
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                let d = (*a - *b).abs();
                assert!(d.x >= 11.5 - 1e-3 || d.y >= 11.5 - 1e-3, "{a} and {b} too close");
            }
        }
    }

    #[test]
    fn spacing_wider_than_a_cell_disables_jitter() {
        let placer = GridPlacer::new(10.0, 20.0, 0.8).spaced(12.0);
        assert_eq!(placer.jitter, 0.0);
        // Loose spacing leaves the configured jitter alone.
        assert_eq!(GridPlacer::new(10.0, 20.0, 0.3).spaced(2.0).jitter, 0.3);
    }
}
