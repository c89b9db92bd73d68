use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::zones::ExclusionZones;

/// Rejection-sampling retry cap for one point.
pub const MAX_ATTEMPTS_PER_POINT: u32 = 200;

/// Scatter placement ran out of attempts before reaching the requested count.
///
/// Not fatal: `points` holds everything placed so far, anchors included.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("placed {} of {requested} points before running out of attempts", points.len())]
pub struct PlacementExhausted {
    pub requested: usize,
    pub points: Vec<Vec2>,
}

impl PlacementExhausted {
    pub fn into_points(self) -> Vec<Vec2> {
        self.points
    }
}

/// Anchored random placement for props.
///
/// Anchors are placed first, in order. The remaining count is filled with
/// uniform random points in the square `[-half_extent, half_extent]` that are
/// outside the exclusions and at least `min_spacing` away from every point
/// already placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPlacer {
    pub half_extent: f32,
    pub min_spacing: f32,
    pub max_attempts_per_point: u32,
}

impl Default for ScatterPlacer {
    fn default() -> Self {
        Self {
            half_extent: 110.0,
            min_spacing: 2.0,
            max_attempts_per_point: MAX_ATTEMPTS_PER_POINT,
        }
    }
}

impl ScatterPlacer {
    pub fn new(half_extent: f32, min_spacing: f32) -> Self {
        Self {
            half_extent,
            min_spacing,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_per_point = attempts;
        self
    }

    /// Place `count` points. Anchors beyond `count` are ignored; anchors are
    /// trusted and not checked against the exclusions.
    pub fn place<R: Rng + ?Sized>(
        &self,
        count: usize,
        anchors: &[Vec2],
        rng: &mut R,
        exclusions: &ExclusionZones,
    ) -> Result<Vec<Vec2>, PlacementExhausted> {
        let mut points: Vec<Vec2> = anchors.iter().copied().take(count).collect();
        if self.half_extent <= 0.0 && points.len() < count {
            return Err(PlacementExhausted {
                requested: count,
                points,
            });
        }

        let spacing_sq = self.min_spacing.max(0.0).powi(2);
        while points.len() < count {
            let next = (0..self.max_attempts_per_point).find_map(|_| {
                let candidate = Vec2::new(
                    rng.gen_range(-self.half_extent..=self.half_extent),
                    rng.gen_range(-self.half_extent..=self.half_extent),
                );
                let accepted = !exclusions.contains(candidate)
                    && points
                        .iter()
                        .all(|p| p.distance_squared(candidate) >= spacing_sq);
                accepted.then_some(candidate)
            });
            match next {
                Some(point) => points.push(point),
                None => {
                    tracing::warn!(
                        requested = count,
                        placed = points.len(),
                        attempts = self.max_attempts_per_point,
                        "scatter placement exhausted"
                    );
                    return Err(PlacementExhausted {
                        requested: count,
                        points,
                    });
                }
            }
        }
        Ok(points)
    }
}
