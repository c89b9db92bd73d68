//! Window-grid generation shared by every building recipe.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skillcity_common::Transform;

pub const WINDOW_WIDTH: f32 = 1.2;
pub const WINDOW_HEIGHT: f32 = 1.6;
pub const WINDOW_THICKNESS: f32 = 0.1;

/// Layout rules for the window grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGridConfig {
    /// Vertical distance between window rows.
    pub floor_height: f32,
    /// Horizontal distance between window columns.
    pub column_spacing: f32,
    /// Fraction of cells left dark (not emitted).
    pub skip_fraction: f64,
    /// Side faces get windows only when the building is at least this deep.
    pub min_side_depth: f32,
    /// Distance the windows stand off the wall.
    pub inset: f32,
}

impl Default for WindowGridConfig {
    fn default() -> Self {
        Self {
            floor_height: 3.0,
            column_spacing: 2.5,
            skip_fraction: 0.2,
            min_side_depth: 8.0,
            inset: 0.06,
        }
    }
}

/// Rows and columns for a wall of the given width and height.
pub fn grid_counts(config: &WindowGridConfig, wall_width: f32, height: f32) -> (u32, u32) {
    let rows = (height / config.floor_height).floor().max(0.0) as u32;
    let cols = (wall_width / config.column_spacing).floor().max(0.0) as u32;
    (rows, cols)
}

/// Instance transforms for every lit window of a `dimensions` box whose
/// base sits at the local origin. Deterministic for a given seed.
pub fn window_grid(config: &WindowGridConfig, dimensions: Vec3, seed: u64) -> Vec<Transform> {
    let (w, h, d) = (dimensions.x, dimensions.y, dimensions.z);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::new();

    let mut faces = vec![
        (Vec3::new(0.0, 0.0, d * 0.5 + config.inset), 0.0, w),
        (Vec3::new(0.0, 0.0, -d * 0.5 - config.inset), PI, w),
    ];
    if d >= config.min_side_depth {
        faces.push((Vec3::new(w * 0.5 + config.inset, 0.0, 0.0), FRAC_PI_2, d));
        faces.push((Vec3::new(-w * 0.5 - config.inset, 0.0, 0.0), -FRAC_PI_2, d));
    }

    for (face_center, yaw, wall_width) in faces {
        let (rows, cols) = grid_counts(config, wall_width, h);
        if rows == 0 || cols == 0 {
            continue;
        }
        let rotation = Quat::from_rotation_y(yaw);
        let row_step = h / rows as f32;
        let col_step = wall_width / cols as f32;
        for row in 0..rows {
            for col in 0..cols {
                // One draw per cell keeps the pattern stable if the skip
                // fraction changes.
                if rng.gen_bool(config.skip_fraction.clamp(0.0, 1.0)) {
                    continue;
                }
                let along = -wall_width * 0.5 + (col as f32 + 0.5) * col_step;
                let local = Vec3::new(along, (row as f32 + 0.5) * row_step, 0.0);
                out.push(
                    Transform::from_position(face_center + rotation * local).with_rotation(rotation),
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_dimensions() {
        let config = WindowGridConfig::default();
        assert_eq!(grid_counts(&config, 10.0, 30.0), (10, 4));
        assert_eq!(grid_counts(&config, 2.0, 2.0), (0, 0));
    }

    #[test]
    fn no_skips_fills_front_and_back() {
        let config = WindowGridConfig {
            skip_fraction: 0.0,
            ..WindowGridConfig::default()
        };
        let windows = window_grid(&config, Vec3::new(10.0, 12.0, 6.0), 1);
        // 4 rows x 4 cols, two faces, not deep enough for sides.
        assert_eq!(windows.len(), 32);
    }

    #[test]
    fn deep_buildings_get_side_windows() {
        let config = WindowGridConfig {
            skip_fraction: 0.0,
            ..WindowGridConfig::default()
        };
        let windows = window_grid(&config, Vec3::new(10.0, 12.0, 10.0), 1);
        assert_eq!(windows.len(), 64);
        assert!(windows.iter().any(|t| t.position.x > 5.0));
    }

    #[test]
    fn skipping_is_seeded() {
        let config = WindowGridConfig::default();
        let dims = Vec3::new(20.0, 30.0, 12.0);
        let a = window_grid(&config, dims, 77);
        let b = window_grid(&config, dims, 77);
        assert_eq!(a, b);

        let full = window_grid(
            &WindowGridConfig {
                skip_fraction: 0.0,
                ..config
            },
            dims,
            77,
        );
        assert!(a.len() < full.len());
        assert!(!a.is_empty());
    }

    #[test]
    fn windows_sit_on_the_walls() {
        let config = WindowGridConfig {
            skip_fraction: 0.0,
            ..WindowGridConfig::default()
        };
        for t in window_grid(&config, Vec3::new(10.0, 9.0, 6.0), 0) {
            assert!((t.position.z.abs() - 3.06).abs() < 1e-4);
            assert!(t.position.y > 0.0 && t.position.y < 9.0);
        }
    }
}
