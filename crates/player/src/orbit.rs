use glam::Vec3;
use serde::{Deserialize, Serialize};
use skillcity_common::Camera;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub target: Vec3,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Initial yaw in radians; `0` puts the camera on the `+z` side.
    pub yaw: f32,
    /// Elevation above the ground plane in radians.
    pub pitch: f32,
    /// Highest elevation, just short of straight down.
    pub max_pitch: f32,
    /// Lowest elevation, which keeps the camera above the ground.
    pub min_pitch: f32,
    pub sensitivity: f32,
    pub zoom_speed: f32,
    /// Fraction of angular velocity kept per 1/60 s.
    pub damping: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 130.0,
            min_distance: 20.0,
            max_distance: 260.0,
            yaw: 0.0,
            pitch: 35.0_f32.to_radians(),
            max_pitch: 85.0_f32.to_radians(),
            min_pitch: 5.0_f32.to_radians(),
            sensitivity: 0.005,
            zoom_speed: 0.1,
            damping: 0.9,
        }
    }
}

/// Damped orbit around a fixed target, used when the character camera is
/// off. Drags add angular velocity that decays over the following frames.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    config: OrbitConfig,
    yaw: f32,
    pitch: f32,
    distance: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(OrbitConfig::default())
    }
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            yaw: config.yaw,
            pitch: config.pitch.clamp(config.min_pitch, config.max_pitch),
            distance: config.distance.clamp(config.min_distance, config.max_distance),
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &OrbitConfig {
        &self.config
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Pointer drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_velocity -= dx * self.config.sensitivity;
        self.pitch_velocity += dy * self.config.sensitivity;
    }

    /// Positive steps zoom in.
    pub fn zoom(&mut self, steps: f32) {
        let factor = (1.0 - self.config.zoom_speed).powf(steps);
        self.distance =
            (self.distance * factor).clamp(self.config.min_distance, self.config.max_distance);
    }

    pub fn is_settled(&self) -> bool {
        self.yaw_velocity.abs() < 1e-5 && self.pitch_velocity.abs() < 1e-5
    }

    /// Apply and decay the angular velocity.
    pub fn update(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        self.yaw += self.yaw_velocity;
        self.pitch = (self.pitch + self.pitch_velocity)
            .clamp(self.config.min_pitch, self.config.max_pitch);
        let keep = self.config.damping.clamp(0.0, 1.0).powf(dt * 60.0);
        self.yaw_velocity *= keep;
        self.pitch_velocity *= keep;
        if self.is_settled() {
            self.yaw_velocity = 0.0;
            self.pitch_velocity = 0.0;
        }
    }

    pub fn eye(&self) -> Vec3 {
        let horizontal = self.distance * self.pitch.cos();
        self.config.target
            + Vec3::new(
                horizontal * self.yaw.sin(),
                self.distance * self.pitch.sin(),
                horizontal * self.yaw.cos(),
            )
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.position = self.eye();
        camera.target = self.config.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_view_looks_at_the_plaza_from_above() {
        let orbit = OrbitControls::default();
        let mut camera = Camera::default();
        orbit.apply(&mut camera);
        assert!(camera.position.y > 0.0);
        assert!(camera.position.z > 0.0);
        assert!((camera.position.distance(Vec3::ZERO) - 130.0).abs() < 1e-3);
        assert!(camera.view_projection().is_finite());
    }

    #[test]
    fn drag_velocity_decays() {
        let mut orbit = OrbitControls::default();
        orbit.rotate(100.0, 0.0);
        let start = orbit.yaw();
        orbit.update(1.0 / 60.0);
        let first_step = (orbit.yaw() - start).abs();
        let mid = orbit.yaw();
        orbit.update(1.0 / 60.0);
        let second_step = (orbit.yaw() - mid).abs();
        assert!(second_step < first_step);

        for _ in 0..600 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.is_settled());
    }

    #[test]
    fn pitch_stays_above_ground() {
        let mut orbit = OrbitControls::default();
        orbit.rotate(0.0, -100_000.0);
        for _ in 0..10 {
            orbit.update(1.0 / 60.0);
        }
        assert!(orbit.pitch() >= orbit.config().min_pitch);
        assert!(orbit.eye().y > 0.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut orbit = OrbitControls::default();
        orbit.zoom(1000.0);
        assert_eq!(orbit.distance(), orbit.config().min_distance);
        orbit.zoom(-1000.0);
        assert_eq!(orbit.distance(), orbit.config().max_distance);
    }
}
