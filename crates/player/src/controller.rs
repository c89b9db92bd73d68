use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use skillcity_assets::ModelAsset;
use skillcity_common::{Aabb, Camera, Transform};
use skillcity_input::InputState;

use crate::avatar::Avatar;

/// Motion state, derived from the input flags each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MotionState {
    #[default]
    Idle,
    Walking,
    Running,
}

impl MotionState {
    /// `Idle` without a direction key held, otherwise walking or running
    /// depending on the run modifier.
    pub fn from_input(input: &InputState) -> Self {
        let directional = input.forward || input.backward || input.left || input.right;
        match (directional, input.run) {
            (false, _) => Self::Idle,
            (true, false) => Self::Walking,
            (true, true) => Self::Running,
        }
    }

    /// Substring used to pick an animation clip for this state.
    pub fn clip_hint(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walking => "walk",
            Self::Running => "run",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub walk_speed: f32,
    pub run_speed: f32,
    /// Half extents of the player's collision box; the box sits on the feet.
    pub half_extents: Vec3,
    /// Distance moved per tick away from each intersecting obstacle.
    pub push_step: f32,
    /// Follow-camera offset in the player's local frame (behind is `+z`).
    pub camera_offset: Vec3,
    /// Height above the feet the follow camera looks at.
    pub look_height: f32,
    pub spawn: Vec3,
    /// Radius within which `interact` reveals an entity's info.
    pub interaction_radius: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            walk_speed: 5.0,
            run_speed: 10.0,
            half_extents: Vec3::new(0.4, 0.9, 0.4),
            push_step: 0.1,
            camera_offset: Vec3::new(0.0, 5.0, 10.0),
            look_height: 1.0,
            spawn: Vec3::ZERO,
            interaction_radius: 12.0,
        }
    }
}

impl PlayerConfig {
    pub fn speed_for(&self, state: MotionState) -> f32 {
        match state {
            MotionState::Idle => 0.0,
            MotionState::Walking => self.walk_speed,
            MotionState::Running => self.run_speed,
        }
    }
}

/// Third-person character controller.
///
/// Each tick moves the player in camera-relative space, turns it toward the
/// movement direction, then soft-pushes it out of any obstacle box it
/// overlaps. Yaw `0` faces `-z`.
#[derive(Debug, Clone)]
pub struct PlayerController {
    config: PlayerConfig,
    position: Vec3,
    yaw: f32,
    state: MotionState,
    avatar: Avatar,
}

impl PlayerController {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            position: config.spawn,
            yaw: 0.0,
            state: MotionState::Idle,
            avatar: Avatar::placeholder(config.half_extents),
            config,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Feet position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Ground-plane position `(x, z)`, as fed to the minimap.
    pub fn ground_position(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    pub fn facing(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw) * Vec3::NEG_Z
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    /// Swap in a loaded character model. Position and yaw are untouched.
    pub fn attach_model(&mut self, asset: ModelAsset) {
        self.avatar.attach_model(asset, self.state);
    }

    pub fn bounds(&self) -> Aabb {
        let half = self.config.half_extents;
        Aabb::from_center_half_extents(self.position + Vec3::Y * half.y, half)
    }

    pub fn visual_transform(&self) -> Transform {
        self.avatar.visual_transform(self.position, self.yaw)
    }

    /// Advance one frame. `camera_forward` is the camera's horizontal
    /// forward direction; movement keys are interpreted relative to it.
    pub fn tick(
        &mut self,
        dt: f32,
        input: &InputState,
        camera_forward: Vec3,
        obstacles: &[Aabb],
    ) -> MotionState {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let state = MotionState::from_input(input);
        if state != self.state {
            tracing::trace!(from = ?self.state, to = ?state, "motion state changed");
            self.state = state;
        }
        self.avatar.sync_motion(state);

        let direction = self.movement_direction(input.movement(), camera_forward);
        if direction != Vec3::ZERO {
            self.position += direction * self.config.speed_for(state) * dt;
            self.yaw = f32::atan2(-direction.x, -direction.z);
        }

        self.resolve_collisions(obstacles);
        state
    }

    /// Rotate raw key intent into world space. Zero when keys cancel out.
    fn movement_direction(&self, intent: Vec2, camera_forward: Vec3) -> Vec3 {
        if intent == Vec2::ZERO {
            return Vec3::ZERO;
        }
        let forward = Vec3::new(camera_forward.x, 0.0, camera_forward.z).normalize_or_zero();
        let forward = if forward == Vec3::ZERO { Vec3::NEG_Z } else { forward };
        let right = forward.cross(Vec3::Y);
        (forward * intent.y + right * intent.x).normalize_or_zero()
    }

    /// Push away from every obstacle the player box intersects, one fixed
    /// step each, along the horizontal obstacle-to-player direction.
    /// Returns how many obstacles were intersecting.
    pub fn resolve_collisions(&mut self, obstacles: &[Aabb]) -> usize {
        let mut hits = 0;
        for obstacle in obstacles {
            if !self.bounds().intersects(obstacle) {
                continue;
            }
            hits += 1;
            let mut away = self.bounds().center() - obstacle.center();
            away.y = 0.0;
            let away = away.normalize_or_zero();
            // Dead center: back out against the facing direction.
            let away = if away == Vec3::ZERO { -self.facing() } else { away };
            self.position += away * self.config.push_step;
        }
        if hits > 0 {
            tracing::trace!(hits, position = ?self.position, "pushed out of obstacles");
        }
        hits
    }

    /// Where the follow camera wants to be this frame.
    pub fn camera_pose(&self) -> (Vec3, Vec3) {
        let eye = self.position + Quat::from_rotation_y(self.yaw) * self.config.camera_offset;
        let target = self.position + Vec3::Y * self.config.look_height;
        (eye, target)
    }

    /// Snap the camera to the follow pose.
    pub fn follow_camera(&self, camera: &mut Camera) {
        let (eye, target) = self.camera_pose();
        camera.position = eye;
        camera.target = target;
    }
}
