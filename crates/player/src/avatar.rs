use glam::{Quat, Vec3};
use skillcity_assets::ModelAsset;
use skillcity_common::Transform;

use crate::controller::MotionState;

/// Capsule stand-in shown until the character model arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    pub radius: f32,
    /// Length of the cylindrical section between the two hemispheres.
    pub length: f32,
}

impl Capsule {
    /// The capsule that fills a player box of the given half extents.
    pub fn fitting(half_extents: Vec3) -> Self {
        let radius = half_extents.x.min(half_extents.z).max(0.01);
        let length = (half_extents.y * 2.0 - radius * 2.0).max(0.0);
        Self { radius, length }
    }

    pub fn height(&self) -> f32 {
        self.length + self.radius * 2.0
    }
}

/// A loaded articulated model and the clip currently playing on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAvatar {
    pub asset: ModelAsset,
    active_clip: Option<usize>,
}

impl ModelAvatar {
    fn new(asset: ModelAsset) -> Self {
        Self {
            asset,
            active_clip: None,
        }
    }

    /// Clip whose name contains the state's hint, else the first clip.
    fn clip_for(&self, state: MotionState) -> Option<usize> {
        let clips = &self.asset.animation_clips;
        let hint = state.clip_hint();
        clips
            .iter()
            .position(|c| c.name.to_ascii_lowercase().contains(hint))
            .or(if clips.is_empty() { None } else { Some(0) })
    }

    pub fn active_clip(&self) -> Option<&str> {
        self.active_clip
            .and_then(|i| self.asset.animation_clips.get(i))
            .map(|c| c.name.as_str())
    }
}

/// The player's visual representation.
///
/// The pose (position and yaw) lives on the controller, so swapping the
/// representation never moves the player.
#[derive(Debug, Clone, PartialEq)]
pub enum Avatar {
    Placeholder(Capsule),
    Model(ModelAvatar),
}

impl Avatar {
    pub fn placeholder(half_extents: Vec3) -> Self {
        Self::Placeholder(Capsule::fitting(half_extents))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// Replace whatever is shown with a loaded model, starting the clip that
    /// matches `state`.
    pub fn attach_model(&mut self, asset: ModelAsset, state: MotionState) {
        tracing::info!(
            path = %asset.path,
            clips = asset.animation_clips.len(),
            "character model attached"
        );
        let mut model = ModelAvatar::new(asset);
        model.active_clip = model.clip_for(state);
        *self = Self::Model(model);
    }

    /// Switch clips when the motion state changes. Returns the new clip name
    /// if the active clip changed.
    pub fn sync_motion(&mut self, state: MotionState) -> Option<&str> {
        let Self::Model(model) = self else {
            return None;
        };
        let wanted = model.clip_for(state);
        if wanted == model.active_clip {
            return None;
        }
        model.active_clip = wanted;
        tracing::debug!(?state, clip = ?model.active_clip(), "animation clip switched");
        model.active_clip()
    }

    pub fn active_clip(&self) -> Option<&str> {
        match self {
            Self::Placeholder(_) => None,
            Self::Model(model) => model.active_clip(),
        }
    }

    /// World transform of the visual for a feet position and yaw. The
    /// capsule mesh is centered, so it is lifted by half its height.
    pub fn visual_transform(&self, feet: Vec3, yaw: f32) -> Transform {
        let lift = match self {
            Self::Placeholder(capsule) => capsule.height() * 0.5,
            Self::Model(_) => 0.0,
        };
        Transform::from_position(feet + Vec3::Y * lift).with_rotation(Quat::from_rotation_y(yaw))
    }
}
