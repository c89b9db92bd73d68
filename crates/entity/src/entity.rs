use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use skillcity_assets::{ResourceCache, ResourceError, TextureAsset};
use skillcity_common::{Aabb, Camera, EntityId, EntityKind, InfoRecord, PlacementSpec, Transform};

use crate::part::{Glow, InstancedBatch, PartRole, VisualPart};
use crate::recipes::{self, Animation};

/// Failure while updating a single entity. The scheduler logs these and
/// moves on to the next entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error("entity {0} was updated after it was disposed")]
    Disposed(EntityId),
    #[error("entity {id} received a non-finite {input}")]
    NonFiniteInput { id: EntityId, input: &'static str },
}

/// A constructed, independently updatable object in the city.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    spec: PlacementSpec,
    root: Transform,
    parts: Vec<VisualPart>,
    windows: Option<InstancedBatch>,
    animation: Animation,
    billboard: Option<usize>,
    light_anchor: Option<Vec3>,
    bounds: Aabb,
    collider: Aabb,
    saved_glow: Option<Vec<Option<Glow>>>,
    alive: bool,
    updates: u64,
}

impl Entity {
    /// Assemble an entity from its spec, drawing shared resources from
    /// `cache`. The root sits on the ground at the spec's position.
    pub fn build(id: EntityId, spec: PlacementSpec, cache: &mut ResourceCache) -> Result<Self, ResourceError> {
        let assembly = recipes::assemble(&spec, cache)?;
        let root = Transform::from_position(spec.world_position(0.0));
        let bounds = compute_bounds(&root, &assembly.parts, cache)?;
        let collider = collider_for(spec.kind, &root, &assembly.parts, cache)?.unwrap_or(bounds);
        tracing::debug!(
            %id,
            kind = %spec.kind,
            parts = assembly.parts.len(),
            windows = assembly.windows.as_ref().map_or(0, |w| w.len()),
            "entity built"
        );
        Ok(Self {
            id,
            spec,
            root,
            parts: assembly.parts,
            windows: assembly.windows,
            animation: assembly.animation,
            billboard: assembly.billboard,
            light_anchor: assembly.light_anchor,
            bounds,
            collider,
            saved_glow: None,
            alive: true,
            updates: 0,
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.spec.kind
    }

    pub fn spec(&self) -> &PlacementSpec {
        &self.spec
    }

    pub fn info(&self) -> Option<&InfoRecord> {
        self.spec.info.as_ref()
    }

    pub fn root(&self) -> &Transform {
        &self.root
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.root.matrix()
    }

    pub fn parts(&self) -> &[VisualPart] {
        &self.parts
    }

    pub fn windows(&self) -> Option<&InstancedBatch> {
        self.windows.as_ref()
    }

    pub fn animation(&self) -> &Animation {
        &self.animation
    }

    /// World-space bounding volume used for culling and picking.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// World-space box the player collides with.
    pub fn collider(&self) -> Aabb {
        self.collider
    }

    /// World position a point light should be attached to, if any.
    pub fn light_anchor(&self) -> Option<Vec3> {
        self.light_anchor.map(|p| self.root.matrix().transform_point3(p))
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_highlighted(&self) -> bool {
        self.saved_glow.is_some()
    }

    /// Successful `update` calls so far.
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Advance animation to `time` seconds and face billboards toward the
    /// camera. The result depends only on the inputs and the entity's fixed
    /// phase, so repeating a call changes nothing.
    pub fn update(&mut self, time: f32, camera: &Camera) -> Result<(), EntityError> {
        if !self.alive {
            return Err(EntityError::Disposed(self.id));
        }
        if !time.is_finite() {
            return Err(EntityError::NonFiniteInput { id: self.id, input: "time" });
        }
        if !camera.position.is_finite() {
            return Err(EntityError::NonFiniteInput {
                id: self.id,
                input: "camera position",
            });
        }

        let anim = self.animation;
        if anim.breathing_amplitude != 0.0 {
            let angle = TAU * anim.breathing_frequency * time + anim.breathing_phase;
            self.root.scale.y = 1.0 + anim.breathing_amplitude * angle.sin();
        }
        if let Some((index, speed)) = anim.spin {
            if let Some(part) = self.parts.get_mut(index) {
                part.local.rotation = Quat::from_rotation_y((speed * time) % TAU);
            }
        }
        if let Some(index) = self.billboard {
            let root = self.root.position;
            if let Some(part) = self.parts.get_mut(index) {
                let to_camera = camera.position - (root + part.local.position);
                if to_camera.x != 0.0 || to_camera.z != 0.0 {
                    part.local.rotation = Quat::from_rotation_y(to_camera.x.atan2(to_camera.z));
                }
            }
        }
        self.updates += 1;
        Ok(())
    }

    /// Glow every part. The previous per-part state is stored so
    /// `unhighlight` restores it exactly; highlighting twice is a no-op.
    pub fn highlight(&mut self) {
        if self.saved_glow.is_some() || !self.alive {
            return;
        }
        self.saved_glow = Some(self.parts.iter().map(|p| p.glow).collect());
        for part in &mut self.parts {
            part.glow = Some(Glow::HIGHLIGHT);
        }
    }

    pub fn unhighlight(&mut self) {
        let Some(saved) = self.saved_glow.take() else {
            return;
        };
        for (part, glow) in self.parts.iter_mut().zip(saved) {
            part.glow = glow;
        }
    }

    /// Swap the logo to a textured material once its texture has loaded.
    /// Returns `Ok(false)` when the entity is gone or has no logo.
    pub fn apply_texture(&mut self, cache: &mut ResourceCache, texture: &TextureAsset) -> Result<bool, ResourceError> {
        if !self.alive {
            tracing::debug!(id = %self.id, "texture arrived for disposed entity");
            return Ok(false);
        }
        let Some(logo) = self.parts.iter_mut().find(|p| p.role == PartRole::Logo) else {
            return Ok(false);
        };
        let current = cache.get_material(logo.material)?;
        let kind = current.kind;
        let params = current.params.clone().with_texture(texture.path.clone());
        logo.material = cache.material(kind, &params)?;
        tracing::debug!(id = %self.id, path = %texture.path, "logo texture applied");
        Ok(true)
    }

    /// Drop every visual part. Cache resources are released by the cache
    /// owner, not here. Returns `false` if already disposed.
    pub fn dispose(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.alive = false;
        self.parts.clear();
        self.windows = None;
        self.saved_glow = None;
        true
    }
}

fn part_bounds(root: &Transform, part: &VisualPart, cache: &ResourceCache) -> Result<Option<Aabb>, ResourceError> {
    let mesh = &cache.get_geometry(part.geometry)?.mesh;
    let points: Vec<Vec3> = mesh.positions.iter().map(|p| Vec3::from_array(*p)).collect();
    let matrix = root.matrix() * part.local.matrix();
    Ok(Aabb::from_points(&points).map(|b| b.transform(&matrix)))
}

fn compute_bounds(root: &Transform, parts: &[VisualPart], cache: &ResourceCache) -> Result<Aabb, ResourceError> {
    let mut bounds: Option<Aabb> = None;
    for part in parts {
        if let Some(b) = part_bounds(root, part, cache)? {
            bounds = Some(bounds.map_or(b, |acc| acc.merge(&b)));
        }
    }
    Ok(bounds.unwrap_or_else(|| Aabb::from_center_half_extents(root.position, Vec3::splat(0.5))))
}

/// Thin props collide with their trunk or pole only.
fn collider_for(
    kind: EntityKind,
    root: &Transform,
    parts: &[VisualPart],
    cache: &ResourceCache,
) -> Result<Option<Aabb>, ResourceError> {
    let role = match kind {
        EntityKind::Tree => PartRole::Trunk,
        EntityKind::Streetlight => PartRole::Pole,
        _ => return Ok(None),
    };
    match parts.iter().find(|p| p.role == role) {
        Some(part) => part_bounds(root, part, cache),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn landmark(cache: &mut ResourceCache) -> Entity {
        let spec = PlacementSpec::new(EntityKind::Main, Vec2::new(0.0, -40.0), Vec3::new(16.0, 40.0, 16.0))
            .with_info(InfoRecord::new("Main", "Hub"));
        Entity::build(EntityId(1), spec, cache).unwrap()
    }

    #[test]
    fn bounds_cover_body_and_sit_on_ground() {
        let mut cache = ResourceCache::new();
        let e = landmark(&mut cache);
        let b = e.bounds();
        assert!(b.min.y.abs() < 1e-4);
        assert!(b.max.y > 40.0);
        assert!(b.contains_point(Vec3::new(0.0, 10.0, -40.0)));
        assert_eq!(e.collider(), b);
    }

    #[test]
    fn tree_collider_is_the_trunk() {
        let mut cache = ResourceCache::new();
        let spec = PlacementSpec::new(EntityKind::Tree, Vec2::new(5.0, 5.0), Vec3::new(3.0, 6.0, 3.0));
        let e = Entity::build(EntityId(2), spec, &mut cache).unwrap();
        assert!(e.collider().size().x < 1.0);
        assert!(e.bounds().size().x > 2.0);
    }

    #[test]
    fn update_is_deterministic_for_same_inputs() {
        let mut cache = ResourceCache::new();
        let mut a = landmark(&mut cache);
        let mut b = a.clone();
        let cam = Camera::looking_at(Vec3::new(30.0, 20.0, 30.0), Vec3::ZERO);
        a.update(2.5, &cam).unwrap();
        b.update(2.5, &cam).unwrap();
        b.update(2.5, &cam).unwrap();
        assert_eq!(a.root(), b.root());
        assert_eq!(a.parts(), b.parts());
        assert_eq!(b.update_count(), 2);
    }

    #[test]
    fn landmarks_breathe() {
        let mut cache = ResourceCache::new();
        let mut e = landmark(&mut cache);
        let cam = Camera::default();
        let mut scales = Vec::new();
        for step in 0..8 {
            e.update(step as f32 * 0.5, &cam).unwrap();
            scales.push(e.root().scale.y);
        }
        assert!(scales.iter().any(|s| (s - 1.0).abs() > 1e-3));
        assert!(scales.iter().all(|s| (s - 1.0).abs() <= 0.0151));
    }

    #[test]
    fn billboard_faces_camera() {
        let mut cache = ResourceCache::new();
        let mut e = landmark(&mut cache);
        let logo_index = e.parts().iter().position(|p| p.role == PartRole::Logo).unwrap();
        let logo_pos = e.root().position + e.parts()[logo_index].local.position;
        let cam = Camera::looking_at(logo_pos + Vec3::new(50.0, 0.0, 0.0), logo_pos);
        e.update(0.0, &cam).unwrap();
        let facing = e.parts()[logo_index].local.rotation * Vec3::Z;
        assert!((facing - Vec3::X).length() < 1e-4);
    }

    #[test]
    fn highlight_round_trips_exactly() {
        let mut cache = ResourceCache::new();
        let mut e = landmark(&mut cache);
        let before = e.parts().to_vec();
        let materials: Vec<_> = before.iter().map(|p| p.material).collect();

        e.highlight();
        e.highlight();
        assert!(e.is_highlighted());
        assert!(e.parts().iter().all(|p| p.glow == Some(Glow::HIGHLIGHT)));
        // Shared materials are untouched.
        assert_eq!(e.parts().iter().map(|p| p.material).collect::<Vec<_>>(), materials);

        e.unhighlight();
        assert_eq!(e.parts(), &before[..]);
        e.unhighlight();
        assert_eq!(e.parts(), &before[..]);
    }

    #[test]
    fn update_after_dispose_fails() {
        let mut cache = ResourceCache::new();
        let mut e = landmark(&mut cache);
        assert!(e.dispose());
        assert!(!e.dispose());
        assert_eq!(
            e.update(1.0, &Camera::default()),
            Err(EntityError::Disposed(EntityId(1)))
        );
    }

    #[test]
    fn non_finite_time_is_rejected() {
        let mut cache = ResourceCache::new();
        let mut e = landmark(&mut cache);
        let err = e.update(f32::NAN, &Camera::default()).unwrap_err();
        assert!(matches!(err, EntityError::NonFiniteInput { input: "time", .. }));
        assert_eq!(e.update_count(), 0);
    }

    #[test]
    fn texture_swaps_logo_material_only() {
        let mut cache = ResourceCache::new();
        let mut e = landmark(&mut cache);
        let logo_before = e.parts().iter().find(|p| p.role == PartRole::Logo).unwrap().material;
        let texture = TextureAsset {
            path: "logos/main.png".into(),
            width: 256,
            height: 128,
        };
        assert!(e.apply_texture(&mut cache, &texture).unwrap());
        let logo_after = e.parts().iter().find(|p| p.role == PartRole::Logo).unwrap().material;
        assert_ne!(logo_before, logo_after);
        let params = &cache.get_material(logo_after).unwrap().params;
        assert_eq!(params.texture.as_deref(), Some("logos/main.png"));

        e.dispose();
        assert!(!e.apply_texture(&mut cache, &texture).unwrap());
    }

    #[test]
    fn streetlight_anchor_is_in_world_space() {
        let mut cache = ResourceCache::new();
        let spec = PlacementSpec::new(EntityKind::Streetlight, Vec2::new(10.0, 20.0), Vec3::new(0.5, 5.0, 0.5));
        let e = Entity::build(EntityId(3), spec, &mut cache).unwrap();
        let anchor = e.light_anchor().unwrap();
        assert!((anchor.x - 11.0).abs() < 1e-4);
        assert!((anchor.z - 20.0).abs() < 1e-4);
    }
}
