//! Assembly recipes: one pure function per entity kind turning a placement
//! spec into visual parts with fixed relative offsets.

use std::f32::consts::FRAC_PI_4;

use glam::{Quat, Vec3};
use skillcity_assets::{
    GeometryHandle, GeometryKind, MaterialHandle, MaterialKind, MaterialParams, ResourceCache,
    ResourceError,
};
use skillcity_common::{Color, EntityKind, PlacementSpec, Transform};

use crate::part::{InstancedBatch, PartRole, VisualPart};
use crate::windows::{self, WindowGridConfig};

const SEGMENTS: f32 = 16.0;

/// Periodic motion applied while the entity is active.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Animation {
    /// Relative vertical scale amplitude of the breathing cycle.
    pub breathing_amplitude: f32,
    /// Breathing cycles per second.
    pub breathing_frequency: f32,
    pub breathing_phase: f32,
    /// Part spun around its local Y axis, with its angular speed (rad/s).
    pub spin: Option<(usize, f32)>,
}

impl Animation {
    pub fn is_static(&self) -> bool {
        self.breathing_amplitude == 0.0 && self.spin.is_none()
    }
}

/// Output of a recipe, consumed by [`crate::Entity::build`].
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub parts: Vec<VisualPart>,
    pub windows: Option<InstancedBatch>,
    pub animation: Animation,
    /// Index of the part that turns to face the camera.
    pub billboard: Option<usize>,
    /// Local point a point light is attached to.
    pub light_anchor: Option<Vec3>,
}

impl Assembly {
    fn push(&mut self, part: VisualPart) -> usize {
        self.parts.push(part);
        self.parts.len() - 1
    }
}

fn boxed(cache: &mut ResourceCache, w: f32, h: f32, d: f32) -> Result<GeometryHandle, ResourceError> {
    cache.geometry(GeometryKind::Box, &[w, h, d])
}

fn standard(cache: &mut ResourceCache, color: Color) -> Result<MaterialHandle, ResourceError> {
    cache.material(MaterialKind::Standard, &MaterialParams::colored(color))
}

fn at(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_position(Vec3::new(x, y, z))
}

/// Build the parts for `spec`. Every kind has a recipe, so the only failures
/// come from the cache.
pub fn assemble(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let mut assembly = match spec.kind {
        EntityKind::Main => main_tower(spec, cache)?,
        EntityKind::ProviderA => provider_a(spec, cache)?,
        EntityKind::ProviderB => provider_b(spec, cache)?,
        EntityKind::ProviderC => provider_c(spec, cache)?,
        EntityKind::Residential => residential(spec, cache)?,
        EntityKind::Tree => tree(spec, cache)?,
        EntityKind::Streetlight => streetlight(spec, cache)?,
        EntityKind::Bench => bench(spec, cache)?,
        EntityKind::Fountain => fountain(spec, cache)?,
    };
    if !spec.cast_shadow {
        for part in &mut assembly.parts {
            part.cast_shadow = false;
        }
    }
    Ok(assembly)
}

/// Lit-window batch for a box-shaped body.
fn window_batch(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<InstancedBatch, ResourceError> {
    let geometry = boxed(
        cache,
        windows::WINDOW_WIDTH,
        windows::WINDOW_HEIGHT,
        windows::WINDOW_THICKNESS,
    )?;
    let material = cache.material(
        MaterialKind::Standard,
        &MaterialParams::colored(Color::from_hex(0xfff3c4))
            .with_emissive(Color::from_hex(0xffd27a), 0.4)
            .with_surface(0.2, 0.0),
    )?;
    Ok(InstancedBatch {
        geometry,
        material,
        instances: windows::window_grid(&WindowGridConfig::default(), spec.dimensions, spec.seed),
    })
}

/// Box body with its base at the local origin.
fn body(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<VisualPart, ResourceError> {
    let d = spec.dimensions;
    Ok(VisualPart::new(
        "body",
        PartRole::Body,
        boxed(cache, d.x, d.y, d.z)?,
        standard(cache, spec.color)?,
        at(0.0, d.y * 0.5, 0.0),
    ))
}

/// Floating sign above a landmark; faces the camera every frame.
fn logo(spec: &PlacementSpec, cache: &mut ResourceCache, top: f32) -> Result<VisualPart, ResourceError> {
    let size = (spec.dimensions.x * 0.6).max(4.0);
    let params = MaterialParams::colored(Color::WHITE).with_emissive(spec.color, 0.25);
    Ok(VisualPart::new(
        "logo",
        PartRole::Logo,
        boxed(cache, size, size * 0.5, 0.3)?,
        cache.material(MaterialKind::Basic, &params)?,
        at(0.0, top + size * 0.5, 0.0),
    )
    .without_shadow())
}

fn landmark_animation(spec: &PlacementSpec) -> Animation {
    Animation {
        breathing_amplitude: 0.015,
        breathing_frequency: 0.25,
        breathing_phase: (spec.seed % 628) as f32 / 100.0,
        spin: None,
    }
}

fn main_tower(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let mut a = Assembly {
        animation: landmark_animation(spec),
        ..Assembly::default()
    };
    a.push(body(spec, cache)?);

    let crown_h = d.y * 0.12;
    let glass = cache.material(
        MaterialKind::Glass,
        &MaterialParams::colored(Color::from_hex(0x9ad0ff))
            .with_surface(0.05, 0.6)
            .with_opacity(0.6),
    )?;
    a.push(VisualPart::new(
        "crown",
        PartRole::Glass,
        boxed(cache, d.x * 0.8, crown_h, d.z * 0.8)?,
        glass,
        at(0.0, d.y + crown_h * 0.5, 0.0),
    ));

    let antenna_h = d.y * 0.2;
    let top = d.y + crown_h;
    a.push(VisualPart::new(
        "antenna",
        PartRole::Accent,
        cache.geometry(GeometryKind::Cylinder, &[0.25, 0.4, antenna_h, 8.0])?,
        standard(cache, Color::from_hex(0xcccccc))?,
        at(0.0, top + antenna_h * 0.5, 0.0),
    ));
    a.billboard = Some(a.push(logo(spec, cache, top + antenna_h)?));
    a.windows = Some(window_batch(spec, cache)?);
    Ok(a)
}

/// Landmark with a pyramid roof accent.
fn provider_a(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let mut a = Assembly {
        animation: landmark_animation(spec),
        ..Assembly::default()
    };
    a.push(body(spec, cache)?);

    let roof_h = d.y * 0.25;
    let radius = d.x.max(d.z) * 0.72;
    a.push(VisualPart::new(
        "roof-accent",
        PartRole::Roof,
        cache.geometry(GeometryKind::Cone, &[radius, roof_h, 4.0])?,
        standard(cache, spec.color.lerp(Color::WHITE, 0.35))?,
        at(0.0, d.y + roof_h * 0.5, 0.0).with_rotation(Quat::from_rotation_y(FRAC_PI_4)),
    ));
    a.billboard = Some(a.push(logo(spec, cache, d.y + roof_h + 1.0)?));
    a.windows = Some(window_batch(spec, cache)?);
    Ok(a)
}

/// Landmark with two stacked, narrowing tiers on top.
fn provider_b(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let mut a = Assembly {
        animation: landmark_animation(spec),
        ..Assembly::default()
    };
    a.push(body(spec, cache)?);

    let tier_h = d.y * 0.15;
    let material = standard(cache, spec.color.scaled(0.85))?;
    let mut top = d.y;
    for (name, shrink) in [("tier-lower", 0.75), ("tier-upper", 0.5)] {
        a.push(VisualPart::new(
            name,
            PartRole::Accent,
            boxed(cache, d.x * shrink, tier_h, d.z * shrink)?,
            material,
            at(0.0, top + tier_h * 0.5, 0.0),
        ));
        top += tier_h;
    }
    a.billboard = Some(a.push(logo(spec, cache, top + 1.0)?));
    a.windows = Some(window_batch(spec, cache)?);
    Ok(a)
}

/// Round landmark: cylinder body with a dome.
fn provider_c(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let radius = d.x.min(d.z) * 0.5;
    let mut a = Assembly {
        animation: landmark_animation(spec),
        ..Assembly::default()
    };
    a.push(VisualPart::new(
        "body",
        PartRole::Body,
        cache.geometry(GeometryKind::Cylinder, &[radius, radius, d.y, SEGMENTS * 2.0])?,
        standard(cache, spec.color)?,
        at(0.0, d.y * 0.5, 0.0),
    ));
    a.push(VisualPart::new(
        "dome",
        PartRole::Glass,
        cache.geometry(GeometryKind::Sphere, &[radius, SEGMENTS * 2.0, SEGMENTS])?,
        cache.material(
            MaterialKind::Glass,
            &MaterialParams::colored(spec.color.lerp(Color::WHITE, 0.5)).with_opacity(0.7),
        )?,
        at(0.0, d.y, 0.0),
    ));
    a.billboard = Some(a.push(logo(spec, cache, d.y + radius + 1.0)?));
    a.windows = Some(window_batch(spec, cache)?);
    Ok(a)
}

fn residential(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let mut a = Assembly::default();
    a.push(body(spec, cache)?);

    if spec.roofed {
        let roof_h = (d.x.min(d.z) * 0.4).max(1.0);
        a.push(VisualPart::new(
            "roof",
            PartRole::Roof,
            cache.geometry(GeometryKind::Cone, &[d.x.max(d.z) * 0.75, roof_h, 4.0])?,
            standard(cache, Color::from_hex(0x8b3a2e))?,
            at(0.0, d.y + roof_h * 0.5, 0.0).with_rotation(Quat::from_rotation_y(FRAC_PI_4)),
        ));
    }
    a.push(
        VisualPart::new(
            "door",
            PartRole::Door,
            boxed(cache, 1.4, 2.4, 0.2)?,
            standard(cache, Color::from_hex(0x4a3426))?,
            at(0.0, 1.2, d.z * 0.5 + 0.1),
        )
        .without_shadow(),
    );
    a.windows = Some(window_batch(spec, cache)?);
    Ok(a)
}

fn tree(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let trunk_h = d.y * 0.4;
    let mut a = Assembly::default();
    a.push(VisualPart::new(
        "trunk",
        PartRole::Trunk,
        cache.geometry(GeometryKind::Cylinder, &[0.2, 0.3, trunk_h, 8.0])?,
        standard(cache, Color::from_hex(0x6b4a2b))?,
        at(0.0, trunk_h * 0.5, 0.0),
    ));
    let crown_h = d.y - trunk_h;
    a.push(VisualPart::new(
        "foliage",
        PartRole::Foliage,
        cache.geometry(GeometryKind::Cone, &[d.x * 0.5, crown_h, 8.0])?,
        standard(cache, spec.color)?,
        at(0.0, trunk_h + crown_h * 0.5, 0.0),
    ));
    Ok(a)
}

fn streetlight(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let h = spec.dimensions.y;
    let metal = cache.material(
        MaterialKind::Standard,
        &MaterialParams::colored(Color::from_hex(0x3a3f44)).with_surface(0.4, 0.8),
    )?;
    let mut a = Assembly::default();
    a.push(VisualPart::new(
        "pole",
        PartRole::Pole,
        cache.geometry(GeometryKind::Cylinder, &[0.08, 0.12, h, 8.0])?,
        metal,
        at(0.0, h * 0.5, 0.0),
    ));
    a.push(VisualPart::new(
        "arm",
        PartRole::Pole,
        boxed(cache, 1.2, 0.1, 0.1)?,
        metal,
        at(0.5, h - 0.05, 0.0),
    ));
    let lamp_at = Vec3::new(1.0, h - 0.25, 0.0);
    a.push(
        VisualPart::new(
            "lamp",
            PartRole::Lamp,
            cache.geometry(GeometryKind::Sphere, &[0.25, 12.0, 8.0])?,
            cache.material(
                MaterialKind::Basic,
                &MaterialParams::colored(Color::from_hex(0xfff2c0))
                    .with_emissive(Color::from_hex(0xffd27a), 1.0),
            )?,
            Transform::from_position(lamp_at),
        )
        .without_shadow(),
    );
    a.light_anchor = Some(lamp_at);
    Ok(a)
}

fn bench(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let wood = standard(cache, spec.color)?;
    let iron = standard(cache, Color::from_hex(0x2b2b2b))?;
    let seat_y = d.y * 0.45;
    let mut a = Assembly::default();
    a.push(VisualPart::new(
        "seat",
        PartRole::Seat,
        boxed(cache, d.x, 0.1, d.z)?,
        wood,
        at(0.0, seat_y, 0.0),
    ));
    a.push(VisualPart::new(
        "backrest",
        PartRole::Seat,
        boxed(cache, d.x, d.y - seat_y, 0.08)?,
        wood,
        at(0.0, seat_y + (d.y - seat_y) * 0.5, -d.z * 0.5),
    ));
    // Both legs share one geometry.
    let leg = boxed(cache, 0.1, seat_y, d.z)?;
    for (name, x) in [("leg-left", -d.x * 0.4), ("leg-right", d.x * 0.4)] {
        a.push(VisualPart::new(name, PartRole::Pole, leg, iron, at(x, seat_y * 0.5, 0.0)));
    }
    Ok(a)
}

fn fountain(spec: &PlacementSpec, cache: &mut ResourceCache) -> Result<Assembly, ResourceError> {
    let d = spec.dimensions;
    let radius = d.x.min(d.z) * 0.5;
    let stone = standard(cache, spec.color)?;
    let mut a = Assembly::default();
    a.push(VisualPart::new(
        "base",
        PartRole::Body,
        cache.geometry(GeometryKind::Cylinder, &[radius, radius * 1.05, 0.8, SEGMENTS * 2.0])?,
        stone,
        at(0.0, 0.4, 0.0),
    ));
    a.push(VisualPart::new(
        "basin",
        PartRole::Body,
        cache.geometry(GeometryKind::Cylinder, &[radius * 0.45, radius * 0.35, 0.6, SEGMENTS])?,
        stone,
        at(0.0, d.y * 0.55, 0.0),
    ));
    a.push(VisualPart::new(
        "spout",
        PartRole::Pole,
        cache.geometry(GeometryKind::Cylinder, &[0.15, 0.25, d.y * 0.5, 8.0])?,
        stone,
        at(0.0, d.y * 0.25, 0.0),
    ));
    let water = cache.material(
        MaterialKind::Glass,
        &MaterialParams::colored(Color::from_hex(0x4fa3d9))
            .with_surface(0.1, 0.0)
            .with_opacity(0.75),
    )?;
    let spray = a.push(
        VisualPart::new(
            "water",
            PartRole::Water,
            cache.geometry(GeometryKind::Cone, &[radius * 0.3, d.y * 0.45, SEGMENTS])?,
            water,
            at(0.0, d.y * 0.78, 0.0),
        )
        .without_shadow(),
    );
    a.animation.spin = Some((spray, 1.2));
    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn spec(kind: EntityKind) -> PlacementSpec {
        let dims = match kind {
            EntityKind::Tree => Vec3::new(3.0, 6.0, 3.0),
            EntityKind::Streetlight => Vec3::new(0.5, 5.0, 0.5),
            EntityKind::Bench => Vec3::new(2.0, 1.0, 0.6),
            EntityKind::Fountain => Vec3::new(8.0, 3.0, 8.0),
            _ => Vec3::new(12.0, 30.0, 12.0),
        };
        PlacementSpec::new(kind, Vec2::ZERO, dims).with_seed(3)
    }

    #[test]
    fn every_kind_assembles() {
        let mut cache = ResourceCache::new();
        for kind in EntityKind::ALL {
            let a = assemble(&spec(kind), &mut cache).unwrap();
            assert!(!a.parts.is_empty(), "{kind} produced no parts");
            assert_eq!(a.windows.is_some(), kind.is_building(), "{kind}");
            assert_eq!(a.billboard.is_some(), kind.is_landmark(), "{kind}");
        }
    }

    #[test]
    fn windows_are_one_batch_not_parts() {
        let mut cache = ResourceCache::new();
        let a = assemble(&spec(EntityKind::Residential), &mut cache).unwrap();
        let batch = a.windows.unwrap();
        assert!(batch.len() > 10);
        assert!(a.parts.len() <= 3);
    }

    #[test]
    fn roof_only_when_requested() {
        let mut cache = ResourceCache::new();
        let flat = assemble(&spec(EntityKind::Residential), &mut cache).unwrap();
        let roofed = assemble(&spec(EntityKind::Residential).with_roof(true), &mut cache).unwrap();
        assert!(flat.parts.iter().all(|p| p.role != PartRole::Roof));
        assert!(roofed.parts.iter().any(|p| p.role == PartRole::Roof));
    }

    #[test]
    fn landmark_variants_differ_in_decoration() {
        let mut cache = ResourceCache::new();
        let a = assemble(&spec(EntityKind::ProviderA), &mut cache).unwrap();
        let b = assemble(&spec(EntityKind::ProviderB), &mut cache).unwrap();
        assert!(a.parts.iter().any(|p| p.name == "roof-accent"));
        assert_eq!(b.parts.iter().filter(|p| p.name.starts_with("tier")).count(), 2);
    }

    #[test]
    fn identical_props_share_cache_entries() {
        let mut cache = ResourceCache::new();
        assemble(&spec(EntityKind::Tree), &mut cache).unwrap();
        let after_first = (cache.geometry_count(), cache.material_count());
        let moved = PlacementSpec {
            position: Vec2::new(40.0, -12.0),
            ..spec(EntityKind::Tree)
        };
        assemble(&moved, &mut cache).unwrap();
        assert_eq!((cache.geometry_count(), cache.material_count()), after_first);
    }

    #[test]
    fn bench_legs_share_geometry() {
        let mut cache = ResourceCache::new();
        let a = assemble(&spec(EntityKind::Bench), &mut cache).unwrap();
        let legs: Vec<_> = a.parts.iter().filter(|p| p.name.starts_with("leg")).collect();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].geometry, legs[1].geometry);
    }

    #[test]
    fn shadow_flag_propagates() {
        let mut cache = ResourceCache::new();
        let a = assemble(&spec(EntityKind::Tree).with_shadow(false), &mut cache).unwrap();
        assert!(a.parts.iter().all(|p| !p.cast_shadow));
    }

    #[test]
    fn streetlight_has_light_anchor_and_fountain_spins() {
        let mut cache = ResourceCache::new();
        assert!(assemble(&spec(EntityKind::Streetlight), &mut cache).unwrap().light_anchor.is_some());
        let f = assemble(&spec(EntityKind::Fountain), &mut cache).unwrap();
        let (index, _) = f.animation.spin.unwrap();
        assert_eq!(f.parts[index].role, PartRole::Water);
    }
}
