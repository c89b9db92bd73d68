use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use skillcity_assets::{GeometryKind, MaterialKind, MaterialParams, ResourceCache, ResourceError};
use skillcity_common::{Color, EntityId, EntityKind, PlacementSpec, Rect, Transform};
use skillcity_entity::{Entity, InstancedBatch};
use skillcity_layout::{ExclusionZones, ScatterPlacer};

use crate::city::City;
use crate::config::{CityConfig, ConfigError, PropSet};
use crate::scene::{Light, NodeContent, NodeId, SceneGraph};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Assembles a [`City`] from a [`CityConfig`].
///
/// Order: ground and plaza, landmarks, roads with lane markings, residential
/// fill, props, lights. Landmarks are placed before the residential fill so
/// their footprints can be excluded.
pub struct CityBuilder {
    config: CityConfig,
}

struct Assembly {
    city: City,
    rng: StdRng,
    next_id: u32,
    groups: Groups,
}

struct Groups {
    landmarks: NodeId,
    residential: NodeId,
    props: NodeId,
    lights: NodeId,
}

impl CityBuilder {
    pub fn new(config: CityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CityConfig {
        &self.config
    }

    /// Build the city into `cache`. Equal configs produce equal cities.
    pub fn build(&self, cache: ResourceCache) -> Result<City, BuildError> {
        let _span = tracing::info_span!("city_assembly", seed = self.config.seed).entered();
        self.config.validate()?;

        let mut city = City::new(cache);
        let groups = Groups {
            landmarks: city.scene.group("landmarks"),
            residential: city.scene.group("residential"),
            props: city.scene.group("props"),
            lights: city.scene.group("lights"),
        };
        let mut asm = Assembly {
            city,
            rng: StdRng::seed_from_u64(self.config.seed),
            next_id: 0,
            groups,
        };

        self.ground(&mut asm)?;
        let landmark_footprints = self.landmarks(&mut asm)?;
        let roads = self.roads(&mut asm)?;
        let houses = self.residential(&mut asm, &roads, &landmark_footprints)?;
        self.props(&mut asm, &roads, &landmark_footprints, &houses)?;
        self.lights(&mut asm);

        let city = asm.city;
        tracing::info!(
            entities = city.entity_count(),
            nodes = city.scene.len(),
            geometries = city.cache.geometry_count(),
            materials = city.cache.material_count(),
            "city assembled"
        );
        Ok(city)
    }

    fn ground(&self, asm: &mut Assembly) -> Result<(), BuildError> {
        let c = &self.config;
        let cache = &mut asm.city.cache;
        let size = c.half_extent * 2.0;
        let ground = NodeContent::Mesh {
            geometry: cache.geometry(GeometryKind::Plane, &[size, size])?,
            material: cache.material(MaterialKind::Standard, &MaterialParams::colored(c.ground_color))?,
            cast_shadow: false,
        };
        asm.city.scene.add(SceneGraph::ROOT, "ground", Transform::default(), ground);

        if c.plaza_radius > 0.0 {
            let plaza = NodeContent::Mesh {
                geometry: cache.geometry(GeometryKind::Cylinder, &[c.plaza_radius, c.plaza_radius, 0.1, 48.0])?,
                material: cache.material(MaterialKind::Standard, &MaterialParams::colored(c.plaza_color))?,
                cast_shadow: false,
            };
            asm.city.scene.add(
                SceneGraph::ROOT,
                "plaza",
                Transform::from_position(Vec3::new(0.0, 0.05, 0.0)),
                plaza,
            );
        }
        Ok(())
    }

    /// Returns the landmark footprints for later exclusion.
    fn landmarks(&self, asm: &mut Assembly) -> Result<Vec<Rect>, BuildError> {
        let mut footprints = Vec::with_capacity(self.config.landmarks.len());
        for landmark in &self.config.landmarks {
            let seed = asm.rng.next_u64();
            let spec = landmark.to_spec(seed);
            footprints.push(spec.footprint());
            let id = asm.spawn(spec, asm.groups.landmarks)?;
            asm.city.visibility.insert_always(id);
        }
        tracing::info!(count = footprints.len(), "landmarks placed");
        Ok(footprints)
    }

    /// Two main roads crossing at the plaza. Returns their rectangles.
    fn roads(&self, asm: &mut Assembly) -> Result<Vec<Rect>, BuildError> {
        let c = &self.config;
        let length = c.half_extent * 2.0;
        let rects = vec![
            Rect::from_center_size(Vec2::ZERO, Vec2::new(length, c.road_width)),
            Rect::from_center_size(Vec2::ZERO, Vec2::new(c.road_width, length)),
        ];
        if c.road_width <= 0.0 {
            return Ok(Vec::new());
        }

        let cache = &mut asm.city.cache;
        let asphalt = cache.material(
            MaterialKind::Standard,
            &MaterialParams::colored(c.road_color).with_surface(0.9, 0.0),
        )?;
        let roads = asm.city.scene.group("roads");
        for (i, rect) in rects.iter().enumerate() {
            let size = rect.size();
            let strip = NodeContent::Mesh {
                geometry: cache.geometry(GeometryKind::Box, &[size.x, 0.05, size.y])?,
                material: asphalt,
                cast_shadow: false,
            };
            let name = if i == 0 { "road-east-west" } else { "road-north-south" };
            asm.city.scene.add(
                roads,
                name,
                Transform::from_position(Vec3::new(0.0, 0.025, 0.0)),
                strip,
            );
        }

        // Dashes down the middle of both roads, skipping the plaza.
        let mut dashes = Vec::new();
        let spacing = c.lane_dash_spacing.max(1.0);
        let mut t = -c.half_extent + spacing * 0.5;
        while t < c.half_extent {
            if t.abs() > c.plaza_radius + 1.0 {
                dashes.push(Transform::from_position(Vec3::new(t, 0.06, 0.0)));
                dashes.push(
                    Transform::from_position(Vec3::new(0.0, 0.06, t))
                        .with_rotation(glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
                );
            }
            t += spacing;
        }
        let batch = InstancedBatch {
            geometry: cache.geometry(GeometryKind::Box, &[2.0, 0.02, 0.25])?,
            material: cache.material(MaterialKind::Basic, &MaterialParams::colored(Color::from_hex(0xf2e9c9)))?,
            instances: dashes,
        };
        tracing::debug!(dashes = batch.len(), "lane markings");
        asm.city.scene.add(roads, "lane-markings", Transform::default(), NodeContent::Batch(batch));
        Ok(rects)
    }

    /// Returns the residential footprints so props avoid them.
    fn residential(
        &self,
        asm: &mut Assembly,
        roads: &[Rect],
        landmarks: &[Rect],
    ) -> Result<Vec<Rect>, BuildError> {
        let r = &self.config.residential;
        // Centers stay far enough out that even the largest footprint
        // clears every exclusion.
        let margin = r.footprint.1 * 0.5 + r.clearance;
        let mut zones = ExclusionZones::new();
        for rect in roads.iter().chain(landmarks) {
            zones.add_band(*rect, margin);
        }
        if self.config.plaza_radius > 0.0 {
            let side = Vec2::splat(self.config.plaza_radius * 2.0);
            zones.add_band(Rect::from_center_size(Vec2::ZERO, side), margin);
        }

        // Neighbouring houses never overlap, whatever the jitter.
        let grid = r.grid.spaced(r.footprint.1 + r.clearance);
        let points = grid.place(r.count, &mut asm.rng, &zones);
        if points.len() < r.count {
            tracing::info!(requested = r.count, placed = points.len(), "residential grid ran short");
        }

        let mut footprints = Vec::with_capacity(points.len());
        for point in points {
            let width = round_half(asm.rng.gen_range(r.footprint.0..=r.footprint.1));
            let depth = round_half(asm.rng.gen_range(r.footprint.0..=r.footprint.1));
            let height = round_half(asm.rng.gen_range(r.height.0..=r.height.1));
            let color = r.palette[asm.rng.gen_range(0..r.palette.len())];
            let roofed = asm.rng.gen_bool(r.roof_probability);
            let seed = asm.rng.next_u64();
            let spec = PlacementSpec::new(EntityKind::Residential, point, Vec3::new(width, height, depth))
                .with_color(color)
                .with_roof(roofed)
                .with_seed(seed);
            footprints.push(spec.footprint());
            let id = asm.spawn(spec, asm.groups.residential)?;
            asm.city.visibility.insert_conditional(id);
        }
        tracing::info!(count = footprints.len(), "residential fill placed");
        Ok(footprints)
    }

    fn props(
        &self,
        asm: &mut Assembly,
        roads: &[Rect],
        landmarks: &[Rect],
        houses: &[Rect],
    ) -> Result<(), BuildError> {
        let p = &self.config.props;
        let mut zones = ExclusionZones::new();
        zones.add_disk(Vec2::ZERO, p.center_exclusion);
        for road in roads {
            zones.add_band(*road, p.road_band);
        }
        for rect in landmarks.iter().chain(houses) {
            zones.add_band(*rect, 1.0);
        }
        let placer = ScatterPlacer::new(self.config.half_extent - 5.0, p.min_spacing);

        for (kind, set) in [
            (EntityKind::Tree, &p.trees),
            (EntityKind::Streetlight, &p.streetlights),
            (EntityKind::Bench, &p.benches),
        ] {
            let placed = self.scatter(asm, &placer, &zones, kind, set)?;
            // Later kinds keep their distance from earlier ones.
            for point in placed {
                zones.add_disk(point, p.min_spacing * 0.5);
            }
        }

        if p.fountain {
            let spec = PlacementSpec::new(EntityKind::Fountain, Vec2::ZERO, Vec3::new(7.0, 3.0, 7.0))
                .with_color(Color::from_hex(0xb8b2a7));
            let id = asm.spawn(spec, asm.groups.props)?;
            asm.city.visibility.insert_conditional(id);
        }
        Ok(())
    }

    fn scatter(
        &self,
        asm: &mut Assembly,
        placer: &ScatterPlacer,
        zones: &ExclusionZones,
        kind: EntityKind,
        set: &PropSet,
    ) -> Result<Vec<Vec2>, BuildError> {
        let points = placer
            .place(set.count, &set.anchors, &mut asm.rng, zones)
            .unwrap_or_else(|exhausted| {
                tracing::warn!(%kind, "{exhausted}");
                exhausted.into_points()
            });
        for (i, point) in points.iter().enumerate() {
            let mut spec = PlacementSpec::new(kind, *point, set.dimensions)
                .with_color(set.color)
                .with_seed(i as u64);
            if kind == EntityKind::Tree {
                // Slight size variety; rounded so trees still share geometry.
                let scale = round_half(asm.rng.gen_range(0.8..1.3) * 2.0) / 2.0;
                spec.dimensions *= scale;
                spec.color = set.color.scaled(asm.rng.gen_range(0.85..1.1));
            }
            let id = asm.spawn(spec, asm.groups.props)?;
            asm.city.visibility.insert_conditional(id);
        }
        tracing::debug!(%kind, count = points.len(), "props placed");
        Ok(points)
    }

    fn lights(&self, asm: &mut Assembly) {
        let l = &self.config.lighting;
        let group = asm.groups.lights;
        let scene = &mut asm.city.scene;
        scene.add(
            group,
            "ambient",
            Transform::default(),
            NodeContent::Light(Light::Ambient {
                color: l.ambient_color,
                intensity: l.ambient_intensity,
            }),
        );
        scene.add(
            group,
            "sun",
            Transform::from_position(Vec3::new(80.0, 150.0, 60.0)),
            NodeContent::Light(Light::Directional {
                direction: l.sun_direction.normalize_or_zero(),
                color: l.sun_color,
                intensity: l.sun_intensity,
                cast_shadow: true,
            }),
        );
        let anchors: Vec<Vec3> = asm
            .city
            .entities
            .values()
            .filter_map(Entity::light_anchor)
            .collect();
        for anchor in &anchors {
            asm.city.scene.add(
                group,
                "streetlight",
                Transform::from_position(*anchor),
                NodeContent::Light(Light::Point {
                    color: l.streetlight_color,
                    intensity: l.streetlight_intensity,
                    range: l.streetlight_range,
                }),
            );
        }
        tracing::debug!(point_lights = anchors.len(), "lights added");
    }
}

impl Assembly {
    /// Build an entity, give it the next id and hang it under `group`.
    fn spawn(&mut self, spec: PlacementSpec, group: NodeId) -> Result<EntityId, ResourceError> {
        let id = EntityId(self.next_id);
        let entity = Entity::build(id, spec, &mut self.city.cache)?;
        self.next_id += 1;
        self.city
            .scene
            .add(group, entity.kind().tag(), Transform::default(), NodeContent::Entity(id));
        self.city.entities.insert(id, entity);
        Ok(id)
    }
}

fn round_half(value: f32) -> f32 {
    (value * 2.0).round() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(config: CityConfig) -> City {
        CityBuilder::new(config).build(ResourceCache::new()).unwrap()
    }

    #[test]
    fn default_city_has_every_part() {
        let city = build(CityConfig::default());
        let counts = city.count_by_kind();
        assert_eq!(counts[&EntityKind::Main], 1);
        assert_eq!(counts[&EntityKind::Fountain], 1);
        assert!(counts[&EntityKind::Residential] > 20);
        assert!(counts[&EntityKind::Tree] > 4);
        assert_eq!(city.visibility().always().count(), 4);
        assert_eq!(city.visibility().len(), city.entity_count());
        assert!(city.scene().lights().count() > 2);
    }

    #[test]
    fn same_config_same_city() {
        let a = build(CityConfig::default());
        let b = build(CityConfig::default());
        let positions = |c: &City| c.entities().map(|e| (e.kind(), e.spec().position)).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));

        let c = build(CityConfig {
            seed: 1,
            ..CityConfig::default()
        });
        assert_ne!(positions(&a), positions(&c));
    }

    #[test]
    fn entity_ids_follow_traversal_order() {
        let city = build(CityConfig::default());
        let order = city.scene().entity_order();
        let ids: Vec<_> = city.entities().map(Entity::id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn residential_stays_off_roads_and_landmarks() {
        let config = CityConfig::default();
        let city = build(config.clone());
        let landmark_rects: Vec<Rect> = config.landmarks.iter().map(|l| l.to_spec(0).footprint()).collect();
        for e in city.entities().filter(|e| e.kind() == EntityKind::Residential) {
            let p = e.spec().position;
            assert!(p.x.abs() > config.road_width * 0.5 && p.y.abs() > config.road_width * 0.5);
            for rect in &landmark_rects {
                assert!(!rect.contains(p));
            }
        }
    }

    #[test]
    fn residential_footprints_do_not_overlap() {
        for seed in 0..5 {
            let city = build(CityConfig {
                seed,
                ..CityConfig::default()
            });
            let rects: Vec<Rect> = city
                .entities()
                .filter(|e| e.kind() == EntityKind::Residential)
                .map(|e| e.spec().footprint())
                .collect();
            assert!(rects.len() > 20);
            for (i, a) in rects.iter().enumerate() {
                for b in &rects[i + 1..] {
                    let overlap = a.min.x < b.max.x && b.min.x < a.max.x && a.min.y < b.max.y && b.min.y < a.max.y;
                    assert!(!overlap, "seed {seed}: {a:?} overlaps {b:?}");
                }
            }
        }
    }

    #[test]
    fn entity_nodes_leave_the_transform_to_the_entity() {
        let city = build(CityConfig::default());
        let mut seen = 0;
        for id in city.scene().traverse() {
            let Some(node) = city.scene().get(id) else { continue };
            if let NodeContent::Entity(_) = node.content {
                assert_eq!(node.transform, Transform::default());
                seen += 1;
            }
        }
        assert_eq!(seen, city.entity_count());
    }

    #[test]
    fn roughly_seventy_percent_of_houses_are_roofed() {
        let city = build(CityConfig {
            residential: crate::config::ResidentialConfig {
                count: 150,
                ..Default::default()
            },
            ..CityConfig::default()
        });
        let houses: Vec<_> = city.entities().filter(|e| e.kind() == EntityKind::Residential).collect();
        let roofed = houses.iter().filter(|e| e.spec().roofed).count() as f32;
        let ratio = roofed / houses.len() as f32;
        assert!((0.55..0.85).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn oversized_request_returns_what_fits() {
        let mut config = CityConfig::default();
        config.residential.count = 10_000;
        let city = build(config);
        let houses = city.count_by_kind()[&EntityKind::Residential];
        assert!(houses < 10_000 && houses > 0);
    }

    #[test]
    fn cache_shares_resources_across_entities() {
        let city = build(CityConfig::default());
        assert!(city.cache().stats().hits > city.entity_count());
        assert!(city.cache().geometry_count() < city.entity_count() * 4);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = CityConfig::default();
        config.residential.palette.clear();
        let err = CityBuilder::new(config).build(ResourceCache::new()).unwrap_err();
        assert!(matches!(err, BuildError::Config(ConfigError::Invalid(_))));
    }
}
