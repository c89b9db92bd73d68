use std::collections::HashMap;

use glam::{Mat4, Vec3};
use skillcity_assets::{GeometryHandle, MaterialHandle, ResourceCache};
use skillcity_common::{Color, EntityId, Transform};
use skillcity_entity::{Entity, Glow, InstancedBatch};
use skillcity_kernel::{City, Light, NodeContent};

/// One instance of a batch: its world matrix and resolved colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstance {
    pub model: Mat4,
    /// Base color with opacity in `a`.
    pub color: [f32; 4],
    /// Emissive color premultiplied by intensity, glow included.
    pub emissive: [f32; 3],
}

/// Every instance sharing one (geometry, material) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
    /// Geometry kind tag, for debug output.
    pub shape: &'static str,
    pub cast_shadow: bool,
    pub instances: Vec<DrawInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInstance {
    pub light: Light,
    pub position: Vec3,
}

/// Flattened, renderer-facing snapshot of a city's scene graph.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    batches: Vec<DrawBatch>,
    index: HashMap<(GeometryHandle, MaterialHandle), usize>,
    lights: Vec<LightInstance>,
    entities: Vec<EntityId>,
    skipped: usize,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the scene graph in traversal order and collect every mesh,
    /// instanced batch, entity part and light.
    pub fn from_city(city: &City) -> Self {
        let mut list = Self::new();
        let scene = city.scene();
        let cache = city.cache();
        for id in scene.traverse() {
            let Some(node) = scene.get(id) else {
                continue;
            };
            match &node.content {
                NodeContent::Empty => {}
                NodeContent::Mesh {
                    geometry,
                    material,
                    cast_shadow,
                } => {
                    list.push(cache, *geometry, *material, scene.world_matrix(id), *cast_shadow, None);
                }
                NodeContent::Batch(batch) => {
                    list.push_batch(cache, batch, scene.world_matrix(id));
                }
                NodeContent::Light(light) => list.lights.push(LightInstance {
                    light: *light,
                    position: scene.world_matrix(id).transform_point3(Vec3::ZERO),
                }),
                NodeContent::Entity(entity_id) => {
                    let parent = node
                        .parent
                        .map(|p| scene.world_matrix(p))
                        .unwrap_or(Mat4::IDENTITY);
                    if let Some(entity) = city.entity(*entity_id).filter(|e| e.is_alive()) {
                        list.push_entity(cache, entity, parent);
                    }
                }
            }
        }
        if list.skipped > 0 {
            tracing::debug!(skipped = list.skipped, "draw list skipped stale resources");
        }
        list
    }

    fn push_entity(&mut self, cache: &ResourceCache, entity: &Entity, parent: Mat4) {
        let root = parent * entity.world_matrix();
        for part in entity.parts() {
            self.push(
                cache,
                part.geometry,
                part.material,
                root * part.local.matrix(),
                part.cast_shadow,
                part.glow,
            );
        }
        if let Some(windows) = entity.windows() {
            self.push_batch(cache, windows, root);
        }
        self.entities.push(entity.id());
    }

    fn push_batch(&mut self, cache: &ResourceCache, batch: &InstancedBatch, parent: Mat4) {
        for instance in &batch.instances {
            self.push(cache, batch.geometry, batch.material, parent * instance.matrix(), false, None);
        }
    }

    /// Add a mesh that is not part of the scene graph, e.g. the player.
    pub fn push_mesh(
        &mut self,
        cache: &ResourceCache,
        geometry: GeometryHandle,
        material: MaterialHandle,
        transform: &Transform,
    ) {
        self.push(cache, geometry, material, transform.matrix(), true, None);
    }

    fn push(
        &mut self,
        cache: &ResourceCache,
        geometry: GeometryHandle,
        material: MaterialHandle,
        model: Mat4,
        cast_shadow: bool,
        glow: Option<Glow>,
    ) {
        let (Ok(geo), Ok(mat)) = (cache.get_geometry(geometry), cache.get_material(material)) else {
            self.skipped += 1;
            return;
        };
        let params = &mat.params;
        let [r, g, b] = params.color.to_array();
        let mut emissive = params.emissive.scaled(params.emissive_intensity).to_array();
        if let Some(glow) = glow {
            let extra = glow.color.scaled(glow.intensity).to_array();
            for (e, x) in emissive.iter_mut().zip(extra) {
                *e += x;
            }
        }
        let instance = DrawInstance {
            model,
            color: [r, g, b, params.opacity],
            emissive,
        };
        let slot = *self.index.entry((geometry, material)).or_insert_with(|| {
            self.batches.push(DrawBatch {
                geometry,
                material,
                shape: geo.kind.tag(),
                cast_shadow: false,
                instances: Vec::new(),
            });
            self.batches.len() - 1
        });
        let batch = &mut self.batches[slot];
        batch.cast_shadow |= cast_shadow;
        batch.instances.push(instance);
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    pub fn lights(&self) -> &[LightInstance] {
        &self.lights
    }

    /// Entities drawn, in traversal order.
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(|b| b.instances.len()).sum()
    }

    /// Draws dropped because their handles no longer resolve.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Ambient light color scaled by intensity, summed over ambient lights.
    pub fn ambient(&self) -> Color {
        self.lights.iter().fold(Color::BLACK, |acc, l| match l.light {
            Light::Ambient { color, intensity } => {
                let c = color.scaled(intensity);
                Color::rgb(acc.r + c.r, acc.g + c.g, acc.b + c.b)
            }
            _ => acc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillcity_kernel::{CityBuilder, CityConfig};

    fn city() -> City {
        let mut config = CityConfig::default();
        config.residential.count = 20;
        CityBuilder::new(config).build(ResourceCache::new()).unwrap()
    }

    #[test]
    fn every_entity_is_drawn_in_traversal_order() {
        let city = city();
        let list = DrawList::from_city(&city);
        assert_eq!(list.entities(), city.scene().entity_order().as_slice());
        assert_eq!(list.skipped(), 0);
    }

    #[test]
    fn batches_are_unique_per_resource_pair() {
        let list = DrawList::from_city(&city());
        let mut pairs: Vec<_> = list.batches().iter().map(|b| (b.geometry, b.material)).collect();
        let total = pairs.len();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), total);
        // Shared geometry makes the instance count exceed the batch count.
        assert!(list.instance_count() > list.batches().len());
    }

    #[test]
    fn lights_are_collected() {
        let list = DrawList::from_city(&city());
        assert!(list.lights().iter().any(|l| matches!(l.light, Light::Directional { .. })));
        assert!(list.ambient().r > 0.0);
    }

    #[test]
    fn highlight_glow_reaches_the_instances() {
        let mut city = city();
        let id = city.visibility().always().next().unwrap();
        let glowing = |list: &DrawList| {
            list.batches()
                .iter()
                .flat_map(|b| &b.instances)
                .filter(|i| i.emissive[2] >= Glow::HIGHLIGHT.color.b * Glow::HIGHLIGHT.intensity)
                .count()
        };
        let before = glowing(&DrawList::from_city(&city));
        city.entity_mut(id).unwrap().highlight();
        let after = glowing(&DrawList::from_city(&city));
        assert!(after > before);
    }

    #[test]
    fn disposed_city_draws_nothing() {
        let mut city = city();
        city.dispose();
        let list = DrawList::from_city(&city);
        assert!(list.is_empty());
        assert!(list.entities().is_empty());
    }

    #[test]
    fn extra_meshes_can_be_pushed() {
        let mut city = city();
        let geometry = city
            .cache_mut()
            .geometry(skillcity_assets::GeometryKind::Capsule, &[0.4, 1.0])
            .unwrap();
        let material = city
            .cache_mut()
            .material(
                skillcity_assets::MaterialKind::Standard,
                &skillcity_assets::MaterialParams::colored(Color::WHITE),
            )
            .unwrap();
        let mut list = DrawList::from_city(&city);
        let before = list.instance_count();
        list.push_mesh(city.cache(), geometry, material, &Transform::default());
        assert_eq!(list.instance_count(), before + 1);
    }
}
