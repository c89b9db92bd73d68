use std::collections::{BTreeMap, BTreeSet, HashMap};

use glam::Vec3;
use skillcity_assets::{
    AssetLoader, LoadEvent, LoadQueue, LoadRequest, LoadTicket, LoadedAsset, ResourceCache,
};
use skillcity_common::{Aabb, EntityId, EntityKind, Ray};
use skillcity_entity::Entity;

use crate::scene::SceneGraph;

/// Entities updated every frame versus those gated by distance and frustum.
/// Fixed when the city is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilitySet {
    always: BTreeSet<EntityId>,
    conditional: BTreeSet<EntityId>,
}

impl VisibilitySet {
    pub fn insert_always(&mut self, id: EntityId) {
        self.conditional.remove(&id);
        self.always.insert(id);
    }

    pub fn insert_conditional(&mut self, id: EntityId) {
        if !self.always.contains(&id) {
            self.conditional.insert(id);
        }
    }

    pub fn is_always(&self, id: EntityId) -> bool {
        self.always.contains(&id)
    }

    pub fn always(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.always.iter().copied()
    }

    pub fn conditional(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.conditional.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.always.len() + self.conditional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        self.always.clear();
        self.conditional.clear();
    }
}

/// The assembled city: owns every entity, the resource cache and the scene
/// graph.
///
/// Entities are stored in an id-keyed arena; ids are assigned in scene
/// traversal order, so iterating the arena visits entities in that order.
#[derive(Debug)]
pub struct City {
    pub(crate) cache: ResourceCache,
    pub(crate) entities: BTreeMap<EntityId, Entity>,
    pub(crate) scene: SceneGraph,
    pub(crate) visibility: VisibilitySet,
    pending_textures: HashMap<LoadTicket, EntityId>,
    disposed: bool,
}

impl City {
    pub(crate) fn new(cache: ResourceCache) -> Self {
        Self {
            cache,
            entities: BTreeMap::new(),
            scene: SceneGraph::new(),
            visibility: VisibilitySet::default(),
            pending_textures: HashMap::new(),
            disposed: false,
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// For resources owned outside the entity arena, such as the player
    /// visual. They are released with everything else on dispose.
    pub fn cache_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn visibility(&self) -> &VisibilitySet {
        &self.visibility
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// All entities in traversal order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn count_by_kind(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        for entity in self.entities.values() {
            *counts.entry(entity.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Nearest entity whose bounds the ray hits. Equal distances resolve to
    /// the entity that comes first in traversal order.
    pub fn pick(&self, ray: &Ray) -> Option<EntityId> {
        let mut best: Option<(f32, EntityId)> = None;
        for entity in self.entities.values().filter(|e| e.is_alive()) {
            if let Some(t) = entity.bounds().intersects_ray(ray) {
                if best.is_none_or(|(best_t, _)| t < best_t) {
                    best = Some((t, entity.id()));
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Closest entity with an info record whose bounds lie within `radius`
    /// of `point` on the ground plane.
    pub fn nearest_info(&self, point: Vec3, radius: f32) -> Option<EntityId> {
        let mut best: Option<(f32, EntityId)> = None;
        for entity in self.entities.values().filter(|e| e.is_alive() && e.info().is_some()) {
            let distance = entity.bounds().ground_distance(point);
            if distance <= radius && best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, entity.id()));
            }
        }
        best.map(|(_, id)| id)
    }

    /// Collision boxes of every live entity.
    pub fn colliders(&self) -> Vec<Aabb> {
        self.entities
            .values()
            .filter(|e| e.is_alive())
            .map(Entity::collider)
            .collect()
    }

    /// Request logo textures for every entity that references one. Returns
    /// how many loads were started.
    pub fn request_textures(&mut self, queue: &mut LoadQueue, loader: &dyn AssetLoader) -> usize {
        if self.disposed {
            return 0;
        }
        let wanted: Vec<(EntityId, String)> = self
            .entities
            .values()
            .filter_map(|e| Some((e.id(), e.spec().texture.clone()?)))
            .collect();
        let mut started = 0;
        for (id, path) in wanted {
            if let Some(ticket) = queue.request(loader, LoadRequest::Texture { path }) {
                self.pending_textures.insert(ticket, id);
                started += 1;
            }
        }
        started
    }

    pub fn pending_textures(&self) -> usize {
        self.pending_textures.len()
    }

    /// Apply a drained load completion. Returns `false` when the event is not
    /// a texture this city asked for, leaving it to the caller.
    ///
    /// Completions for a disposed city or entity are dropped. A failed load
    /// leaves the untextured logo in place.
    pub fn apply_load_event(&mut self, event: &LoadEvent) -> bool {
        let Some(id) = self.pending_textures.remove(&event.ticket) else {
            return false;
        };
        if self.disposed {
            return true;
        }
        let Some(entity) = self.entities.get_mut(&id) else {
            return true;
        };
        match &event.outcome {
            Ok(LoadedAsset::Texture(texture)) => {
                if let Err(e) = entity.apply_texture(&mut self.cache, texture) {
                    tracing::warn!(%id, "could not apply texture: {e}");
                }
            }
            Ok(LoadedAsset::Model(_)) => {
                tracing::warn!(%id, path = event.request.path(), "expected a texture, got a model");
            }
            Err(e) => {
                tracing::warn!(%id, "texture load failed, keeping untextured logo: {e}");
            }
        }
        true
    }

    /// Tear the city down: entities first, then the cache. Safe to call more
    /// than once; only the first call does anything.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        let entities = self
            .entities
            .values_mut()
            .map(Entity::dispose)
            .filter(|released| *released)
            .count();
        self.pending_textures.clear();
        self.visibility.clear();
        self.scene.clear();
        let released = self.cache.dispose_all();
        tracing::info!(entities, released, "city disposed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use skillcity_assets::{AssetLoadError, LoadReply, TextureAsset};
    use skillcity_common::{InfoRecord, PlacementSpec, Transform};

    use crate::scene::NodeContent;

    fn city_with(specs: Vec<PlacementSpec>) -> City {
        let mut city = City::new(ResourceCache::new());
        for (i, spec) in specs.into_iter().enumerate() {
            let id = EntityId(i as u32);
            let entity = Entity::build(id, spec, &mut city.cache).unwrap();
            city.scene.add(
                SceneGraph::ROOT,
                entity.kind().tag(),
                Transform::default(),
                NodeContent::Entity(id),
            );
            city.entities.insert(id, entity);
            city.visibility.insert_conditional(id);
        }
        city
    }

    fn building(x: f32, z: f32) -> PlacementSpec {
        PlacementSpec::new(EntityKind::Residential, Vec2::new(x, z), Vec3::new(6.0, 10.0, 6.0))
    }

    struct Immediate(Result<(), AssetLoadError>);

    impl AssetLoader for Immediate {
        fn start(&self, reply: LoadReply) {
            let outcome = match &self.0 {
                Ok(()) => Ok(LoadedAsset::Texture(TextureAsset {
                    path: reply.request().path().to_string(),
                    width: 8,
                    height: 8,
                })),
                Err(e) => Err(e.clone()),
            };
            reply.complete(outcome);
        }
    }

    #[test]
    fn pick_returns_nearest_hit() {
        let city = city_with(vec![building(0.0, -40.0), building(0.0, -20.0)]);
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Z);
        assert_eq!(city.pick(&ray), Some(EntityId(1)));
        let miss = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::Z);
        assert_eq!(city.pick(&miss), None);
    }

    #[test]
    fn pick_ties_go_to_traversal_order() {
        let city = city_with(vec![building(0.0, -20.0), building(0.0, -20.0)]);
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Z);
        assert_eq!(city.pick(&ray), Some(EntityId(0)));
    }

    #[test]
    fn nearest_info_respects_radius() {
        let spec = building(10.0, 0.0).with_info(InfoRecord::new("Shop", ""));
        let city = city_with(vec![spec, building(2.0, 0.0)]);
        assert_eq!(city.nearest_info(Vec3::ZERO, 8.0), Some(EntityId(0)));
        assert_eq!(city.nearest_info(Vec3::ZERO, 5.0), None);
    }

    #[test]
    fn texture_events_are_applied_and_failures_tolerated() {
        let textured = building(0.0, 0.0).with_texture("logo.png");
        let mut city = city_with(vec![textured.clone(), textured]);
        let mut queue = LoadQueue::new();
        assert_eq!(city.request_textures(&mut queue, &Immediate(Ok(()))), 2);
        for event in queue.drain() {
            assert!(city.apply_load_event(&event));
        }
        assert_eq!(city.pending_textures(), 0);

        let mut failing = city_with(vec![building(0.0, 0.0).with_texture("missing.png")]);
        let err = AssetLoadError::Io {
            path: "missing.png".into(),
            reason: "not found".into(),
        };
        failing.request_textures(&mut queue, &Immediate(Err(err)));
        for event in queue.drain() {
            assert!(failing.apply_load_event(&event));
        }
        assert!(failing.entity(EntityId(0)).unwrap().is_alive());
    }

    #[test]
    fn late_texture_after_dispose_is_dropped() {
        let mut city = city_with(vec![building(0.0, 0.0).with_texture("logo.png")]);
        let mut queue = LoadQueue::new();
        city.request_textures(&mut queue, &Immediate(Ok(())));
        city.dispose();
        // The queue is still open here; the city must guard on its own.
        for event in queue.drain() {
            city.apply_load_event(&event);
        }
        assert_eq!(city.cache().geometry_count(), 0);
        assert!(city.entities().all(|e| !e.is_alive()));
    }

    #[test]
    fn dispose_twice_is_harmless() {
        let mut city = city_with(vec![building(0.0, 0.0), building(20.0, 0.0)]);
        assert!(city.dispose());
        assert!(!city.dispose());
        assert!(city.is_disposed());
        assert!(city.colliders().is_empty());
        assert!(city.cache().stats().released > 0);
        let ray = Ray::new(Vec3::new(0.0, 5.0, 10.0), Vec3::NEG_Z);
        assert_eq!(city.pick(&ray), None);
    }

    #[test]
    fn visibility_set_keeps_partition() {
        let mut set = VisibilitySet::default();
        set.insert_conditional(EntityId(1));
        set.insert_always(EntityId(1));
        set.insert_conditional(EntityId(1));
        assert!(set.is_always(EntityId(1)));
        assert_eq!(set.conditional().count(), 0);
        assert_eq!(set.len(), 1);
    }
}
