use std::collections::BTreeMap;

use glam::Vec3;
use skillcity_assets::CacheStats;
use skillcity_common::{EntityId, EntityKind};
use skillcity_kernel::City;
use skillcity_visibility::FrameStats;

/// City inspector for developer tooling.
///
/// Read-only queries used by the CLI report and the desktop debug panel.
pub struct CityInspector;

impl CityInspector {
    /// Produce a summary of the city. `last_frame` is the scheduler's most
    /// recent frame, when one has run.
    pub fn summary(city: &City, last_frame: Option<FrameStats>) -> CitySummary {
        let visibility = city.visibility();
        CitySummary {
            entity_count: city.entity_count(),
            by_kind: city.count_by_kind(),
            always_active: visibility.always().count(),
            conditional: visibility.conditional().count(),
            scene_nodes: city.scene().len(),
            geometries: city.cache().geometry_count(),
            materials: city.cache().material_count(),
            cache: city.cache().stats(),
            pending_textures: city.pending_textures(),
            disposed: city.is_disposed(),
            last_frame,
        }
    }

    pub fn inspect_entity(city: &City, id: EntityId) -> Option<EntitySummary> {
        city.entity(id).map(|entity| {
            let bounds = entity.bounds();
            EntitySummary {
                id,
                kind: entity.kind(),
                title: entity.info().map(|info| info.title.clone()),
                position: entity.root().position,
                bounds_min: bounds.min,
                bounds_max: bounds.max,
                parts: entity.parts().len(),
                windows: entity.windows().map_or(0, |w| w.len()),
                always_active: city.visibility().is_always(id),
                highlighted: entity.is_highlighted(),
                updates: entity.update_count(),
            }
        })
    }

    /// All entity ids in traversal order.
    pub fn list_entities(city: &City) -> Vec<EntityId> {
        city.entities().map(|e| e.id()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CitySummary {
    pub entity_count: usize,
    pub by_kind: BTreeMap<EntityKind, usize>,
    pub always_active: usize,
    pub conditional: usize,
    pub scene_nodes: usize,
    pub geometries: usize,
    pub materials: usize,
    pub cache: CacheStats,
    pub pending_textures: usize,
    pub disposed: bool,
    pub last_frame: Option<FrameStats>,
}

impl std::fmt::Display for CitySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "City: entities={} (always={} conditional={}) nodes={}{}",
            self.entity_count,
            self.always_active,
            self.conditional,
            self.scene_nodes,
            if self.disposed { " [disposed]" } else { "" }
        )?;
        for (kind, count) in &self.by_kind {
            writeln!(f, "  {kind:<22} {count}")?;
        }
        writeln!(
            f,
            "Cache: geometries={} materials={} hits={} pending_textures={}",
            self.geometries, self.materials, self.cache.hits, self.pending_textures
        )?;
        if let Some(frame) = &self.last_frame {
            writeln!(f, "Last frame: {frame}")?;
        }
        Ok(())
    }
}

/// Detailed info about a single entity.
#[derive(Debug, Clone)]
pub struct EntitySummary {
    pub id: EntityId,
    pub kind: EntityKind,
    pub title: Option<String>,
    pub position: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub parts: usize,
    pub windows: usize,
    pub always_active: bool,
    pub highlighted: bool,
    pub updates: u64,
}

impl std::fmt::Display for EntitySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entity {} {} pos=({:.2}, {:.2}, {:.2}) parts={} windows={} updates={}",
            self.id,
            self.kind,
            self.position.x,
            self.position.y,
            self.position.z,
            self.parts,
            self.windows,
            self.updates,
        )?;
        if let Some(title) = &self.title {
            write!(f, " \"{title}\"")?;
        }
        if self.always_active {
            write!(f, " [always]")?;
        }
        Ok(())
    }
}
