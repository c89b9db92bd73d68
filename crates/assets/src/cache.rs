use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use skillcity_common::Color;
use std::collections::HashMap;

use crate::mesh::{self, MeshData};

/// Content-addressed key derived from a resource's kind and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey(pub u64);

impl ResourceKey {
    fn digest(domain: &str, kind: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain.as_bytes());
        hasher.update([0u8]);
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        ResourceKey(u64::from_le_bytes(bytes))
    }
}

/// Handle to a cached geometry. Equal handles refer to the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryHandle {
    slot: u32,
    epoch: u32,
}

impl GeometryHandle {
    pub fn slot(self) -> u32 {
        self.slot
    }
}

/// Handle to a cached material. Equal handles refer to the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle {
    slot: u32,
    epoch: u32,
}

impl MaterialHandle {
    pub fn slot(self) -> u32 {
        self.slot
    }
}

/// Errors from cache operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResourceError {
    #[error("unknown resource kind `{0}`")]
    UnknownResourceKind(String),
    #[error("invalid parameters for {kind}: {reason}")]
    InvalidParameters { kind: &'static str, reason: String },
    #[error("handle was issued before the cache was disposed")]
    StaleHandle,
    #[error("resource key {0:?} collides with a different resource")]
    KeyCollision(ResourceKey),
}

/// Primitive shapes and the parameters each one takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryKind {
    /// width, height, depth
    Box,
    /// radius_top, radius_bottom, height, radial_segments
    Cylinder,
    /// radius, width_segments, height_segments
    Sphere,
    /// radius, height, radial_segments
    Cone,
    /// width, depth
    Plane,
    /// radius, length
    Capsule,
}

impl GeometryKind {
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "box" => Self::Box,
            "cylinder" => Self::Cylinder,
            "sphere" => Self::Sphere,
            "cone" => Self::Cone,
            "plane" => Self::Plane,
            "capsule" => Self::Capsule,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Cylinder => "cylinder",
            Self::Sphere => "sphere",
            Self::Cone => "cone",
            Self::Plane => "plane",
            Self::Capsule => "capsule",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Box | Self::Sphere | Self::Cone => 3,
            Self::Cylinder => 4,
            Self::Plane | Self::Capsule => 2,
        }
    }

    fn build(self, p: &[f32]) -> MeshData {
        match self {
            Self::Box => mesh::box_mesh(p[0], p[1], p[2]),
            Self::Cylinder => mesh::cylinder_mesh(p[0], p[1], p[2], p[3] as u32),
            Self::Sphere => mesh::sphere_mesh(p[0], p[1] as u32, p[2] as u32),
            Self::Cone => mesh::cone_mesh(p[0], p[1], p[2] as u32),
            Self::Plane => mesh::plane_mesh(p[0], p[1]),
            Self::Capsule => mesh::capsule_mesh(p[0], p[1]),
        }
    }
}

/// Shading model of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Lit, physically based.
    Standard,
    /// Unlit flat color.
    Basic,
    /// Lit and blended with `opacity`.
    Glass,
}

impl MaterialKind {
    pub fn parse(tag: &str) -> Option<Self> {
        Some(match tag {
            "standard" => Self::Standard,
            "basic" => Self::Basic,
            "glass" => Self::Glass,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Basic => "basic",
            Self::Glass => "glass",
        }
    }
}

/// Full parameter set of a material; the serialized form is part of its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams {
    pub color: Color,
    pub emissive: Color,
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub opacity: f32,
    pub texture: Option<String>,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            emissive: Color::BLACK,
            emissive_intensity: 0.0,
            roughness: 0.7,
            metalness: 0.1,
            opacity: 1.0,
            texture: None,
        }
    }
}

impl MaterialParams {
    pub fn colored(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn with_emissive(mut self, emissive: Color, intensity: f32) -> Self {
        self.emissive = emissive;
        self.emissive_intensity = intensity;
        self
    }

    pub fn with_surface(mut self, roughness: f32, metalness: f32) -> Self {
        self.roughness = roughness;
        self.metalness = metalness;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_texture(mut self, texture: impl Into<String>) -> Self {
        self.texture = Some(texture.into());
        self
    }
}

/// A geometry owned by the cache, with its generated mesh data.
#[derive(Debug, Clone)]
pub struct GeometryResource {
    pub key: ResourceKey,
    pub kind: GeometryKind,
    pub params: Vec<f32>,
    pub mesh: MeshData,
}

/// A material owned by the cache.
#[derive(Debug, Clone)]
pub struct MaterialResource {
    pub key: ResourceKey,
    pub kind: MaterialKind,
    pub params: MaterialParams,
}

/// Allocation and lookup counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub geometry_allocations: usize,
    pub material_allocations: usize,
    pub hits: usize,
    pub released: usize,
}

/// Deduplicating store for geometry and material resources.
///
/// Structurally equal requests return the same handle for the lifetime of the
/// cache. `dispose_all` releases everything once and invalidates every handle
/// issued so far; it is safe to call repeatedly.
#[derive(Debug, Default)]
pub struct ResourceCache {
    epoch: u32,
    geometries: Vec<GeometryResource>,
    geometry_index: HashMap<ResourceKey, u32>,
    materials: Vec<MaterialResource>,
    material_index: HashMap<ResourceKey, u32>,
    stats: CacheStats,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a geometry for a kind named by string (system boundary).
    pub fn geometry_named(&mut self, kind: &str, params: &[f32]) -> Result<GeometryHandle, ResourceError> {
        let kind = GeometryKind::parse(kind)
            .ok_or_else(|| ResourceError::UnknownResourceKind(kind.to_string()))?;
        self.geometry(kind, params)
    }

    /// Get or create a geometry. The first call for a key generates its mesh.
    pub fn geometry(&mut self, kind: GeometryKind, params: &[f32]) -> Result<GeometryHandle, ResourceError> {
        validate_geometry(kind, params)?;
        let payload: Vec<u8> = params.iter().flat_map(|p| p.to_bits().to_le_bytes()).collect();
        let key = ResourceKey::digest("geometry", kind.tag(), &payload);

        if let Some(&slot) = self.geometry_index.get(&key) {
            let existing = &self.geometries[slot as usize];
            if existing.kind != kind || existing.params != params {
                return Err(ResourceError::KeyCollision(key));
            }
            self.stats.hits += 1;
            return Ok(GeometryHandle { slot, epoch: self.epoch });
        }

        let mesh = kind.build(params);
        let slot = self.geometries.len() as u32;
        tracing::debug!(
            kind = kind.tag(),
            ?params,
            vertices = mesh.vertex_count(),
            "allocating geometry"
        );
        self.geometries.push(GeometryResource {
            key,
            kind,
            params: params.to_vec(),
            mesh,
        });
        self.geometry_index.insert(key, slot);
        self.stats.geometry_allocations += 1;
        Ok(GeometryHandle { slot, epoch: self.epoch })
    }

    /// Get or create a material for a kind named by string (system boundary).
    pub fn material_named(&mut self, kind: &str, params: &MaterialParams) -> Result<MaterialHandle, ResourceError> {
        let kind = MaterialKind::parse(kind)
            .ok_or_else(|| ResourceError::UnknownResourceKind(kind.to_string()))?;
        self.material(kind, params)
    }

    /// Get or create a material keyed by its kind and serialized parameters.
    pub fn material(&mut self, kind: MaterialKind, params: &MaterialParams) -> Result<MaterialHandle, ResourceError> {
        validate_material(params)?;
        let payload = serde_json::to_vec(params).map_err(|e| ResourceError::InvalidParameters {
            kind: kind.tag(),
            reason: e.to_string(),
        })?;
        let key = ResourceKey::digest("material", kind.tag(), &payload);

        if let Some(&slot) = self.material_index.get(&key) {
            let existing = &self.materials[slot as usize];
            if existing.kind != kind || existing.params != *params {
                return Err(ResourceError::KeyCollision(key));
            }
            self.stats.hits += 1;
            return Ok(MaterialHandle { slot, epoch: self.epoch });
        }

        let slot = self.materials.len() as u32;
        tracing::debug!(kind = kind.tag(), "allocating material");
        self.materials.push(MaterialResource {
            key,
            kind,
            params: params.clone(),
        });
        self.material_index.insert(key, slot);
        self.stats.material_allocations += 1;
        Ok(MaterialHandle { slot, epoch: self.epoch })
    }

    pub fn get_geometry(&self, handle: GeometryHandle) -> Result<&GeometryResource, ResourceError> {
        if handle.epoch != self.epoch {
            return Err(ResourceError::StaleHandle);
        }
        self.geometries
            .get(handle.slot as usize)
            .ok_or(ResourceError::StaleHandle)
    }

    pub fn get_material(&self, handle: MaterialHandle) -> Result<&MaterialResource, ResourceError> {
        if handle.epoch != self.epoch {
            return Err(ResourceError::StaleHandle);
        }
        self.materials
            .get(handle.slot as usize)
            .ok_or(ResourceError::StaleHandle)
    }

    pub fn is_live_geometry(&self, handle: GeometryHandle) -> bool {
        self.get_geometry(handle).is_ok()
    }

    /// All live geometries with their handles, in allocation order.
    pub fn geometries(&self) -> impl Iterator<Item = (GeometryHandle, &GeometryResource)> {
        let epoch = self.epoch;
        self.geometries
            .iter()
            .enumerate()
            .map(move |(i, g)| (GeometryHandle { slot: i as u32, epoch }, g))
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Release every resource exactly once. Returns how many were released by
    /// this call; a second call releases nothing.
    pub fn dispose_all(&mut self) -> usize {
        let released = self.geometries.len() + self.materials.len();
        if released == 0 {
            return 0;
        }
        self.geometries.clear();
        self.geometry_index.clear();
        self.materials.clear();
        self.material_index.clear();
        self.epoch = self.epoch.wrapping_add(1);
        self.stats.released += released;
        tracing::info!(released, "resource cache disposed");
        released
    }
}

fn validate_geometry(kind: GeometryKind, params: &[f32]) -> Result<(), ResourceError> {
    if params.len() != kind.arity() {
        return Err(ResourceError::InvalidParameters {
            kind: kind.tag(),
            reason: format!("expected {} parameters, got {}", kind.arity(), params.len()),
        });
    }
    if let Some(bad) = params.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(ResourceError::InvalidParameters {
            kind: kind.tag(),
            reason: format!("parameter {bad} must be finite and non-negative"),
        });
    }
    Ok(())
}

fn validate_material(params: &MaterialParams) -> Result<(), ResourceError> {
    let scalars = [
        params.emissive_intensity,
        params.roughness,
        params.metalness,
        params.opacity,
    ];
    if scalars.iter().any(|s| !s.is_finite()) {
        return Err(ResourceError::InvalidParameters {
            kind: "material",
            reason: "scalar parameters must be finite".into(),
        });
    }
    Ok(())
}
