use serde::{Deserialize, Serialize};
use skillcity_assets::{GeometryHandle, MaterialHandle};
use skillcity_common::{Color, Transform};

/// What a visual part is for. Used to find parts that behave specially
/// (billboards, textured logos, light anchors) and for debugging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartRole {
    Body,
    Roof,
    Accent,
    Glass,
    Logo,
    Door,
    Trunk,
    Foliage,
    Pole,
    Lamp,
    Seat,
    Water,
}

/// Emissive glow applied on top of a part's material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glow {
    pub color: Color,
    pub intensity: f32,
}

impl Glow {
    pub const HIGHLIGHT: Glow = Glow {
        color: Color::rgb(0.3, 0.55, 1.0),
        intensity: 0.6,
    };
}

/// One child of an entity's root node. The geometry and material belong to
/// the cache; the part only refers to them.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualPart {
    pub name: &'static str,
    pub role: PartRole,
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
    /// Offset relative to the entity root.
    pub local: Transform,
    pub cast_shadow: bool,
    /// Per-part override; the shared material is never changed.
    pub glow: Option<Glow>,
}

impl VisualPart {
    pub fn new(
        name: &'static str,
        role: PartRole,
        geometry: GeometryHandle,
        material: MaterialHandle,
        local: Transform,
    ) -> Self {
        Self {
            name,
            role,
            geometry,
            material,
            local,
            cast_shadow: true,
            glow: None,
        }
    }

    pub fn without_shadow(mut self) -> Self {
        self.cast_shadow = false;
        self
    }
}

/// Many copies of one geometry/material pair, drawn in a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedBatch {
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
    /// Instance transforms relative to the owning node.
    pub instances: Vec<Transform>,
}

impl InstancedBatch {
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
