use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::Rect;
use crate::types::{Color, InfoRecord};

/// Closed set of things the city knows how to build.
///
/// Parsing from text never fails: unknown tags become [`EntityKind::Residential`],
/// the standard building, so a bad config entry still yields a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Main,
    ProviderA,
    ProviderB,
    ProviderC,
    Residential,
    Tree,
    Streetlight,
    Bench,
    Fountain,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Main,
        EntityKind::ProviderA,
        EntityKind::ProviderB,
        EntityKind::ProviderC,
        EntityKind::Residential,
        EntityKind::Tree,
        EntityKind::Streetlight,
        EntityKind::Bench,
        EntityKind::Fountain,
    ];

    /// Strict parse; `None` for anything unrecognized.
    pub fn parse(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let kind = match normalized.as_str() {
            "main" => Self::Main,
            "provider-a" => Self::ProviderA,
            "provider-b" => Self::ProviderB,
            "provider-c" => Self::ProviderC,
            "residential" | "standard" | "standard-residential" => Self::Residential,
            "tree" => Self::Tree,
            "streetlight" | "street-light" => Self::Streetlight,
            "bench" => Self::Bench,
            "fountain" => Self::Fountain,
            _ => return None,
        };
        Some(kind)
    }

    /// Lenient parse used at system boundaries (config files, deserialized specs).
    pub fn from_tag(tag: &str) -> Self {
        match Self::parse(tag) {
            Some(kind) => kind,
            None => {
                tracing::warn!(tag, "unknown entity kind, using residential");
                Self::Residential
            }
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ProviderA => "provider-a",
            Self::ProviderB => "provider-b",
            Self::ProviderC => "provider-c",
            Self::Residential => "residential",
            Self::Tree => "tree",
            Self::Streetlight => "streetlight",
            Self::Bench => "bench",
            Self::Fountain => "fountain",
        }
    }

    /// Landmarks are always updated regardless of camera position.
    pub fn is_landmark(self) -> bool {
        matches!(
            self,
            Self::Main | Self::ProviderA | Self::ProviderB | Self::ProviderC
        )
    }

    pub fn is_building(self) -> bool {
        self.is_landmark() || self == Self::Residential
    }

    pub fn is_prop(self) -> bool {
        !self.is_building()
    }
}

impl From<String> for EntityKind {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.tag().to_string()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.tag())
    }
}

/// Immutable description of one entity to build.
///
/// `position` is the ground-plane (x, z) of the footprint center; the vertical
/// placement is derived from the ground height when the entity is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub kind: EntityKind,
    pub position: Vec2,
    /// Width (x), height (y), depth (z).
    pub dimensions: Vec3,
    pub color: Color,
    pub cast_shadow: bool,
    #[serde(default)]
    pub texture: Option<String>,
    #[serde(default)]
    pub info: Option<InfoRecord>,
    /// Only meaningful for residential buildings.
    #[serde(default)]
    pub roofed: bool,
    /// Seed for per-entity visual variety (window gaps, tint).
    #[serde(default)]
    pub seed: u64,
}

impl PlacementSpec {
    pub fn new(kind: EntityKind, position: Vec2, dimensions: Vec3) -> Self {
        Self {
            kind,
            position,
            dimensions,
            color: Color::WHITE,
            cast_shadow: true,
            texture: None,
            info: None,
            roofed: false,
            seed: 0,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_info(mut self, info: InfoRecord) -> Self {
        self.info = Some(info);
        self
    }

    pub fn with_texture(mut self, path: impl Into<String>) -> Self {
        self.texture = Some(path.into());
        self
    }

    pub fn with_roof(mut self, roofed: bool) -> Self {
        self.roofed = roofed;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shadow(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }

    /// Ground-level world position of the footprint center.
    pub fn world_position(&self, ground_y: f32) -> Vec3 {
        Vec3::new(self.position.x, ground_y, self.position.y)
    }

    /// Ground footprint as an axis-aligned rectangle.
    pub fn footprint(&self) -> Rect {
        Rect::from_center_size(
            self.position,
            Vec2::new(self.dimensions.x, self.dimensions.z),
        )
    }
}
