//! City configuration, loaded from YAML. Every field has a default, so a
//! config file only needs the values it changes.

use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use skillcity_common::{Color, EntityKind, InfoRecord, PlacementSpec};
use skillcity_layout::{GridPlacer, MAX_CELLS_PER_AXIS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// One hand-placed landmark. `kind` is free text; unknown kinds build the
/// standard residential recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkConfig {
    pub kind: EntityKind,
    pub position: Vec2,
    pub dimensions: Vec3,
    pub color: Color,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub texture: Option<String>,
}

impl LandmarkConfig {
    pub fn to_spec(&self, seed: u64) -> PlacementSpec {
        let mut spec = PlacementSpec::new(self.kind, self.position, self.dimensions)
            .with_color(self.color)
            .with_info(InfoRecord::new(self.title.clone(), self.description.clone()))
            .with_seed(seed);
        if let Some(texture) = &self.texture {
            spec = spec.with_texture(texture.clone());
        }
        spec
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidentialConfig {
    pub count: usize,
    pub grid: GridPlacer,
    /// Footprint edge range (min, max).
    pub footprint: (f32, f32),
    /// Height range (min, max).
    pub height: (f32, f32),
    pub roof_probability: f64,
    /// Clearance kept between a building and any exclusion.
    pub clearance: f32,
    pub palette: Vec<Color>,
}

impl Default for ResidentialConfig {
    fn default() -> Self {
        Self {
            count: 60,
            grid: GridPlacer::default(),
            footprint: (6.0, 10.0),
            height: (8.0, 26.0),
            roof_probability: 0.7,
            clearance: 1.5,
            palette: vec![
                Color::from_hex(0xd9cbb0),
                Color::from_hex(0xc9a88a),
                Color::from_hex(0xa7b8c4),
                Color::from_hex(0xe4dccf),
                Color::from_hex(0xb9a08e),
            ],
        }
    }
}

/// Scatter settings for one kind of prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSet {
    pub count: usize,
    #[serde(default)]
    pub anchors: Vec<Vec2>,
    pub dimensions: Vec3,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropsConfig {
    pub trees: PropSet,
    pub streetlights: PropSet,
    pub benches: PropSet,
    pub fountain: bool,
    pub min_spacing: f32,
    /// Radius of the keep-out disk around the plaza center.
    pub center_exclusion: f32,
    /// Width of the keep-out band on each side of the main roads.
    pub road_band: f32,
}

impl Default for PropsConfig {
    fn default() -> Self {
        let along_roads = [-90.0f32, -60.0, 60.0, 90.0]
            .into_iter()
            .flat_map(|t| [Vec2::new(t, 7.5), Vec2::new(7.5, t)])
            .collect();
        Self {
            trees: PropSet {
                count: 40,
                anchors: vec![
                    Vec2::new(-20.0, 20.0),
                    Vec2::new(20.0, 20.0),
                    Vec2::new(-20.0, -20.0),
                    Vec2::new(20.0, -20.0),
                ],
                dimensions: Vec3::new(3.0, 6.0, 3.0),
                color: Color::from_hex(0x3f8f3a),
            },
            streetlights: PropSet {
                count: 16,
                anchors: along_roads,
                dimensions: Vec3::new(0.5, 5.0, 0.5),
                color: Color::from_hex(0x3a3f44),
            },
            benches: PropSet {
                count: 12,
                anchors: vec![Vec2::new(0.0, 16.0), Vec2::new(0.0, -16.0)],
                dimensions: Vec3::new(2.0, 1.0, 0.6),
                color: Color::from_hex(0x8a5a32),
            },
            fountain: true,
            min_spacing: 2.5,
            center_exclusion: 22.0,
            road_band: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient_color: Color,
    pub ambient_intensity: f32,
    pub sun_direction: Vec3,
    pub sun_color: Color,
    pub sun_intensity: f32,
    pub streetlight_color: Color,
    pub streetlight_intensity: f32,
    pub streetlight_range: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient_color: Color::from_hex(0xbfd4ff),
            ambient_intensity: 0.45,
            sun_direction: Vec3::new(-0.5, -1.0, -0.35),
            sun_color: Color::from_hex(0xfff1d6),
            sun_intensity: 1.1,
            streetlight_color: Color::from_hex(0xffd27a),
            streetlight_intensity: 0.8,
            streetlight_range: 14.0,
        }
    }
}

/// Everything needed to assemble a city deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityConfig {
    pub seed: u64,
    /// The ground covers `[-half_extent, half_extent]` on x and z.
    pub half_extent: f32,
    pub ground_color: Color,
    pub plaza_radius: f32,
    pub plaza_color: Color,
    pub road_width: f32,
    pub road_color: Color,
    /// Spacing of lane-marking dashes along each road.
    pub lane_dash_spacing: f32,
    pub landmarks: Vec<LandmarkConfig>,
    pub residential: ResidentialConfig,
    pub props: PropsConfig,
    pub lighting: LightingConfig,
}

impl Default for CityConfig {
    fn default() -> Self {
        let landmark = |kind, x, z, dims: Vec3, hex, title: &str, description: &str| LandmarkConfig {
            kind,
            position: Vec2::new(x, z),
            dimensions: dims,
            color: Color::from_hex(hex),
            title: title.to_string(),
            description: description.to_string(),
            texture: None,
        };
        Self {
            seed: 2024,
            half_extent: 120.0,
            ground_color: Color::from_hex(0x5c8a4e),
            plaza_radius: 18.0,
            plaza_color: Color::from_hex(0xcfc6b4),
            road_width: 10.0,
            road_color: Color::from_hex(0x33363a),
            lane_dash_spacing: 6.0,
            landmarks: vec![
                LandmarkConfig {
                    texture: Some("textures/logo-main.png".into()),
                    ..landmark(
                        EntityKind::Main,
                        -34.0,
                        -34.0,
                        Vec3::new(18.0, 46.0, 18.0),
                        0x2f6fde,
                        "Portfolio Hub",
                        "Projects, write-ups and contact details.",
                    )
                },
                landmark(
                    EntityKind::ProviderA,
                    34.0,
                    -34.0,
                    Vec3::new(14.0, 32.0, 14.0),
                    0xe07a2f,
                    "Cloud Platform A",
                    "Certifications and deployments on provider A.",
                ),
                landmark(
                    EntityKind::ProviderB,
                    -34.0,
                    34.0,
                    Vec3::new(14.0, 36.0, 14.0),
                    0x2fbf71,
                    "Cloud Platform B",
                    "Infrastructure-as-code work on provider B.",
                ),
                landmark(
                    EntityKind::ProviderC,
                    34.0,
                    34.0,
                    Vec3::new(16.0, 28.0, 16.0),
                    0x9b59d0,
                    "Cloud Platform C",
                    "Data pipelines built on provider C.",
                ),
            ],
            residential: ResidentialConfig::default(),
            props: PropsConfig::default(),
            lighting: LightingConfig::default(),
        }
    }
}

impl CityConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.half_extent > 0.0 && self.half_extent.is_finite()) {
            return Err(ConfigError::Invalid("half_extent must be positive".into()));
        }
        if !(self.road_width >= 0.0 && self.plaza_radius >= 0.0) {
            return Err(ConfigError::Invalid("road_width and plaza_radius must not be negative".into()));
        }
        let r = &self.residential;
        if !is_size_range(r.footprint) {
            return Err(ConfigError::Invalid("residential.footprint must be 0 < min <= max".into()));
        }
        if !is_size_range(r.height) {
            return Err(ConfigError::Invalid("residential.height must be 0 < min <= max".into()));
        }
        if !(r.clearance >= 0.0 && r.clearance.is_finite()) {
            return Err(ConfigError::Invalid("residential.clearance must not be negative".into()));
        }
        let grid = &r.grid;
        if !(grid.cell_size > 0.0 && grid.cell_size.is_finite())
            || !(grid.half_extent > 0.0 && grid.half_extent.is_finite())
        {
            return Err(ConfigError::Invalid(
                "residential.grid cell_size and half_extent must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&grid.jitter) {
            return Err(ConfigError::Invalid("residential.grid.jitter must be in 0..=1".into()));
        }
        if grid.half_extent * 2.0 / grid.cell_size > MAX_CELLS_PER_AXIS as f32 {
            return Err(ConfigError::Invalid(format!(
                "residential.grid has more than {MAX_CELLS_PER_AXIS} cells per axis"
            )));
        }
        if grid.cell_size < r.footprint.1 + r.clearance {
            return Err(ConfigError::Invalid(
                "residential.grid.cell_size must fit the largest footprint plus clearance".into(),
            ));
        }
        if !(0.0..=1.0).contains(&r.roof_probability) {
            return Err(ConfigError::Invalid("residential.roof_probability must be in 0..=1".into()));
        }
        if r.palette.is_empty() {
            return Err(ConfigError::Invalid("residential.palette must not be empty".into()));
        }
        Ok(())
    }
}

fn is_size_range((min, max): (f32, f32)) -> bool {
    min > 0.0 && min <= max && max.is_finite()
}
