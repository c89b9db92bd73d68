use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use skillcity_assets::ResourceError;
use skillcity_input::Bindings;
use skillcity_kernel::{BuildError, CityConfig, ConfigError};
use skillcity_player::{OrbitConfig, PlayerConfig};
use skillcity_visibility::SchedulerConfig;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read session config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid session config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Which camera drives the view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    /// Damped orbit around the plaza.
    #[default]
    Orbit,
    /// Third-person follow of the player.
    Character,
}

impl CameraMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Orbit => Self::Character,
            Self::Character => Self::Orbit,
        }
    }
}

/// Everything a session needs, loadable from one YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub city: CityConfig,
    pub player: PlayerConfig,
    pub visibility: SchedulerConfig,
    pub orbit: OrbitConfig,
    pub bindings: Bindings,
    pub camera_mode: CameraMode,
    /// Directory asset paths are resolved against.
    pub asset_root: PathBuf,
    /// Character model requested at startup; the capsule is used until (or
    /// unless) it arrives.
    pub avatar_model: Option<String>,
    pub viewport: (u32, u32),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            city: CityConfig::default(),
            player: PlayerConfig {
                // South road, clear of the fountain and benches.
                spawn: Vec3::new(0.0, 0.0, 26.0),
                ..PlayerConfig::default()
            },
            visibility: SchedulerConfig::default(),
            orbit: OrbitConfig::default(),
            bindings: Bindings::default(),
            camera_mode: CameraMode::Orbit,
            asset_root: PathBuf::from("assets"),
            avatar_model: Some("models/character.glb".into()),
            viewport: (1280, 720),
        }
    }
}

impl SessionConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, SessionError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String, SessionError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        self.city.validate()?;
        let p = &self.player;
        if !(p.walk_speed >= 0.0 && p.run_speed >= 0.0) {
            return Err(ConfigError::Invalid("player speeds must not be negative".into()).into());
        }
        if !(p.half_extents.min_element() > 0.0) {
            return Err(ConfigError::Invalid("player.half_extents must be positive".into()).into());
        }
        if !(self.visibility.cutoff_distance > 0.0) {
            return Err(ConfigError::Invalid("visibility.cutoff_distance must be positive".into()).into());
        }
        let budget = self.visibility.frame_budget_ms;
        if !(budget > 0.0 && budget.is_finite()) {
            return Err(ConfigError::Invalid("visibility.frame_budget_ms must be positive and finite".into()).into());
        }
        Ok(())
    }
}
