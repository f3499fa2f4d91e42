//! Renderer configuration, loaded and saved as JSON.

use std::path::Path;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::display::DisplayMode;
use crate::smoothing::SmoothingSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn require_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                field,
                reason: format!("must be positive, got {value}"),
            })
        }
    }
}

/// Optical and splatting properties of the fluid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidMaterial {
    /// Per-channel absorption per unit thickness.
    #[serde(with = "serde_glam::vec3")]
    pub extinction_coefficients: Vec3,
    pub extinction_multiplier: f32,
    /// World-space diameter of each particle billboard.
    pub depth_particle_size: f32,
    /// Screen-space offset of the refracted background per unit depth slope.
    pub refraction_multiplier: f32,
}

impl Default for FluidMaterial {
    fn default() -> Self {
        Self {
            extinction_coefficients: Vec3::new(0.45, 0.16, 0.08),
            extinction_multiplier: 2.0,
            depth_particle_size: 0.2,
            refraction_multiplier: 8.0,
        }
    }
}

impl FluidMaterial {
    /// Coefficients as pushed to the composite program.
    pub fn scaled_extinction(&self) -> Vec3 {
        self.extinction_coefficients * self.extinction_multiplier
    }
}

/// Tiled floor behind the fluid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    #[serde(with = "serde_glam::vec4")]
    pub tile_col1: Vec4,
    #[serde(with = "serde_glam::vec4")]
    pub tile_col2: Vec4,
    #[serde(with = "serde_glam::vec4")]
    pub tile_col3: Vec4,
    #[serde(with = "serde_glam::vec4")]
    pub tile_col4: Vec4,
    /// Maximum per-tile colour jitter per channel.
    #[serde(with = "serde_glam::vec3")]
    pub tile_col_variation: Vec3,
    /// Tiles per world unit.
    pub tile_scale: f32,
    /// Amount subtracted from every other tile.
    pub tile_dark_offset: f32,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            tile_col1: Vec4::new(0.20, 0.55, 0.75, 1.0),
            tile_col2: Vec4::new(0.85, 0.45, 0.30, 1.0),
            tile_col3: Vec4::new(0.40, 0.70, 0.35, 1.0),
            tile_col4: Vec4::new(0.90, 0.80, 0.40, 1.0),
            tile_col_variation: Vec3::new(0.04, 0.04, 0.04),
            tile_scale: 1.0,
            tile_dark_offset: 0.12,
        }
    }
}

/// Debug view settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Mode the display controller starts in.
    pub display_mode: DisplayMode,
    /// Multiplier applied to depth and thickness in the debug views.
    pub depth_display_scale: f32,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Composite,
            depth_display_scale: 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub material: FluidMaterial,
    pub smoothing: SmoothingSettings,
    pub environment: EnvironmentSettings,
    pub debug: DebugSettings,
}

impl RenderConfig {
    /// Positivity checks on everything a pass divides by or loops over.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_positive("material.depth_particle_size", self.material.depth_particle_size)?;
        ConfigError::require_positive("environment.tile_scale", self.environment.tile_scale)?;
        self.smoothing.validate()
    }

    /// Save configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate configuration from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RenderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Serde proxies for glam types (glam's own serde feature is not enabled).
mod serde_glam {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Vec3Def {
        x: f32,
        y: f32,
        z: f32,
    }

    #[derive(Serialize, Deserialize)]
    struct Vec4Def {
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    }

    pub mod vec3 {
        use super::Vec3Def;
        use glam::Vec3;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
            Vec3Def { x: v.x, y: v.y, z: v.z }.serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
            Vec3Def::deserialize(d).map(|v| Vec3::new(v.x, v.y, v.z))
        }
    }

    pub mod vec4 {
        use super::Vec4Def;
        use glam::Vec4;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(v: &Vec4, s: S) -> Result<S::Ok, S::Error> {
            Vec4Def {
                x: v.x,
                y: v.y,
                z: v.z,
                w: v.w,
            }
            .serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec4, D::Error> {
            Vec4Def::deserialize(d).map(|v| Vec4::new(v.x, v.y, v.z, v.w))
        }
    }
}
