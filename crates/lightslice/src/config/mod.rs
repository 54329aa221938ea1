//! Configuration system
//!
//! Runtime-tunable parameters of the driver. The constant-buffer layout itself
//! (slice count, array capacities) is fixed at compile time in
//! [`crate::render::shader_constants`] because the shaders are compiled
//! against it; everything here may change without recompiling shaders.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its valid range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Projection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Distance mapped to the near end of the depth buffer
    ///
    /// Larger than `z_far`: near and far are swapped for depth precision.
    pub z_near: f32,
    /// Distance mapped to the far end of the depth buffer
    pub z_far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            z_near: 32760.0,
            z_far: 1.0,
        }
    }
}

/// Light clustering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// View-space depth where slice 0 begins
    pub near_clipping_distance: f32,
    /// View-space depth where the last slice ends
    pub far_clipping_distance: f32,
    /// World-space direction of the directional "sun" light
    pub sun_direction: [f32; 3],
    /// Intensity factor for point and spot lights, times radius² × brightness
    pub point_intensity_scale: f32,
    /// Intensity factor for cylinder/ambient lights
    pub ambient_intensity_scale: f32,
    /// Panic on shader-array overflow instead of truncating
    pub strict_capacity: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            near_clipping_distance: 1.0,
            far_clipping_distance: 32760.0,
            sun_direction: [0.7, 0.5, -0.9],
            point_intensity_scale: 0.1,
            ambient_intensity_scale: 0.02,
            strict_capacity: cfg!(debug_assertions),
        }
    }
}

/// Occlusion map cache parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    /// Pixel-shader resource slot the prepared texture array is bound to
    pub slot: u32,
    /// Apply the 3x3 box filter to decoded bit planes
    pub antialias: bool,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            slot: 8,
            antialias: false,
        }
    }
}

/// Constant-buffer slot assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSlots {
    /// Slot of the per-frame constants (projection, view, lights)
    pub per_frame: u32,
    /// Slot of the elapsed-time constants
    pub per_tick: u32,
}

impl Default for BufferSlots {
    fn default() -> Self {
        Self { per_frame: 0, per_tick: 1 }
    }
}

/// Script flags that mark a level transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelFlagConfig {
    /// Name ids of the flags; setting one announces an unload, querying one a load
    pub transition_flag_ids: Vec<u32>,
}

impl Default for LevelFlagConfig {
    fn default() -> Self {
        Self {
            transition_flag_ids: vec![1847, 1836],
        }
    }
}

/// Top-level driver configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Projection parameters
    pub projection: ProjectionConfig,
    /// Light clustering parameters
    pub clustering: ClusteringConfig,
    /// Occlusion cache parameters
    pub occlusion: OcclusionConfig,
    /// Constant-buffer slots
    pub slots: BufferSlots,
    /// Level transition flags
    pub level_flags: LevelFlagConfig,
}

impl Config for DriverConfig {}

impl DriverConfig {
    /// Check value ranges that the clustering math depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.clustering;
        if !(c.near_clipping_distance.is_finite() && c.far_clipping_distance.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "clustering.near_clipping_distance",
                reason: "clipping distances must be finite".to_string(),
            });
        }
        if c.near_clipping_distance >= c.far_clipping_distance {
            return Err(ConfigError::Invalid {
                field: "clustering.far_clipping_distance",
                reason: format!(
                    "far ({}) must exceed near ({})",
                    c.far_clipping_distance, c.near_clipping_distance
                ),
            });
        }
        if c.point_intensity_scale < 0.0 || c.ambient_intensity_scale < 0.0 {
            return Err(ConfigError::Invalid {
                field: "clustering.point_intensity_scale",
                reason: "intensity scales must not be negative".to_string(),
            });
        }
        if c.sun_direction.iter().all(|v| *v == 0.0) {
            return Err(ConfigError::Invalid {
                field: "clustering.sun_direction",
                reason: "direction must be non-zero".to_string(),
            });
        }

        let p = &self.projection;
        if p.z_near <= 0.0 || p.z_far <= 0.0 || p.z_near == p.z_far {
            return Err(ConfigError::Invalid {
                field: "projection.z_near",
                reason: format!("degenerate depth range {} .. {}", p.z_near, p.z_far),
            });
        }

        if self.slots.per_frame == self.slots.per_tick {
            return Err(ConfigError::Invalid {
                field: "slots.per_tick",
                reason: "per-frame and per-tick buffers need distinct slots".to_string(),
            });
        }
        Ok(())
    }
}
