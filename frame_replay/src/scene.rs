//! Replay scene description
//!
//! A captured level reduced to what the lighting core consumes: light
//! actors, lightmaps, a camera path and the surfaces drawn every frame.

use lightslice::config::{Config, DriverConfig};
use lightslice::prelude::*;
use serde::{Deserialize, Serialize};

/// One light actor of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLight {
    /// Host class name, e.g. `Light` or `Spotlight`
    pub class_name: String,
    /// Light state
    pub light: LightSource,
}

/// Scene file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayScene {
    /// Driver configuration
    pub driver: DriverConfig,
    /// Viewport width and height in pixels
    pub viewport: (u32, u32),
    /// Horizontal field of view in degrees
    pub fov: f32,
    /// Level identifier
    pub level_id: LevelId,
    /// Level name announced through the load hook
    pub level_name: String,
    /// Light actors
    pub lights: Vec<ReplayLight>,
    /// Lightmap storage
    pub lightmaps: LightmapModel,
    /// Camera frames, cycled when the replay runs longer
    pub camera_path: Vec<ViewFrame>,
    /// Lightmap ids drawn every frame, in draw order
    pub surfaces: Vec<LightmapId>,
    /// Seconds per frame
    pub frame_time: f32,
    #[serde(skip)]
    table: Vec<Option<ActorRecord<usize>>>,
}

impl Default for ReplayScene {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            viewport: (1024, 768),
            fov: 90.0,
            level_id: 1,
            level_name: "Untitled".to_string(),
            lights: Vec::new(),
            lightmaps: LightmapModel::default(),
            camera_path: vec![ViewFrame::identity()],
            surfaces: Vec::new(),
            frame_time: 1.0 / 60.0,
            table: Vec::new(),
        }
    }
}

impl Config for ReplayScene {}

impl ReplayScene {
    /// Load a `.ron` or `.toml` scene and index its actors
    pub fn load(path: &str) -> Result<Self, lightslice::config::ConfigError> {
        let mut scene = Self::load_from_file(path)?;
        scene.build_actor_table();
        Ok(scene)
    }

    /// Rebuild the actor table from `lights`
    pub fn build_actor_table(&mut self) {
        self.table = self
            .lights
            .iter()
            .enumerate()
            .map(|(handle, light)| {
                Some(ActorRecord {
                    handle,
                    class_name: light.class_name.clone(),
                })
            })
            .collect();
    }

    /// Frame input for frame number `index`
    pub fn frame_input(&self, index: usize) -> FrameInput {
        let view = if self.camera_path.is_empty() {
            ViewFrame::identity()
        } else {
            self.camera_path[index % self.camera_path.len()]
        };
        let (width, height) = self.viewport;
        FrameInput {
            view,
            viewport_x: width,
            viewport_y: height,
            aspect: width as f32 / height.max(1) as f32,
            fov: self.fov,
            level_id: self.level_id,
        }
    }
}

impl SceneHost for ReplayScene {
    type Actor = usize;

    fn actor_table(&self) -> &[Option<ActorRecord<usize>>] {
        &self.table
    }

    fn light_source(&self, actor: usize) -> Option<&LightSource> {
        self.lights.get(actor).map(|l| &l.light)
    }
}
