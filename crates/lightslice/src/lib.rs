//! # lightslice
//!
//! Per-frame lighting core of a Direct3D11-class replacement renderer for a
//! legacy 3D game engine.
//!
//! ## Features
//!
//! - **Clustered Lights**: lights culled against the view cone and bucketed
//!   into depth slices, packed into a bit-exact constant-buffer layout
//! - **Occlusion Maps**: per-surface shadow bit planes decoded into texture
//!   arrays, cached per level
//! - **Change Tracking**: projection, actor lists and clusters are only
//!   recomputed when their inputs change
//! - **Backend Agnostic**: the device sits behind [`render::RenderDevice`],
//!   with a headless recorder for tests and replays
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lightslice::prelude::*;
//! use lightslice::render::backends::headless::HeadlessDevice;
//!
//! struct Level {
//!     table: Vec<Option<ActorRecord<usize>>>,
//!     lights: Vec<LightSource>,
//! }
//!
//! impl SceneHost for Level {
//!     type Actor = usize;
//!
//!     fn actor_table(&self) -> &[Option<ActorRecord<usize>>] {
//!         &self.table
//!     }
//!
//!     fn light_source(&self, actor: usize) -> Option<&LightSource> {
//!         self.lights.get(actor)
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut device = HeadlessDevice::new();
//!     let mut driver: FrameDriver<_, usize> = FrameDriver::new(&mut device, &DriverConfig::default())?;
//!     let level = Level { table: Vec::new(), lights: Vec::new() };
//!
//!     let frame = FrameInput {
//!         view: ViewFrame::identity(),
//!         viewport_x: 1280,
//!         viewport_y: 720,
//!         aspect: 16.0 / 9.0,
//!         fov: 90.0,
//!         level_id: 1,
//!     };
//!     driver.on_render_frame(&mut device, &level, &frame)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod hooks;
pub mod render;
pub mod scene;

mod driver;

pub use driver::{DriverError, FrameDriver, FrameInput, FrameReport, SceneHost};

/// Common imports for driver users
pub mod prelude {
    pub use crate::{
        DriverError, FrameDriver, FrameInput, FrameReport, SceneHost,
        config::{Config, DriverConfig},
        foundation::math::{Vec3, ViewFrame},
        hooks::{FlagWatch, LevelHooks, RenderState},
        render::{
            lighting::{LightEffect, LightSource, LightType},
            occlusion::{LightMapInfo, LightmapId, LightmapModel, LightmapSource},
            RenderDevice,
        },
        scene::{ActorRecord, LevelId},
    };
}
