//! Frame driver
//!
//! Owns every per-frame subsystem and runs them in order for each call from
//! the host: projection check, level check, light clustering, constant
//! buffer upload. The host's draw loop then asks for the occlusion map of
//! each surface through [`FrameDriver::prepare_surface`].

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, DriverConfig};
use crate::foundation::math::ViewFrame;
use crate::foundation::time::Timer;
use crate::hooks::{LevelHooks, RenderState};
use crate::render::backend::{DeviceError, RenderDevice};
use crate::render::constant_buffer::ConstantBuffer;
use crate::render::lighting::{ClusterStats, LightClusterBuilder, LightSource};
use crate::render::occlusion::{LightmapId, LightmapSource, OcclusionError, OcclusionMap, OcclusionMapCache};
use crate::render::projection::ProjectionPlanner;
use crate::render::shader_constants::{PerFrameConstants, PerTickConstants};
use crate::scene::{ActorRecord, LevelId, SceneActorIndex};

/// Host scene as seen by the driver
pub trait SceneHost {
    /// Actor handle
    type Actor: Copy;

    /// The loaded level's actor table; empty rows are `None`
    fn actor_table(&self) -> &[Option<ActorRecord<Self::Actor>>];

    /// Current light state of an actor, if it still exists
    fn light_source(&self, actor: Self::Actor) -> Option<&LightSource>;
}

/// Camera description for one host render call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// View frame
    pub view: ViewFrame,
    /// Viewport width in pixels
    pub viewport_x: u32,
    /// Viewport height in pixels
    pub viewport_y: u32,
    /// Viewport aspect ratio
    pub aspect: f32,
    /// Horizontal field of view in degrees
    pub fov: f32,
    /// Host level identifier
    pub level_id: LevelId,
}

/// What a render call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Projection matrix and cone were rebuilt
    pub projection_changed: bool,
    /// Actor lists were rebuilt for a new level
    pub level_changed: bool,
    /// Light clusters were recomputed
    pub lights_recomputed: bool,
    /// Per-frame constants were uploaded
    pub uploaded: bool,
    /// Counters of the current clustering
    pub stats: ClusterStats,
}

/// Driver errors
#[derive(Error, Debug)]
pub enum DriverError {
    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device call failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Occlusion cache failed
    #[error("Occlusion error: {0}")]
    Occlusion(#[from] OcclusionError),

    /// Viewport cannot be projected
    #[error("Invalid viewport {width}x{height} (aspect {aspect})")]
    InvalidViewport {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Aspect ratio
        aspect: f32,
    },
}

impl DriverError {
    /// Whether the frame cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Device(e) | Self::Occlusion(OcclusionError::Device(e)) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Per-frame lighting and occlusion driver
pub struct FrameDriver<D: RenderDevice, H> {
    planner: ProjectionPlanner,
    actors: SceneActorIndex<H>,
    clusters: LightClusterBuilder,
    per_frame: ConstantBuffer<PerFrameConstants, D>,
    per_tick: ConstantBuffer<PerTickConstants, D>,
    occlusion: OcclusionMapCache<D>,
    timer: Timer,
    state: RenderState,
    level_name: Option<String>,
    flush_pending: bool,
}

impl<D: RenderDevice, H: Copy> FrameDriver<D, H> {
    /// Validate `config` and allocate the GPU-side state
    pub fn new(device: &mut D, config: &DriverConfig) -> Result<Self, DriverError> {
        config.validate()?;

        let per_frame = ConstantBuffer::new(device, config.slots.per_frame, PerFrameConstants::default())?;
        let per_tick = ConstantBuffer::new(device, config.slots.per_tick, PerTickConstants::default())?;
        let occlusion = OcclusionMapCache::new(device, &config.occlusion)?;

        log::info!(
            "Frame driver ready: constants at slots {}/{}, occlusion at slot {}",
            config.slots.per_frame, config.slots.per_tick, config.occlusion.slot
        );
        Ok(Self {
            planner: ProjectionPlanner::new(&config.projection),
            actors: SceneActorIndex::new(),
            clusters: LightClusterBuilder::new(&config.clustering),
            per_frame,
            per_tick,
            occlusion,
            timer: Timer::new(),
            state: RenderState::Default,
            level_name: None,
            flush_pending: false,
        })
    }

    /// Run the per-frame pipeline for one host render call
    pub fn on_render_frame<S>(
        &mut self,
        device: &mut D,
        host: &S,
        frame: &FrameInput,
    ) -> Result<FrameReport, DriverError>
    where
        S: SceneHost<Actor = H> + ?Sized,
    {
        if frame.viewport_x == 0 || frame.viewport_y == 0 || !(frame.aspect.is_finite() && frame.aspect > 0.0) {
            return Err(DriverError::InvalidViewport {
                width: frame.viewport_x,
                height: frame.viewport_y,
                aspect: frame.aspect,
            });
        }
        if self.flush_pending {
            self.flush_occlusion(device);
        }
        self.state = RenderState::RenderLevel;

        let mut report = FrameReport::default();

        report.projection_changed = self.planner.check_projection_change(
            frame.fov,
            frame.viewport_x,
            frame.viewport_y,
            frame.aspect,
            self.per_frame.data_mut(),
        );
        if report.projection_changed {
            self.per_frame.mark_dirty();
            self.clusters.invalidate();
        }

        report.level_changed = self
            .actors
            .check_level_change(frame.level_id, host.actor_table().iter().map(Option::as_ref));
        if report.level_changed {
            // Lightmap ids are per level; a prepared placeholder is not in the cache
            self.clusters.invalidate();
            self.flush_occlusion(device);
        }

        let lights = self.actors.candidates().filter_map(|actor| host.light_source(actor));
        report.lights_recomputed = self.clusters.recompute_if_view_changed(
            &frame.view,
            self.planner.cone_cos_sq(),
            lights,
            self.per_frame.data_mut(),
        );
        if report.lights_recomputed {
            self.per_frame.mark_dirty();
        }

        report.uploaded = self.per_frame.push(device)?;
        self.per_tick.push(device)?;
        self.per_frame.bind(device);
        self.per_tick.bind(device);

        report.stats = self.clusters.stats();
        Ok(report)
    }

    /// Advance the elapsed-time constant
    pub fn on_tick(&mut self, delta_seconds: f32) {
        self.timer.advance(delta_seconds);
        self.per_tick.update(PerTickConstants {
            elapsed: self.timer.total_time(),
            ..PerTickConstants::default()
        });
    }

    /// Look up, prepare and bind the occlusion map of a surface
    ///
    /// Consecutive surfaces sharing a lightmap skip the lookup. A map that
    /// cannot be created is replaced by the placeholder; only device loss
    /// is returned as an error.
    pub fn prepare_surface<S>(
        &mut self,
        device: &mut D,
        source: &S,
        lightmap: LightmapId,
    ) -> Result<Arc<OcclusionMap<D>>, DriverError>
    where
        S: LightmapSource + ?Sized,
    {
        if !self.occlusion.is_prepared(lightmap) {
            if let Err(e) = self.occlusion.find_or_insert_and_prepare(device, source, lightmap) {
                let e = DriverError::from(e);
                if e.is_fatal() {
                    return Err(e);
                }
                log::warn!("Occlusion map {lightmap} unavailable ({e}); binding placeholder");
                let placeholder = self.occlusion.placeholder();
                self.occlusion.prepare(lightmap, placeholder);
            }
        }
        self.occlusion.bind_maps(device);
        Ok(self
            .occlusion
            .prepared()
            .map_or_else(|| self.occlusion.placeholder(), Arc::clone))
    }

    /// Drop every cached occlusion map and unbind its slot
    pub fn flush_occlusion(&mut self, device: &mut D) {
        self.occlusion.flush(device);
        self.flush_pending = false;
    }

    /// Lifecycle state
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Name of the last loaded level
    pub fn level_name(&self) -> Option<&str> {
        self.level_name.as_deref()
    }

    /// Whether a level unload is waiting for the next device call
    pub fn flush_pending(&self) -> bool {
        self.flush_pending
    }

    /// CPU copy of the per-frame constants
    pub fn per_frame_constants(&self) -> &PerFrameConstants {
        self.per_frame.data()
    }

    /// Per-frame constant buffer
    pub fn per_frame_buffer(&self) -> &ConstantBuffer<PerFrameConstants, D> {
        &self.per_frame
    }

    /// Per-tick constant buffer
    pub fn per_tick_buffer(&self) -> &ConstantBuffer<PerTickConstants, D> {
        &self.per_tick
    }

    /// Light clustering state
    pub fn clusters(&self) -> &LightClusterBuilder {
        &self.clusters
    }

    /// Classified light actors
    pub fn actors(&self) -> &SceneActorIndex<H> {
        &self.actors
    }

    /// Projection state
    pub fn planner(&self) -> &ProjectionPlanner {
        &self.planner
    }

    /// Occlusion map cache
    pub fn occlusion(&self) -> &OcclusionMapCache<D> {
        &self.occlusion
    }
}

impl<D: RenderDevice, H: Copy> LevelHooks for FrameDriver<D, H> {
    /// Release level resources
    ///
    /// Cached maps are dropped at the next device call, since the hook has
    /// no device to unbind with.
    fn on_pre_load_level(&mut self) {
        log::info!("Unloading level {}", self.level_name.as_deref().unwrap_or("<none>"));
        self.state = RenderState::PreLoadLevel;
        self.flush_pending = true;
        self.actors.invalidate();
        self.clusters.invalidate();
    }

    /// Record the new level
    ///
    /// Only a load announced by [`Self::on_pre_load_level`] counts; scripts
    /// query the transition flag again mid-level.
    fn on_load_level(&mut self, name: &str) {
        if self.state != RenderState::PreLoadLevel {
            log::trace!("Ignoring load of {name} in state {:?}", self.state);
            return;
        }
        log::info!("Loaded level {name}");
        self.state = RenderState::LoadLevel;
        self.level_name = Some(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::backends::headless::HeadlessDevice;

    struct Scene {
        table: Vec<Option<ActorRecord<usize>>>,
        lights: Vec<LightSource>,
    }

    impl SceneHost for Scene {
        type Actor = usize;

        fn actor_table(&self) -> &[Option<ActorRecord<usize>>] {
            &self.table
        }

        fn light_source(&self, actor: usize) -> Option<&LightSource> {
            self.lights.get(actor)
        }
    }

    fn scene() -> Scene {
        Scene {
            table: vec![Some(ActorRecord { handle: 0, class_name: "Light".to_string() })],
            lights: vec![LightSource::point(Vec3::new(0.0, 0.0, 500.0), 100.0, 255)],
        }
    }

    fn frame() -> FrameInput {
        FrameInput {
            view: ViewFrame::identity(),
            viewport_x: 800,
            viewport_y: 600,
            aspect: 4.0 / 3.0,
            fov: 90.0,
            level_id: 1,
        }
    }

    fn driver(device: &mut HeadlessDevice) -> FrameDriver<HeadlessDevice, usize> {
        FrameDriver::new(device, &DriverConfig::default()).unwrap()
    }

    #[test]
    fn test_first_frame_runs_everything() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);

        let report = driver.on_render_frame(&mut device, &scene(), &frame()).unwrap();
        assert!(report.projection_changed);
        assert!(report.level_changed);
        assert!(report.lights_recomputed);
        assert!(report.uploaded);
        assert_eq!(report.stats.packed, 1);
        assert_eq!(driver.state(), RenderState::RenderLevel);
    }

    #[test]
    fn test_static_frame_uploads_nothing() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);
        let host = scene();

        driver.on_render_frame(&mut device, &host, &frame()).unwrap();
        let report = driver.on_render_frame(&mut device, &host, &frame()).unwrap();
        assert_eq!(
            report,
            FrameReport { stats: report.stats, ..FrameReport::default() }
        );
    }

    #[test]
    fn test_invalid_viewport_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);
        let input = FrameInput { viewport_y: 0, ..frame() };

        let err = driver.on_render_frame(&mut device, &scene(), &input).unwrap_err();
        assert!(matches!(err, DriverError::InvalidViewport { height: 0, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_device_loss_is_fatal() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);
        device.set_lost(true);

        let err = driver.on_render_frame(&mut device, &scene(), &frame()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_level_hooks_drive_state() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);
        let host = scene();
        driver.on_render_frame(&mut device, &host, &frame()).unwrap();

        driver.on_pre_load_level();
        assert_eq!(driver.state(), RenderState::PreLoadLevel);
        assert!(driver.flush_pending());

        driver.on_load_level("02_NYC_BatteryPark");
        assert_eq!(driver.state(), RenderState::LoadLevel);
        assert_eq!(driver.level_name(), Some("02_NYC_BatteryPark"));

        // Same level id: the invalidated index still rescans
        let report = driver.on_render_frame(&mut device, &host, &frame()).unwrap();
        assert!(report.level_changed);
        assert!(report.lights_recomputed);
        assert!(!driver.flush_pending());
    }

    #[test]
    fn test_load_without_pre_load_is_ignored() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);
        let host = scene();

        driver.on_load_level("Startup");
        assert_eq!(driver.state(), RenderState::Default);
        assert_eq!(driver.level_name(), None);

        driver.on_pre_load_level();
        driver.on_load_level("01_NYC_UNATCOIsland");
        driver.on_render_frame(&mut device, &host, &frame()).unwrap();
        assert_eq!(driver.state(), RenderState::RenderLevel);

        driver.on_load_level("01_NYC_UNATCOIsland");
        assert_eq!(driver.state(), RenderState::RenderLevel);
        assert_eq!(driver.level_name(), Some("01_NYC_UNATCOIsland"));
    }

    #[test]
    fn test_tick_advances_elapsed_time() {
        let mut device = HeadlessDevice::new();
        let mut driver = driver(&mut device);
        driver.on_tick(0.5);
        driver.on_tick(0.25);

        assert_eq!(driver.per_tick_buffer().data().elapsed, 0.75);
        assert!(driver.per_tick_buffer().is_dirty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut device = HeadlessDevice::new();
        let mut config = DriverConfig::default();
        config.slots.per_tick = config.slots.per_frame;

        let result: Result<FrameDriver<HeadlessDevice, usize>, _> = FrameDriver::new(&mut device, &config);
        assert!(matches!(result, Err(DriverError::Config(_))));
    }
}
