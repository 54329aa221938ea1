//! End-to-end frame tests on the headless device

use lightslice::foundation::logging;
use lightslice::prelude::*;
use lightslice::render::backends::headless::{DeviceCall, HeadlessDevice};
use lightslice::render::shader_constants::{PerFrameConstants, SLICE_NUMBER};

struct Level {
    table: Vec<Option<ActorRecord<usize>>>,
    lights: Vec<LightSource>,
}

impl Level {
    fn new() -> Self {
        Self { table: Vec::new(), lights: Vec::new() }
    }

    fn add(&mut self, class_name: &str, light: LightSource) {
        let handle = self.lights.len();
        self.lights.push(light);
        self.table.push(Some(ActorRecord { handle, class_name: class_name.to_string() }));
    }
}

impl SceneHost for Level {
    type Actor = usize;

    fn actor_table(&self) -> &[Option<ActorRecord<usize>>] {
        &self.table
    }

    fn light_source(&self, actor: usize) -> Option<&LightSource> {
        self.lights.get(actor)
    }
}

fn frame(view: ViewFrame) -> FrameInput {
    FrameInput {
        view,
        viewport_x: 1024,
        viewport_y: 768,
        aspect: 4.0 / 3.0,
        fov: 90.0,
        level_id: 7,
    }
}

fn uploaded_constants(device: &HeadlessDevice, driver: &FrameDriver<HeadlessDevice, usize>) -> PerFrameConstants {
    let bytes = device.buffer_contents(driver.per_frame_buffer().buffer()).unwrap();
    bytemuck::pod_read_unaligned(bytes)
}

#[test]
fn test_three_lights_at_increasing_depth() {
    logging::init_with_level(logging::LevelFilter::Debug);

    let mut level = Level::new();
    for z in [500.0, 5000.0, 40000.0] {
        level.add("Light", LightSource::point(Vec3::new(0.0, 0.0, z), 100.0, 255));
    }

    let mut device = HeadlessDevice::new();
    let mut driver = FrameDriver::new(&mut device, &DriverConfig::default()).unwrap();
    let report = driver.on_render_frame(&mut device, &level, &frame(ViewFrame::identity())).unwrap();

    assert_eq!(report.stats.candidates, 3);
    assert_eq!(report.stats.packed, 2);
    assert_eq!(report.stats.slots_used, 4);

    let table = driver.clusters().slice_table();
    assert_eq!(table.slice(0), &[0]);
    assert_eq!(table.slice(2), &[2]);
    for slice in (0..SLICE_NUMBER).filter(|s| *s != 0 && *s != 2) {
        assert!(table.slice(slice).is_empty(), "slice {slice}");
    }

    let constants = uploaded_constants(&device, &driver);
    assert_eq!(&constants.slice_table[..4], &[0, 1, 1, 2]);
    assert_eq!(constants.slice_table[SLICE_NUMBER], 2);
    assert_eq!(&constants.light_indices[..2], &[0, 2]);
    assert_eq!(constants.lights[1][2], 500.0);
    assert_eq!(constants.lights[3][2], 5000.0);
    assert_eq!(constants.lights[5], [0.0; 4], "light beyond FAR is not packed");
}

#[test]
fn test_mixed_spotlights_reference_packed_offsets() {
    let mut level = Level::new();
    level.add("Light", LightSource::point(Vec3::new(0.0, 0.0, 800.0), 300.0, 200));
    level.add(
        "Spotlight",
        LightSource::spot(Vec3::new(0.0, 0.0, 900.0), 300.0, 200, Vec3::new(0.0, 0.0, -1.0), 0.8),
    );
    level.add("Lamp1", LightSource::point(Vec3::new(0.0, 0.0, 1000.0), 300.0, 200));

    let mut device = HeadlessDevice::new();
    let mut driver = FrameDriver::new(&mut device, &DriverConfig::default()).unwrap();
    driver.on_render_frame(&mut device, &level, &frame(ViewFrame::identity())).unwrap();

    // Clustering order: point lights, spotlights, lamps
    let offsets: Vec<u32> = driver.clusters().records().iter().map(|r| r.real_index).collect();
    assert_eq!(offsets, vec![0, 2, 5]);
    for &index in driver.clusters().slice_table().indices() {
        assert!(offsets.contains(&index), "{index} is not a packed offset");
    }
}

#[test]
fn test_camera_move_reclusters_and_reuploads() {
    let mut level = Level::new();
    level.add("Light", LightSource::point(Vec3::new(0.0, 0.0, 3000.0), 100.0, 255));

    let mut device = HeadlessDevice::new();
    let mut driver = FrameDriver::new(&mut device, &DriverConfig::default()).unwrap();
    driver.on_render_frame(&mut device, &level, &frame(ViewFrame::identity())).unwrap();
    let before = driver.clusters().slice_table().clone();

    device.clear_calls();
    let moved = ViewFrame::at(Vec3::new(0.0, 0.0, 2500.0));
    let report = driver.on_render_frame(&mut device, &level, &frame(moved)).unwrap();

    assert!(report.lights_recomputed);
    assert!(report.uploaded);
    assert_ne!(&before, driver.clusters().slice_table());
    assert!(device.calls().iter().any(|c| matches!(c, DeviceCall::UpdateBuffer(_))));
    assert_eq!(uploaded_constants(&device, &driver).lights[1][2], 500.0);
}

#[test]
fn test_flag_transition_flushes_occlusion_cache() {
    let level = Level::new();
    let lightmaps = LightmapModel {
        lightmaps: vec![LightMapInfo {
            data_offset: 0,
            light_actors: 0,
            u_clamp: 8,
            v_clamp: 1,
            u_scale: 1.0,
            v_scale: 1.0,
        }],
        lights: vec![Some(0), None],
        light_bits: vec![0xA5],
    };

    let config = DriverConfig::default();
    let watch = FlagWatch::new(&config.level_flags);
    let mut device = HeadlessDevice::new();
    let mut driver = FrameDriver::new(&mut device, &config).unwrap();

    driver.on_render_frame(&mut device, &level, &frame(ViewFrame::identity())).unwrap();
    driver.prepare_surface(&mut device, &lightmaps, 0).unwrap();
    assert_eq!(driver.occlusion().len(), 1);

    assert!(watch.on_flag_set(1847, &mut driver));
    assert!(watch.on_flag_query(1836, "03_NYC_AirfieldHeliBase", &mut driver));
    assert_eq!(driver.state(), RenderState::LoadLevel);

    driver.on_render_frame(&mut device, &level, &frame(ViewFrame::identity())).unwrap();
    assert!(driver.occlusion().is_empty());
    assert!(device.bound_pixel_resource(driver.occlusion().slot()).is_none());
    assert_eq!(driver.state(), RenderState::RenderLevel);
}

#[test]
fn test_fov_change_reclusters_without_camera_move() {
    let mut level = Level::new();
    level.add("Light", LightSource::point(Vec3::new(800.0, 0.0, 1000.0), 10.0, 255));

    let mut device = HeadlessDevice::new();
    let mut driver = FrameDriver::new(&mut device, &DriverConfig::default()).unwrap();
    let wide = frame(ViewFrame::identity());
    let report = driver.on_render_frame(&mut device, &level, &wide).unwrap();
    assert_eq!(report.stats.packed, 1);

    device.clear_calls();
    let narrow = FrameInput { fov: 40.0, ..wide };
    let report = driver.on_render_frame(&mut device, &level, &narrow).unwrap();

    assert!(report.projection_changed);
    assert!(report.lights_recomputed);
    assert!(report.uploaded);
    assert_eq!(report.stats.packed, 0, "light left the narrower cone");
    assert!(device.calls().iter().any(|c| matches!(c, DeviceCall::UpdateBuffer(_))));
    assert_eq!(uploaded_constants(&device, &driver).slice_table[SLICE_NUMBER], 0);
}
