//! Frame replay tool
//!
//! Runs a captured scene through the lighting core on the headless device
//! and logs what every frame produced.
//!
//! ```text
//! frame_replay <scene.ron|scene.toml> [--frames N] [--dump DIR]
//! ```

mod dump;
mod scene;

use std::path::PathBuf;

use lightslice::prelude::*;
use lightslice::render::backends::headless::HeadlessDevice;
use thiserror::Error;

use crate::scene::ReplayScene;

/// Replay errors
#[derive(Error, Debug)]
enum ReplayError {
    #[error("{0}")]
    Usage(String),

    #[error("Scene error: {0}")]
    Scene(#[from] lightslice::config::ConfigError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

struct Options {
    scene: String,
    frames: usize,
    dump_dir: Option<PathBuf>,
}

fn parse_args() -> Result<Options, ReplayError> {
    let usage = || ReplayError::Usage("usage: frame_replay <scene.ron|scene.toml> [--frames N] [--dump DIR]".to_string());

    let mut args = std::env::args().skip(1);
    let mut scene = None;
    let mut frames = 1;
    let mut dump_dir = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                let value = args.next().ok_or_else(usage)?;
                frames = value
                    .parse()
                    .map_err(|_| ReplayError::Usage(format!("invalid frame count '{value}'")))?;
            }
            "--dump" => dump_dir = Some(PathBuf::from(args.next().ok_or_else(usage)?)),
            _ if scene.is_none() => scene = Some(arg),
            _ => return Err(usage()),
        }
    }

    Ok(Options {
        scene: scene.ok_or_else(usage)?,
        frames,
        dump_dir,
    })
}

fn run(options: &Options) -> Result<(), ReplayError> {
    let scene = ReplayScene::load(&options.scene)?;
    log::info!(
        "Loaded {}: {} lights, {} lightmaps, {} surfaces",
        options.scene,
        scene.lights.len(),
        scene.lightmaps.lightmaps.len(),
        scene.surfaces.len()
    );

    let mut device = HeadlessDevice::new();
    let mut driver: FrameDriver<HeadlessDevice, usize> = FrameDriver::new(&mut device, &scene.driver)?;
    driver.on_pre_load_level();
    driver.on_load_level(&scene.level_name);

    for index in 0..options.frames {
        driver.on_tick(scene.frame_time);
        let report = driver.on_render_frame(&mut device, &scene, &scene.frame_input(index))?;
        for &surface in &scene.surfaces {
            driver.prepare_surface(&mut device, &scene.lightmaps, surface)?;
        }

        let stats = report.stats;
        log::info!(
            "Frame {index}: {}/{} lights packed in {} slots, {} slice entries{}{}",
            stats.packed,
            stats.candidates,
            stats.slots_used,
            stats.slice_entries,
            if report.projection_changed { ", projection rebuilt" } else { "" },
            if report.uploaded { ", uploaded" } else { "" },
        );
        if stats.truncated_lights > 0 || stats.truncated_entries > 0 {
            log::warn!(
                "Frame {index}: truncated {} lights and {} slice entries",
                stats.truncated_lights, stats.truncated_entries
            );
        }
    }

    let table = driver.clusters().slice_table();
    for slice in 0..lightslice::render::shader_constants::SLICE_NUMBER {
        log::debug!("Slice {slice:2}: {:?}", table.slice(slice));
    }
    for ((width, height), count) in driver.occlusion().size_histogram() {
        log::info!("Occlusion maps {width}x{height}: {count}");
    }

    if let Some(dir) = &options.dump_dir {
        std::fs::create_dir_all(dir)?;
        let mut ids = scene.surfaces.clone();
        ids.sort_unstable();
        ids.dedup();

        let mut written = 0;
        for surface in ids {
            let map = driver.prepare_surface(&mut device, &scene.lightmaps, surface)?;
            if driver.occlusion().is_placeholder(&map) {
                continue;
            }
            written += dump::dump_layers(dir, surface, map.texture())?.len();
        }
        log::info!("Wrote {written} occlusion layers to {}", dir.display());
    }

    driver.on_pre_load_level();
    driver.flush_occlusion(&mut device);
    log::info!("Replay finished, {} textures still alive", device.live_textures());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    lightslice::foundation::logging::init_with_level(log::LevelFilter::Info);

    let options = parse_args()?;
    match run(&options) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Replay failed: {e}");
            Err(e.into())
        }
    }
}
