#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Chunk Engine
//!
//! Chunked voxel meshing with one indirect draw per chunk, built on WGPU.
//!
//! The world is split into fixed-size chunks. Each chunk keeps a flat array
//! of block ids and rebuilds its visible faces into a packed vertex buffer
//! whenever it is edited, consulting its four horizontal neighbours so faces
//! between two solid blocks in different chunks are culled. Every drawable
//! chunk then submits a single indexed indirect draw against a quad index
//! buffer shared by all chunks.
//!
//! ## Key Modules
//!
//! * `core` - the shared single-threaded handle used across the engine
//! * `engine_state` - configuration, buffers, blocks, chunks, world and rendering
//!
//! ## Usage
//!
//! The binary builds a world from a JSON config, applies a few edits and
//! renders one frame to a PNG. Without a graphics adapter, or with
//! `--headless`, the same meshing runs against host memory and the draws are
//! recorded instead.
//!
//! ```bash
//! RUST_LOG=info voxel-chunk-engine --config world.json --output frame.png --log-stats
//! ```

use std::path::PathBuf;

use anyhow::Context;
use cgmath::Point3;
use clap::Parser;
use log::info;

pub mod core;
pub mod engine_state;

use engine_state::config::EngineConfig;
use engine_state::rendering::offscreen::save_png;
use engine_state::EngineState;

/// Renders a chunked voxel world to an image.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// JSON engine configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where to write the rendered frame, overriding the config
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Keep all buffers in host memory and skip rendering
    #[arg(long)]
    headless: bool,
    /// Log world and buffer totals before exiting
    #[arg(long)]
    log_stats: bool,
}

/// Places a small wall straddling the x = 0 chunk border, then knocks a hole
/// in it, so both sides of the border are re-meshed.
fn apply_demo_edits(engine: &mut EngineState) -> anyhow::Result<()> {
    let height = engine.world.dimensions().height() as i32;
    let base = height / 2;

    for y in base..(base + 4).min(height) {
        for x in -2..2 {
            engine
                .place_named(Point3::new(x, y, 0), "wood")
                .with_context(|| format!("placing wall block at ({x}, {y}, 0)"))?;
        }
    }
    if base + 1 < height {
        engine
            .remove_block(Point3::new(0, base + 1, 0))
            .context("removing wall block")?;
    }
    Ok(())
}

/// Runs the engine from the command line.
pub fn run() -> anyhow::Result<()> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(output) = cli.output {
        config.render.output = output;
    }

    let start = web_time::Instant::now();
    let device = if cli.headless {
        None
    } else {
        let device = engine_state::request_offscreen_device();
        if device.is_none() {
            log::warn!("Falling back to headless buffers");
        }
        device
    };
    let mut engine = match device {
        Some((device, queue)) => EngineState::with_device(config, device, queue),
        None => EngineState::headless(config),
    }
    .context("building engine")?;
    info!("Engine initialized in {:?}", start.elapsed());

    apply_demo_edits(&mut engine)?;

    match engine.render_frame().context("rendering frame")? {
        Some(frame) => {
            let output = &engine.config.render.output;
            save_png(&frame, output)
                .with_context(|| format!("writing frame to {}", output.display()))?;
            info!("Wrote {}x{} frame to {}", frame.width(), frame.height(), output.display());
        }
        None => {
            let recording = engine.record_draws();
            info!(
                "Recorded {} chunk draws covering {} indices",
                recording.calls.len(),
                recording.total_indices()
            );
        }
    }

    if cli.log_stats {
        engine.log_stats();
    }
    Ok(())
}
