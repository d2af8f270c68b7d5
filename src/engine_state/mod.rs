//! # Engine State Module
//!
//! Ties the engine together: configuration, the block catalog, the buffer
//! registry, the chunked world and, when a device is available, the renderer.
//!
//! ## Key Components
//!
//! * `EngineState` - owns the world and renderer and exposes the edit and frame API
//! * `buffer_state` - buffer registry over a wgpu device or host memory
//! * `config` - JSON configuration
//! * `rendering` - vertex and command formats, pipeline, offscreen frames
//! * `voxels` - blocks, chunks, meshing and the world
//!
//! ## Headless runs
//!
//! An engine built with [`EngineState::headless`] keeps every buffer in host
//! memory. Meshing, edits and draw submission behave exactly as on a device;
//! draws are recorded with a [`RecordingEncoder`] instead of reaching a GPU.

use std::rc::Rc;

use cgmath::{Deg, Point3};
use thiserror::Error;
use wgpu::{Device, Queue};

use crate::core::StSystem;
use buffer_state::BufferState;
use config::{ConfigError, EngineConfig};
use rendering::camera::{Camera, CameraUniform, Projection};
use rendering::offscreen::OffscreenTarget;
use rendering::shader::{Shader, ShaderSources};
use rendering::texture::Texture;
use rendering::{ChunkRenderer, RecordingEncoder, RenderError};
use voxels::block::{BlockId, BlockRegistry, RegistryError, AIR};
use voxels::chunk::ChunkCoord;
use voxels::generation::filler_from_config;
use voxels::world::{World, WorldError, WorldStats};

pub mod buffer_state;
pub mod config;
pub mod rendering;
pub mod voxels;

/// Vertical field of view of the frame camera.
const FOVY_DEGREES: f32 = 70.0;
const ZNEAR: f32 = 0.1;
const ZFAR: f32 = 2000.0;

/// Errors raised while building the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not load block catalog: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Renderer plus the target and camera it draws with.
struct FrameRenderer {
    renderer: ChunkRenderer,
    target: OffscreenTarget,
    device: StSystem<Device>,
    queue: StSystem<Queue>,
}

/// The main state container for the engine.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use voxel_chunk_engine::engine_state::config::EngineConfig;
/// use voxel_chunk_engine::engine_state::EngineState;
///
/// let config = EngineConfig::from_json_str(
///     r#"{ "chunk": { "dim": 4, "height": 8 }, "world": { "radius": 1, "terrain": { "kind": "empty" } } }"#,
/// )
/// .unwrap();
/// let mut engine = EngineState::headless(config).unwrap();
///
/// engine.place_block(Point3::new(1, 2, 3), 1).unwrap();
/// assert_eq!(engine.record_draws().total_indices(), 36);
/// ```
pub struct EngineState {
    /// Configuration the engine was built from
    pub config: EngineConfig,
    /// Buffer registry shared by the world and renderer
    pub buffer_state: StSystem<BufferState>,
    /// The loaded chunks
    pub world: World,
    frame: Option<FrameRenderer>,
}

impl EngineState {
    /// Builds an engine whose buffers live in host memory.
    pub fn headless(config: EngineConfig) -> Result<Self, EngineError> {
        let buffer_state = StSystem::new(Box::new(BufferState::headless(
            config.buffers.max_host_buffer_size,
        )));
        let world = Self::build_world(&config, buffer_state.clone())?;

        Ok(Self {
            config,
            buffer_state,
            world,
            frame: None,
        })
    }

    /// Builds an engine that renders with `device`.
    ///
    /// A shader that fails to compile or link is logged and the engine
    /// continues without a renderer; [`EngineState::render_frame`] then
    /// returns `None`.
    pub fn with_device(config: EngineConfig, device: Device, queue: Queue) -> Result<Self, EngineError> {
        let device = StSystem::new(Box::new(device));
        let queue = StSystem::new(Box::new(queue));
        let buffer_state = StSystem::new(Box::new(BufferState::new(device.clone(), queue.clone())));
        let world = Self::build_world(&config, buffer_state.clone())?;

        let sources = ShaderSources::load(
            config.render.vertex_shader.as_deref(),
            config.render.fragment_shader.as_deref(),
        )
        .map_err(RenderError::from)?;

        let renderer = match Shader::compile(&device.get(), &sources) {
            Ok(shader) => match ChunkRenderer::new(
                buffer_state.clone(),
                world.dimensions(),
                &shader,
                Texture::COLOR_FORMAT,
            ) {
                Ok(renderer) => Some(renderer),
                Err(RenderError::Shader(err)) => {
                    log::error!("Continuing without a renderer: {err}");
                    None
                }
                Err(err) => return Err(err.into()),
            },
            Err(err) => {
                log::error!("Continuing without a renderer: {err}");
                None
            }
        };

        let frame = match renderer {
            Some(mut renderer) => {
                let target = OffscreenTarget::new(&device.get(), config.render.width, config.render.height);
                let camera = Camera::new(config.render.eye, config.render.target);
                let projection = Projection::new(
                    target.width(),
                    target.height(),
                    Deg(FOVY_DEGREES),
                    ZNEAR,
                    ZFAR,
                );
                renderer
                    .update_camera(&CameraUniform::from_camera(&camera, &projection))
                    .map_err(RenderError::from)?;
                Some(FrameRenderer {
                    renderer,
                    target,
                    device,
                    queue,
                })
            }
            None => None,
        };

        Ok(Self {
            config,
            buffer_state,
            world,
            frame,
        })
    }

    /// Loads the configured chunk grid and meshes it.
    fn build_world(config: &EngineConfig, buffer_state: StSystem<BufferState>) -> Result<World, EngineError> {
        let dims = config.chunk_dimensions()?;
        let registry = match &config.world.blocks {
            Some(path) => BlockRegistry::load(path)?,
            None => BlockRegistry::default(),
        };
        log::info!("Block catalog has {} entries", registry.len());

        let filler = filler_from_config(&config.world.terrain, &registry)?;
        let mut world = World::new(Rc::new(registry), dims, buffer_state);

        let radius = config.world.radius.max(0);
        for x in -radius + 1..radius {
            for z in -radius + 1..radius {
                world.load_chunk_with(ChunkCoord::new(x, z), filler.as_ref())?;
            }
        }
        world.rebuild_all()?;
        Ok(world)
    }

    /// Returns `true` if frames can be rendered.
    pub fn has_renderer(&self) -> bool {
        self.frame.is_some()
    }

    /// Places block `id` at a world position.
    pub fn place_block(&mut self, pos: Point3<i32>, id: BlockId) -> Result<(), WorldError> {
        self.world.set_block(pos, id)
    }

    /// Places a block by catalog name.
    pub fn place_named(&mut self, pos: Point3<i32>, name: &str) -> Result<(), EngineError> {
        let id = self
            .world
            .registry()
            .id_of(name)
            .ok_or_else(|| ConfigError::UnknownBlock(name.to_string()))?;
        Ok(self.place_block(pos, id)?)
    }

    /// Clears the block at a world position.
    pub fn remove_block(&mut self, pos: Point3<i32>) -> Result<(), WorldError> {
        self.world.set_block(pos, AIR)
    }

    /// Records the draws the world would submit this frame.
    pub fn record_draws(&self) -> RecordingEncoder {
        let mut encoder = RecordingEncoder::default();
        self.world.draw(&mut encoder);
        encoder
    }

    /// Renders one frame and reads it back.
    ///
    /// Returns `None` when the engine has no renderer.
    pub fn render_frame(&self) -> Result<Option<image::RgbaImage>, RenderError> {
        let Some(frame) = &self.frame else {
            return Ok(None);
        };

        let start = web_time::Instant::now();
        let draws = frame.renderer.render(&self.world, &frame.target)?;
        let image = frame
            .target
            .capture(&frame.device.get(), &frame.queue.get())?;
        log::info!("Rendered {draws} chunk draws in {:?}", start.elapsed());
        Ok(Some(image))
    }

    /// World totals.
    pub fn stats(&self) -> WorldStats {
        self.world.stats()
    }

    /// Logs world and buffer memory totals.
    pub fn log_stats(&self) {
        let stats = self.stats();
        let buffers = self.buffer_state.get();
        log::info!(
            "{} chunks loaded, {} drawable, {} quads",
            stats.loaded_chunks,
            stats.drawable_chunks,
            stats.total_quads
        );
        log::info!(
            "{} buffers: {} bytes allocated, {} bytes used",
            buffers.buffer_count(),
            buffers.get_total_allocated_memory(),
            buffers.get_total_used_memory()
        );
    }
}

/// Requests a device for offscreen rendering.
///
/// Returns `None`, after logging why, when no adapter or device is
/// available. `MULTI_DRAW_INDIRECT` is requested whenever the adapter has it.
pub fn request_offscreen_device() -> Option<(Device, Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::empty(),
        backend_options: wgpu::BackendOptions::from_env_or_default(),
    });

    let adapter = match pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: None,
        force_fallback_adapter: false,
    })) {
        Ok(adapter) => adapter,
        Err(err) => {
            log::warn!("No graphics adapter available: {err}");
            return None;
        }
    };
    log::info!("Using adapter {}", adapter.get_info().name);

    let required_features = adapter.features() & wgpu::Features::MULTI_DRAW_INDIRECT;
    match pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Chunk Engine Device"),
        required_features,
        required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::Off,
    })) {
        Ok(pair) => Some(pair),
        Err(err) => {
            log::warn!("Could not open a device: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> EngineConfig {
        EngineConfig::from_json_str(json).unwrap()
    }

    #[test]
    fn radius_loads_a_square_grid() {
        let engine = EngineState::headless(config(
            r#"{ "chunk": { "dim": 2, "height": 4 }, "world": { "radius": 2, "terrain": { "kind": "flat", "height": 1, "block": "stone" } } }"#,
        ))
        .unwrap();

        let coords: Vec<_> = engine.world.loaded_coords().collect();
        assert_eq!(coords.len(), 9);
        assert!(coords.contains(&ChunkCoord::new(-1, -1)));
        assert!(coords.contains(&ChunkCoord::new(1, 1)));
        assert_eq!(engine.stats().drawable_chunks, 9);
    }

    #[test]
    fn flat_grid_hides_shared_borders() {
        let engine = EngineState::headless(config(
            r#"{ "chunk": { "dim": 2, "height": 4 }, "world": { "radius": 2, "terrain": { "kind": "flat", "height": 1, "block": "stone" } } }"#,
        ))
        .unwrap();

        // A 6x6 slab: top and bottom of every cell plus the outer rim.
        assert_eq!(engine.stats().total_quads, 2 * 36 + 4 * 6);
    }

    #[test]
    fn edits_go_through_the_world() {
        let mut engine = EngineState::headless(config(
            r#"{ "chunk": { "dim": 4, "height": 4 }, "world": { "radius": 1, "terrain": { "kind": "empty" } } }"#,
        ))
        .unwrap();

        engine.place_named(Point3::new(0, 0, 0), "grass").unwrap();
        assert_eq!(engine.record_draws().total_indices(), 36);

        engine.remove_block(Point3::new(0, 0, 0)).unwrap();
        assert_eq!(engine.record_draws().total_indices(), 0);
        assert!(matches!(
            engine.place_named(Point3::new(0, 0, 0), "lava"),
            Err(EngineError::Config(ConfigError::UnknownBlock(_)))
        ));
        assert!(!engine.has_renderer());
    }

    #[test]
    fn bad_dimensions_fail_to_build() {
        let result = EngineState::headless(config(r#"{ "chunk": { "dim": 0 } }"#));
        assert!(matches!(
            result,
            Err(EngineError::Config(ConfigError::InvalidDimensions { .. }))
        ));
    }
}
