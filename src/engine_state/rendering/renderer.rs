//! Chunk renderer.
//!
//! The renderer owns everything chunks share on the GPU side: the render
//! pipeline, the camera uniform and the quad index buffer. Chunks only
//! bring their own vertex, indirect and origin buffers.
//!
//! # Bind groups
//!
//! | Group | Binding | Contents |
//! |---|---|---|
//! | 0 | 0 | camera view-projection (`mat4x4<f32>`) |
//! | 1 | 0 | chunk origin in blocks (`vec4<i32>`) |
//!
//! # Quad indices
//!
//! Every chunk mesh is a list of quads with four vertices each, so one index
//! buffer serves all chunks: quad `q` is drawn from indices
//! `4q + [0, 1, 3, 0, 3, 2]`. The buffer is sized for the fullest mesh a
//! chunk of the configured dimensions can produce.

use thiserror::Error;
use wgpu::{BindGroup, BindGroupLayout, Device, Queue, RenderPipeline, TextureFormat};

use super::camera::CameraUniform;
use super::draw::PassEncoder;
use super::offscreen::OffscreenTarget;
use super::shader::{Shader, ShaderError, FRAGMENT_ENTRY, VERTEX_ENTRY};
use super::texture::Texture;
use super::vertex::PackedVertex;
use crate::core::StSystem;
use crate::engine_state::buffer_state::{BufferError, BufferKind, BufferState, GpuBuffer};
use crate::engine_state::voxels::chunk::ChunkDimensions;
use crate::engine_state::voxels::world::World;

/// Index pattern of one quad, relative to its first vertex.
pub const QUAD_INDEX_PATTERN: [u32; 6] = [0, 1, 3, 0, 3, 2];

/// Builds the shared index list for `quads` quads.
pub fn quad_indices(quads: usize) -> Vec<u32> {
    (0..quads as u32)
        .flat_map(|quad| QUAD_INDEX_PATTERN.map(|i| quad * 4 + i))
        .collect()
}

/// Errors raised while creating the renderer or producing a frame.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// The buffer state has no device to render with
    #[error("rendering needs device-backed buffers, but the buffer state is headless")]
    Headless,
    /// Reading the frame back from the GPU failed
    #[error("frame capture failed: {0}")]
    Capture(String),
    /// Encoding or writing the frame failed
    #[error("could not write frame: {0}")]
    Image(#[from] image::ImageError),
}

/// Draws a [`World`] with one indirect draw per drawable chunk.
pub struct ChunkRenderer {
    device: StSystem<Device>,
    queue: StSystem<Queue>,
    buffer_state: StSystem<BufferState>,
    pipeline: RenderPipeline,
    origin_layout: BindGroupLayout,
    camera_buffer: GpuBuffer<CameraUniform>,
    camera_bind_group: BindGroup,
    index_buffer: GpuBuffer<u32>,
    multi_draw: bool,
    /// Colour the frame is cleared to
    pub clear_color: wgpu::Color,
}

impl ChunkRenderer {
    /// Links `shader` into a pipeline and allocates the shared buffers.
    ///
    /// # Arguments
    /// * `buffer_state` - Device-backed buffer registry shared with the world
    /// * `dims` - Chunk dimensions, used to size the quad index buffer
    /// * `shader` - Compiled shader stages
    /// * `format` - Colour target format
    ///
    /// # Errors
    /// * [`RenderError::Headless`] if `buffer_state` has no device
    /// * [`ShaderError::Link`] if the pipeline fails validation
    /// * [`BufferError`] if a shared buffer cannot be allocated
    pub fn new(
        buffer_state: StSystem<BufferState>,
        dims: ChunkDimensions,
        shader: &Shader,
        format: TextureFormat,
    ) -> Result<Self, RenderError> {
        let (device, queue) = {
            let state = buffer_state.get();
            match (state.device(), state.queue()) {
                (Some(device), Some(queue)) => (device.clone(), queue.clone()),
                _ => return Err(RenderError::Headless),
            }
        };
        let multi_draw = device
            .get()
            .features()
            .contains(wgpu::Features::MULTI_DRAW_INDIRECT);

        let (camera_layout, origin_layout) = {
            let device = device.get();
            (
                Self::uniform_layout(&device, "Camera Bind Group Layout"),
                Self::uniform_layout(&device, "Chunk Origin Bind Group Layout"),
            )
        };
        let pipeline = Self::link(&device.get(), shader, format, &[&camera_layout, &origin_layout])?;

        let camera_buffer = GpuBuffer::<CameraUniform>::allocate(
            &buffer_state,
            "Camera Uniform Buffer",
            BufferKind::Uniform,
            1,
            Some(&[CameraUniform::default()][..]),
        )?;
        let index_buffer = GpuBuffer::<u32>::allocate(
            &buffer_state,
            "Quad Index Buffer",
            BufferKind::Index,
            dims.max_quads() * QUAD_INDEX_PATTERN.len(),
            Some(quad_indices(dims.max_quads()).as_slice()),
        )?;

        let camera_bind_group = {
            let state = buffer_state.get();
            let buffer = state
                .get_buffer(camera_buffer.id())
                .ok_or(RenderError::Headless)?;
            device.get().create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Camera Bind Group"),
                layout: &camera_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        };

        log::info!(
            "Chunk renderer ready ({} quad indices, multi-draw indirect: {multi_draw})",
            index_buffer.capacity()
        );

        Ok(Self {
            device,
            queue,
            buffer_state,
            pipeline,
            origin_layout,
            camera_buffer,
            camera_bind_group,
            index_buffer,
            multi_draw,
            clear_color: wgpu::Color {
                r: 0.53,
                g: 0.74,
                b: 0.92,
                a: 1.0,
            },
        })
    }

    fn uniform_layout(device: &Device, label: &str) -> BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        })
    }

    /// Combines the shader stages into a render pipeline.
    fn link(
        device: &Device,
        shader: &Shader,
        format: TextureFormat,
        layouts: &[&BindGroupLayout],
    ) -> Result<RenderPipeline, ShaderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Chunk Pipeline Layout"),
            bind_group_layouts: layouts,
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Chunk Render Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader.vertex_module(),
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[PackedVertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader.fragment_module(),
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: Texture::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => {
                let log = error.to_string();
                log::error!("Chunk pipeline failed to link: {log}");
                Err(ShaderError::Link { log })
            }
            None => Ok(pipeline),
        }
    }

    /// Whether chunks are drawn with `multi_draw_indexed_indirect`.
    pub fn uses_multi_draw(&self) -> bool {
        self.multi_draw
    }

    /// Number of indices in the shared quad index buffer.
    pub fn index_capacity(&self) -> usize {
        self.index_buffer.capacity()
    }

    /// Uploads a new view-projection matrix.
    pub fn update_camera(&mut self, uniform: &CameraUniform) -> Result<(), BufferError> {
        let mut region = self.camera_buffer.begin_edit_region(0, 1)?;
        region.push(*uniform)?;
        region.end()?;
        Ok(())
    }

    /// Renders every drawable chunk of `world` into `target`.
    ///
    /// # Returns
    /// The number of chunk draws issued.
    pub fn render(&self, world: &World, target: &OffscreenTarget) -> Result<usize, RenderError> {
        let device = self.device.get();
        let buffer_state = self.buffer_state.get();
        let index_buffer = buffer_state
            .get_buffer(self.index_buffer.id())
            .ok_or(RenderError::Headless)?;

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Chunk Frame Encoder"),
        });

        let issued = {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Chunk Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.color.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);

            let mut chunks = PassEncoder::new(
                &mut pass,
                &device,
                &buffer_state,
                &self.origin_layout,
                self.multi_draw,
            );
            world.draw(&mut chunks);
            chunks.issued()
        };

        self.queue.get().submit(Some(encoder.finish()));
        log::debug!("Submitted frame with {issued} chunk draws");
        Ok(issued)
    }
}
