//! Draw submission.
//!
//! Chunks do not talk to wgpu directly. [`Chunk::draw`](crate::engine_state::voxels::chunk::Chunk::draw)
//! hands a [`ChunkDrawCall`] naming its buffers to a [`ChunkDrawEncoder`]:
//!
//! - [`PassEncoder`] turns each call into an indirect multi-draw on a render pass
//! - [`RecordingEncoder`] keeps the calls, for headless runs and tests

use wgpu::{BindGroupLayout, Device, RenderPass};

use crate::engine_state::buffer_state::{BufferId, BufferState};
use crate::engine_state::voxels::chunk::ChunkCoord;

/// Everything needed to draw one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDrawCall {
    /// Which chunk is drawn
    pub coord: ChunkCoord,
    /// Packed vertices of the chunk's mesh
    pub vertex_buffer: BufferId,
    /// The chunk's single indirect command
    pub indirect_buffer: BufferId,
    /// World origin of the chunk, bound at group 1
    pub origin_buffer: BufferId,
    /// Index count of the command, for bookkeeping
    pub index_count: u32,
}

/// Receives draw calls from chunks.
pub trait ChunkDrawEncoder {
    /// Encodes the draw of one chunk.
    fn draw_chunk(&mut self, call: &ChunkDrawCall);
}

/// Collects draw calls without a GPU.
#[derive(Debug, Default)]
pub struct RecordingEncoder {
    /// Calls in submission order
    pub calls: Vec<ChunkDrawCall>,
}

impl RecordingEncoder {
    /// Total indices the recorded calls would draw.
    pub fn total_indices(&self) -> u64 {
        self.calls.iter().map(|call| u64::from(call.index_count)).sum()
    }
}

impl ChunkDrawEncoder for RecordingEncoder {
    fn draw_chunk(&mut self, call: &ChunkDrawCall) {
        self.calls.push(*call);
    }
}

/// Encodes chunk draws into a wgpu render pass.
///
/// The pipeline, camera bind group and shared quad index buffer must already
/// be set on the pass. Each call binds the chunk's origin uniform and vertex
/// buffer, then issues one indirect draw from its command buffer.
pub struct PassEncoder<'a, 'pass> {
    pass: &'a mut RenderPass<'pass>,
    device: &'a Device,
    buffer_state: &'a BufferState,
    origin_layout: &'a BindGroupLayout,
    multi_draw: bool,
    issued: usize,
}

impl<'a, 'pass> PassEncoder<'a, 'pass> {
    /// Wraps a render pass.
    ///
    /// # Arguments
    /// * `multi_draw` - Whether the device has `MULTI_DRAW_INDIRECT`; without
    ///   it each chunk is drawn with a plain indexed indirect draw
    pub fn new(
        pass: &'a mut RenderPass<'pass>,
        device: &'a Device,
        buffer_state: &'a BufferState,
        origin_layout: &'a BindGroupLayout,
        multi_draw: bool,
    ) -> Self {
        Self {
            pass,
            device,
            buffer_state,
            origin_layout,
            multi_draw,
            issued: 0,
        }
    }

    /// Draws issued so far.
    pub fn issued(&self) -> usize {
        self.issued
    }
}

impl ChunkDrawEncoder for PassEncoder<'_, '_> {
    fn draw_chunk(&mut self, call: &ChunkDrawCall) {
        let (Some(vertices), Some(indirect), Some(origin)) = (
            self.buffer_state.get_buffer(call.vertex_buffer),
            self.buffer_state.get_buffer(call.indirect_buffer),
            self.buffer_state.get_buffer(call.origin_buffer),
        ) else {
            log::warn!("Skipping chunk {}: its buffers are not on the device", call.coord);
            return;
        };

        let origin_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Chunk Origin Bind Group"),
            layout: self.origin_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: origin.as_entire_binding(),
            }],
        });

        self.pass.set_bind_group(1, &origin_bind_group, &[]);
        self.pass.set_vertex_buffer(0, vertices.slice(..));
        if self.multi_draw {
            self.pass.multi_draw_indexed_indirect(indirect, 0, 1);
        } else {
            self.pass.draw_indexed_indirect(indirect, 0);
        }
        self.issued += 1;
    }
}
