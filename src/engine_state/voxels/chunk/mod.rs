//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a fixed-size column of blocks that
//! owns its render geometry and rebuilds it on demand.
//!
//! ## Storage
//!
//! Blocks are stored as a flat `Vec<BlockId>` indexed `((y * dim) + x) * dim + z`,
//! so a linear walk over the vector visits cells in (y, x, z) order, which is
//! also the order the mesher emits faces in.
//!
//! ## Meshing
//!
//! [`Chunk::rebuild_mesh`] walks every non-air cube and emits the faces whose
//! neighbouring cell does not hold a cube. Faces on the horizontal edges look
//! into the neighbouring chunk through its [`ChunkHandle`]; a missing or
//! unloaded neighbour never hides a face. Faces at the top and bottom of the
//! chunk are always emitted.
//!
//! The result replaces the previous mesh completely. Every rebuild writes the
//! visible vertices as a prefix of the vertex buffer and one
//! [`DrawIndirectCommand`] describing them.
//!
//! ## Neighbours
//!
//! A chunk never owns its neighbours. It keeps one optional generational
//! handle per horizontal side, and every read through a handle goes through a
//! [`NeighbourLookup`], which answers `None` once the neighbour is gone.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use cgmath::Point3;
use thiserror::Error;
use web_time::Instant;

use super::block::block_side::BlockSide;
use super::block::{BlockId, BlockRegistry, AIR};
use super::generation::ChunkFiller;
use super::world::ChunkHandle;
use crate::core::StSystem;
use crate::engine_state::buffer_state::{BufferError, BufferKind, BufferState, GpuBuffer};
use crate::engine_state::config::ConfigError;
use crate::engine_state::rendering::draw::{ChunkDrawCall, ChunkDrawEncoder};
use crate::engine_state::rendering::indirect::DrawIndirectCommand;
use crate::engine_state::rendering::vertex::{PackedVertex, VertexFields, MAX_X, MAX_Y};

pub mod chunk_iteration;

use chunk_iteration::ChunkBlockIterator;

/// Vertices emitted per block at most (six faces of four corners).
pub const VERTICES_PER_BLOCK: usize = 24;

/// Position of a chunk on the horizontal chunk grid.
///
/// Chunk `(x, z)` covers world blocks `x * dim .. (x + 1) * dim` along X and
/// likewise along Z, over the full height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// Grid position along X
    pub x: i32,
    /// Grid position along Z
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a grid coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The grid cell across the given side. Vertical sides map to `self`.
    pub fn neighbour(self, side: BlockSide) -> Self {
        let offset = side.offset();
        Self::new(self.x + offset.x, self.z + offset.z)
    }

    /// World position of the chunk's (0, 0, 0) block.
    pub fn origin(self, dims: ChunkDimensions) -> Point3<i32> {
        let dim = dims.dim() as i32;
        Point3::new(self.x * dim, 0, self.z * dim)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Validated chunk size.
///
/// `dim` is bounded so that `dim` itself (a block's far corner) still fits the
/// 5-bit x/z vertex fields, and `height` likewise for the 10-bit y field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkDimensions {
    dim: u32,
    height: u32,
}

impl ChunkDimensions {
    /// Largest horizontal size.
    pub const MAX_DIM: u32 = MAX_X;
    /// Largest vertical size.
    pub const MAX_HEIGHT: u32 = MAX_Y;

    /// Validates and creates chunk dimensions.
    ///
    /// # Errors
    /// [`ConfigError::InvalidDimensions`] unless `1 <= dim <= 31` and
    /// `1 <= height <= 1023`.
    pub fn new(dim: u32, height: u32) -> Result<Self, ConfigError> {
        if !(1..=Self::MAX_DIM).contains(&dim) || !(1..=Self::MAX_HEIGHT).contains(&height) {
            return Err(ConfigError::InvalidDimensions {
                dim,
                height,
                max_dim: Self::MAX_DIM,
                max_height: Self::MAX_HEIGHT,
            });
        }
        Ok(Self { dim, height })
    }

    /// Horizontal edge length in blocks.
    pub fn dim(&self) -> u32 {
        self.dim
    }

    /// Vertical size in blocks.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of cells in a chunk.
    pub fn block_count(&self) -> usize {
        (self.dim * self.dim * self.height) as usize
    }

    /// Vertex buffer capacity: enough for every face of every cell.
    pub fn vertex_capacity(&self) -> usize {
        self.block_count() * VERTICES_PER_BLOCK
    }

    /// Most quads a single chunk mesh can contain.
    pub fn max_quads(&self) -> usize {
        self.block_count() * 6
    }

    /// Returns `true` if `local` lies inside the chunk.
    pub fn contains(&self, local: Point3<i32>) -> bool {
        let dim = self.dim as i32;
        (0..dim).contains(&local.x)
            && (0..self.height as i32).contains(&local.y)
            && (0..dim).contains(&local.z)
    }

    /// Flat index of `local`, or `None` outside the chunk.
    pub fn index(&self, local: Point3<i32>) -> Option<usize> {
        if !self.contains(local) {
            return None;
        }
        let dim = self.dim as usize;
        Some(((local.y as usize * dim) + local.x as usize) * dim + local.z as usize)
    }

    /// Inverse of [`ChunkDimensions::index`].
    pub fn position(&self, index: usize) -> Point3<i32> {
        let dim = self.dim as usize;
        Point3::new(
            ((index / dim) % dim) as i32,
            (index / (dim * dim)) as i32,
            (index % dim) as i32,
        )
    }
}

/// Errors raised by chunk operations.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A local position outside the chunk
    #[error("local position {pos:?} is outside a {dim}x{height}x{dim} chunk")]
    OutOfBounds {
        /// The offending position
        pos: Point3<i32>,
        /// Chunk edge length
        dim: u32,
        /// Chunk height
        height: u32,
    },
    /// A block id missing from the registry
    #[error("block id {0} is not registered")]
    UnknownBlock(BlockId),
    /// Buffer allocation or upload failed
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Read access to neighbouring chunks during a rebuild.
///
/// Implemented by the world's chunk table. Handles are validated on every
/// call; an expired handle reads as absent.
pub trait NeighbourLookup {
    /// Returns `true` if `handle` still names a loaded chunk.
    fn is_live(&self, handle: ChunkHandle) -> bool;

    /// Block at `local` in the chunk behind `handle`, or `None` if it is gone
    /// or `local` is outside it.
    fn neighbour_block(&self, handle: ChunkHandle, local: Point3<i32>) -> Option<BlockId>;
}

/// A lookup with no chunks in it, for meshing a chunk in isolation.
pub struct NoNeighbours;

impl NeighbourLookup for NoNeighbours {
    fn is_live(&self, _handle: ChunkHandle) -> bool {
        false
    }

    fn neighbour_block(&self, _handle: ChunkHandle, _local: Point3<i32>) -> Option<BlockId> {
        None
    }
}

/// Non-owning references to the four horizontal neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighbourChunks {
    /// Chunk at +X
    pub east: Option<ChunkHandle>,
    /// Chunk at -X
    pub west: Option<ChunkHandle>,
    /// Chunk at +Z
    pub south: Option<ChunkHandle>,
    /// Chunk at -Z
    pub north: Option<ChunkHandle>,
}

impl NeighbourChunks {
    /// Handle on the given side. Always `None` for UP and DOWN.
    pub fn get(&self, side: BlockSide) -> Option<ChunkHandle> {
        match side {
            BlockSide::EAST => self.east,
            BlockSide::WEST => self.west,
            BlockSide::SOUTH => self.south,
            BlockSide::NORTH => self.north,
            BlockSide::UP | BlockSide::DOWN => None,
        }
    }

    /// Replaces the handle on a horizontal side. Vertical sides are ignored.
    pub fn set(&mut self, side: BlockSide, handle: Option<ChunkHandle>) {
        match side {
            BlockSide::EAST => self.east = handle,
            BlockSide::WEST => self.west = handle,
            BlockSide::SOUTH => self.south = handle,
            BlockSide::NORTH => self.north = handle,
            BlockSide::UP | BlockSide::DOWN => {}
        }
    }

    /// Iterates the sides that currently hold a handle.
    pub fn iter(&self) -> impl Iterator<Item = (BlockSide, ChunkHandle)> + '_ {
        BlockSide::horizontal()
            .into_iter()
            .filter_map(|side| self.get(side).map(|handle| (side, handle)))
    }
}

/// Outcome of one mesh rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Visible quads emitted
    pub quads: u32,
    /// Indices the draw command covers
    pub indices: u32,
    /// Time spent rebuilding
    pub elapsed: Duration,
}

impl std::ops::AddAssign for MeshStats {
    fn add_assign(&mut self, other: Self) {
        self.quads += other.quads;
        self.indices += other.indices;
        self.elapsed += other.elapsed;
    }
}

/// Neighbours that must be rebuilt after an edit on the chunk's border.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryNotifications {
    /// Result of rebuilding the edited chunk itself
    pub stats: MeshStats,
    /// Live neighbours across the edited cell's boundary sides
    pub neighbours: Vec<(BlockSide, ChunkHandle)>,
}

/// A column of blocks and the GPU geometry that draws it.
pub struct Chunk {
    coord: ChunkCoord,
    dims: ChunkDimensions,
    registry: Rc<BlockRegistry>,
    blocks: Vec<BlockId>,
    neighbours: NeighbourChunks,
    vertex_buffer: GpuBuffer<PackedVertex>,
    indirect_buffer: GpuBuffer<DrawIndirectCommand>,
    origin_buffer: GpuBuffer<[i32; 4]>,
    quad_count: u32,
    indirect_command: DrawIndirectCommand,
    drawable: bool,
}

impl Chunk {
    /// Creates an all-air chunk and allocates its buffers.
    ///
    /// # Arguments
    /// * `coord` - Grid position of the chunk
    /// * `dims` - Chunk size
    /// * `registry` - Shared block catalog
    /// * `buffer_state` - Registry the chunk's buffers are allocated in
    ///
    /// # Errors
    /// Propagates buffer allocation failures.
    pub fn new(
        coord: ChunkCoord,
        dims: ChunkDimensions,
        registry: Rc<BlockRegistry>,
        buffer_state: &StSystem<BufferState>,
    ) -> Result<Self, ChunkError> {
        let origin = coord.origin(dims);

        let vertex_buffer = GpuBuffer::allocate(
            buffer_state,
            &format!("Chunk {coord} Vertex Buffer"),
            BufferKind::Vertex,
            dims.vertex_capacity(),
            None,
        )?;
        let indirect_buffer = GpuBuffer::allocate(
            buffer_state,
            &format!("Chunk {coord} Indirect Buffer"),
            BufferKind::Indirect,
            1,
            None,
        )?;
        let origin_buffer = GpuBuffer::allocate(
            buffer_state,
            &format!("Chunk {coord} Origin Buffer"),
            BufferKind::Uniform,
            1,
            Some(&[[origin.x, origin.y, origin.z, 0]]),
        )?;

        Ok(Self {
            coord,
            dims,
            registry,
            blocks: vec![AIR; dims.block_count()],
            neighbours: NeighbourChunks::default(),
            vertex_buffer,
            indirect_buffer,
            origin_buffer,
            quad_count: 0,
            indirect_command: DrawIndirectCommand::default(),
            drawable: false,
        })
    }

    /// Grid position of the chunk.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Size of the chunk.
    pub fn dimensions(&self) -> ChunkDimensions {
        self.dims
    }

    /// Bounds-checked block read. `None` outside the chunk.
    pub fn get_block(&self, local: Point3<i32>) -> Option<BlockId> {
        self.dims.index(local).map(|index| self.blocks[index])
    }

    /// Bounds-checked block write. Does not touch the mesh.
    ///
    /// # Errors
    /// * [`ChunkError::OutOfBounds`] if `local` is outside the chunk
    /// * [`ChunkError::UnknownBlock`] if `id` is not in the registry
    pub fn set_block(&mut self, local: Point3<i32>, id: BlockId) -> Result<(), ChunkError> {
        let index = self.dims.index(local).ok_or(ChunkError::OutOfBounds {
            pos: local,
            dim: self.dims.dim,
            height: self.dims.height,
        })?;
        if !self.registry.contains(id) {
            return Err(ChunkError::UnknownBlock(id));
        }
        self.blocks[index] = id;
        Ok(())
    }

    /// Overwrites every cell with the filler's output.
    ///
    /// # Errors
    /// [`ChunkError::UnknownBlock`] if the filler produced an unregistered id;
    /// the chunk is left all air in that case.
    pub fn fill_with(&mut self, filler: &dyn ChunkFiller) -> Result<(), ChunkError> {
        self.blocks.fill(AIR);
        filler.fill(self.coord, self.dims, &mut self.blocks);

        let unknown = self
            .blocks
            .iter()
            .copied()
            .find(|&id| !self.registry.contains(id));
        if let Some(unknown) = unknown {
            self.blocks.fill(AIR);
            return Err(ChunkError::UnknownBlock(unknown));
        }
        Ok(())
    }

    /// Iterates the non-air cells in (y, x, z) order.
    pub fn iter_blocks(&self) -> ChunkBlockIterator<'_> {
        ChunkBlockIterator::new(&self.blocks, self.dims)
    }

    /// Current neighbour handles.
    pub fn neighbours(&self) -> &NeighbourChunks {
        &self.neighbours
    }

    /// Mutable neighbour handles, maintained by the world.
    pub fn neighbours_mut(&mut self) -> &mut NeighbourChunks {
        &mut self.neighbours
    }

    /// Decides whether a face whose outside cell is `pos` (chunk-local, possibly
    /// outside the chunk) is visible.
    pub fn can_render_facing(&self, pos: Point3<i32>, lookup: &dyn NeighbourLookup) -> bool {
        if pos.y < 0 || pos.y >= self.dims.height as i32 {
            return true;
        }

        let dim = self.dims.dim as i32;
        let side = if pos.x >= dim {
            BlockSide::EAST
        } else if pos.x < 0 {
            BlockSide::WEST
        } else if pos.z >= dim {
            BlockSide::SOUTH
        } else if pos.z < 0 {
            BlockSide::NORTH
        } else {
            return !self
                .get_block(pos)
                .is_some_and(|id| self.registry.occludes(id));
        };

        let wrapped = Point3::new(pos.x.rem_euclid(dim), pos.y, pos.z.rem_euclid(dim));
        match self
            .neighbours
            .get(side)
            .and_then(|handle| lookup.neighbour_block(handle, wrapped))
        {
            Some(id) => !self.registry.occludes(id),
            None => true,
        }
    }

    fn build_vertices(&self, lookup: &dyn NeighbourLookup) -> Vec<PackedVertex> {
        let mut vertices = Vec::new();

        for (local, id) in self.iter_blocks() {
            let block = self.registry.lookup(id);
            if !block.is_cube {
                continue;
            }

            for side in BlockSide::all() {
                if !self.can_render_facing(local + side.offset(), lookup) {
                    continue;
                }

                let texture_id = u32::from(block.texture(side));
                for corner in block.model.face(side).vertices.iter() {
                    let fields = VertexFields {
                        x: local.x as u32 + corner.offset[0],
                        y: local.y as u32 + corner.offset[1],
                        z: local.z as u32 + corner.offset[2],
                        tex_uv: corner.uv,
                        texture_id,
                        shading: corner.shading,
                    };
                    vertices.push(fields.pack());
                }
            }
        }

        vertices
    }

    /// Regenerates the mesh from the current blocks and neighbours.
    ///
    /// The vertex buffer prefix and the indirect command are both rewritten,
    /// then the chunk becomes drawable. An all-air chunk is drawable with an
    /// empty command.
    ///
    /// # Errors
    /// Propagates buffer upload failures; the chunk keeps its previous
    /// drawable state in that case.
    pub fn rebuild_mesh(&mut self, lookup: &dyn NeighbourLookup) -> Result<MeshStats, ChunkError> {
        let start = Instant::now();

        let vertices = self.build_vertices(lookup);
        let quads = (vertices.len() / 4) as u32;

        let mut region = self.vertex_buffer.begin_edit_region(0, vertices.len())?;
        region.extend_from_slice(&vertices)?;
        region.end()?;

        let command = DrawIndirectCommand::for_quads(quads);
        let mut region = self.indirect_buffer.begin_edit_region(0, 1)?;
        region.push(command)?;
        region.end()?;

        self.quad_count = quads;
        self.indirect_command = command;
        self.drawable = true;

        let stats = MeshStats {
            quads,
            indices: command.count,
            elapsed: start.elapsed(),
        };
        log::debug!(
            "Rebuilt chunk {} with {} quads in {:?}",
            self.coord,
            stats.quads,
            stats.elapsed
        );
        Ok(stats)
    }

    /// Rebuilds this chunk after an edit at `local` and reports which live
    /// neighbours share the edited cell's boundary.
    ///
    /// The caller rebuilds the reported neighbours; for a cell in a corner
    /// that is two chunks.
    pub fn update_at_position(
        &mut self,
        local: Point3<i32>,
        lookup: &dyn NeighbourLookup,
    ) -> Result<BoundaryNotifications, ChunkError> {
        let stats = self.rebuild_mesh(lookup)?;

        let dim = self.dims.dim as i32;
        let neighbours = BlockSide::horizontal()
            .into_iter()
            .filter(|side| {
                let outside = local + side.offset();
                !(0..dim).contains(&outside.x) || !(0..dim).contains(&outside.z)
            })
            .filter_map(|side| self.neighbours.get(side).map(|handle| (side, handle)))
            .filter(|&(_, handle)| lookup.is_live(handle))
            .collect();

        Ok(BoundaryNotifications { stats, neighbours })
    }

    /// Submits the chunk's indirect draw. Does nothing until the first rebuild.
    ///
    /// # Returns
    /// `true` if a draw was issued.
    pub fn draw(&self, encoder: &mut dyn ChunkDrawEncoder) -> bool {
        if !self.drawable {
            return false;
        }

        encoder.draw_chunk(&ChunkDrawCall {
            coord: self.coord,
            vertex_buffer: self.vertex_buffer.id(),
            indirect_buffer: self.indirect_buffer.id(),
            origin_buffer: self.origin_buffer.id(),
            index_count: self.indirect_command.count,
        });
        true
    }

    /// Whether the chunk has been meshed at least once.
    pub fn is_drawable(&self) -> bool {
        self.drawable
    }

    /// Visible quads in the current mesh.
    pub fn quad_count(&self) -> u32 {
        self.quad_count
    }

    /// Indices the current draw covers.
    pub fn index_count(&self) -> u32 {
        self.indirect_command.count
    }

    /// The command last written to the indirect buffer.
    pub fn indirect_command(&self) -> DrawIndirectCommand {
        self.indirect_command
    }

    /// Vertex buffer capacity in vertices.
    pub fn vertex_capacity(&self) -> usize {
        self.vertex_buffer.capacity()
    }

    /// The chunk's vertex buffer.
    pub fn vertex_buffer(&self) -> &GpuBuffer<PackedVertex> {
        &self.vertex_buffer
    }

    /// The chunk's indirect command buffer.
    pub fn indirect_buffer(&self) -> &GpuBuffer<DrawIndirectCommand> {
        &self.indirect_buffer
    }
}
