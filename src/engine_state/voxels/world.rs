//! # World Module
//!
//! This module provides the `World` struct, which owns every loaded chunk and
//! routes block edits to the chunks they affect.
//!
//! ## Architecture
//!
//! Chunks live in a [`ChunkTable`]: a slot vector with a generation counter per
//! slot. Chunks refer to each other through [`ChunkHandle`]s (slot index plus
//! generation), so a handle to an unloaded chunk is detected instead of
//! dangling, even after its slot has been reused.
//!
//! A `BTreeMap` from [`ChunkCoord`] to handle gives O(log n) lookup and a
//! stable draw order.
//!
//! ## Edits
//!
//! [`World::set_block`] resolves the world position with floor division (so
//! negative coordinates land in the right chunk), writes the block, and
//! rebuilds the chunk. Edits on a chunk border also rebuild the live chunk on
//! the other side of that border, so the face between them opens or closes.

use std::collections::BTreeMap;
use std::rc::Rc;

use cgmath::Point3;
use thiserror::Error;

use super::block::block_side::BlockSide;
use super::block::{BlockId, BlockRegistry};
use super::chunk::{
    Chunk, ChunkCoord, ChunkDimensions, ChunkError, MeshStats, NeighbourLookup,
};
use super::generation::{ChunkFiller, EmptyFiller};
use crate::core::StSystem;
use crate::engine_state::buffer_state::BufferState;
use crate::engine_state::rendering::draw::ChunkDrawEncoder;

/// Generational reference to a chunk in a [`ChunkTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    chunk: Option<Chunk>,
    occupied: bool,
}

/// Slot storage for chunks with generation-checked handles.
///
/// Removing a chunk bumps its slot's generation, which invalidates every
/// outstanding handle to it. Freed slots are reused by later inserts.
#[derive(Default)]
pub struct ChunkTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl ChunkTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a chunk and returns its handle.
    pub fn insert(&mut self, chunk: Chunk) -> ChunkHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.chunk = Some(chunk);
            slot.occupied = true;
            return ChunkHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            chunk: Some(chunk),
            occupied: true,
        });
        ChunkHandle {
            index,
            generation: 0,
        }
    }

    fn slot(&self, handle: ChunkHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.occupied && slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: ChunkHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.occupied && slot.generation == handle.generation)
    }

    /// Removes a chunk, expiring every handle to it.
    pub fn remove(&mut self, handle: ChunkHandle) -> Option<Chunk> {
        let slot = self.slot_mut(handle)?;
        let chunk = slot.chunk.take();
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        chunk
    }

    /// The chunk behind `handle`, if it is still loaded.
    pub fn get(&self, handle: ChunkHandle) -> Option<&Chunk> {
        self.slot(handle)?.chunk.as_ref()
    }

    /// Mutable access to the chunk behind `handle`.
    pub fn get_mut(&mut self, handle: ChunkHandle) -> Option<&mut Chunk> {
        self.slot_mut(handle)?.chunk.as_mut()
    }

    /// Moves a chunk out of its slot without expiring its handle.
    ///
    /// While detached, lookups through the handle see nothing. Pair with
    /// [`ChunkTable::restore`].
    pub fn detach(&mut self, handle: ChunkHandle) -> Option<Chunk> {
        self.slot_mut(handle)?.chunk.take()
    }

    /// Puts a detached chunk back.
    ///
    /// # Panics
    /// Panics if the handle is no longer valid, which means the chunk was
    /// removed while detached.
    pub fn restore(&mut self, handle: ChunkHandle, chunk: Chunk) {
        match self.slot_mut(handle) {
            Some(slot) => slot.chunk = Some(chunk),
            None => panic!("restoring chunk into an expired slot {handle:?}"),
        }
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no chunk is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl NeighbourLookup for ChunkTable {
    fn is_live(&self, handle: ChunkHandle) -> bool {
        self.slot(handle).is_some()
    }

    fn neighbour_block(&self, handle: ChunkHandle, local: Point3<i32>) -> Option<BlockId> {
        self.get(handle)?.get_block(local)
    }
}

/// Errors raised by world edits and loading.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The position is above or below the world
    #[error("position {pos:?} is outside the world's vertical range 0..{height}")]
    OutOfRange {
        /// The offending world position
        pos: Point3<i32>,
        /// World height
        height: u32,
    },
    /// No chunk is loaded at the coordinate
    #[error("chunk {0} is not loaded")]
    NotLoaded(ChunkCoord),
    /// The chunk refused the operation
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Summary of the loaded world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Chunks currently loaded
    pub loaded_chunks: usize,
    /// Loaded chunks that have a mesh
    pub drawable_chunks: usize,
    /// Visible quads across all meshes
    pub total_quads: u64,
}

/// Represents a voxel world composed of multiple chunks.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use cgmath::Point3;
/// use voxel_chunk_engine::core::StSystem;
/// use voxel_chunk_engine::engine_state::buffer_state::BufferState;
/// use voxel_chunk_engine::engine_state::voxels::block::BlockRegistry;
/// use voxel_chunk_engine::engine_state::voxels::chunk::{ChunkCoord, ChunkDimensions};
/// use voxel_chunk_engine::engine_state::voxels::world::World;
///
/// let buffer_state = StSystem::new(Box::new(BufferState::headless(1 << 24)));
/// let dims = ChunkDimensions::new(4, 4).unwrap();
/// let mut world = World::new(Rc::new(BlockRegistry::default()), dims, buffer_state);
///
/// world.load_chunk(ChunkCoord::new(-1, 0)).unwrap();
/// world.set_block(Point3::new(-1, 2, 3), 1).unwrap();
///
/// assert_eq!(world.get_block(Point3::new(-1, 2, 3)), Some(1));
/// assert_eq!(world.get_chunk(ChunkCoord::new(-1, 0)).unwrap().quad_count(), 6);
/// ```
pub struct World {
    dims: ChunkDimensions,
    registry: Rc<BlockRegistry>,
    buffer_state: StSystem<BufferState>,
    table: ChunkTable,
    chunks: BTreeMap<ChunkCoord, ChunkHandle>,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Arguments
    /// * `registry` - Block catalog shared with every chunk
    /// * `dims` - Size of every chunk
    /// * `buffer_state` - Registry chunk buffers are allocated in
    pub fn new(
        registry: Rc<BlockRegistry>,
        dims: ChunkDimensions,
        buffer_state: StSystem<BufferState>,
    ) -> Self {
        World {
            dims,
            registry,
            buffer_state,
            table: ChunkTable::new(),
            chunks: BTreeMap::new(),
        }
    }

    /// Size of every chunk.
    pub fn dimensions(&self) -> ChunkDimensions {
        self.dims
    }

    /// The shared block catalog.
    pub fn registry(&self) -> &Rc<BlockRegistry> {
        &self.registry
    }

    /// Loads an all-air chunk. See [`World::load_chunk_with`].
    pub fn load_chunk(&mut self, coord: ChunkCoord) -> Result<ChunkHandle, WorldError> {
        self.load_chunk_with(coord, &EmptyFiller)
    }

    /// Creates a chunk at `coord`, fills it, and links it with the loaded
    /// chunks beside it in both directions.
    ///
    /// The new chunk is not meshed. Loading a coordinate that is already
    /// loaded returns the existing handle and leaves the chunk untouched.
    pub fn load_chunk_with(
        &mut self,
        coord: ChunkCoord,
        filler: &dyn ChunkFiller,
    ) -> Result<ChunkHandle, WorldError> {
        if let Some(&handle) = self.chunks.get(&coord) {
            return Ok(handle);
        }

        let mut chunk = Chunk::new(
            coord,
            self.dims,
            Rc::clone(&self.registry),
            &self.buffer_state,
        )?;
        chunk.fill_with(filler)?;

        let handle = self.table.insert(chunk);
        for side in BlockSide::horizontal() {
            let Some(&other) = self.chunks.get(&coord.neighbour(side)) else {
                continue;
            };
            if let Some(neighbour) = self.table.get_mut(other) {
                neighbour.neighbours_mut().set(side.opposite(), Some(handle));
            }
            if let Some(chunk) = self.table.get_mut(handle) {
                chunk.neighbours_mut().set(side, Some(other));
            }
        }
        self.chunks.insert(coord, handle);

        log::debug!("Loaded chunk {coord}");
        Ok(handle)
    }

    /// Unloads a chunk, clearing the references its neighbours hold first.
    ///
    /// Neighbours are not re-meshed; their border faces open on their next
    /// rebuild. Returns `false` if nothing was loaded at `coord`.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> bool {
        let Some(handle) = self.chunks.remove(&coord) else {
            return false;
        };

        let links: Vec<_> = self
            .table
            .get(handle)
            .map(|chunk| chunk.neighbours().iter().collect())
            .unwrap_or_default();
        for (side, other) in links {
            if let Some(neighbour) = self.table.get_mut(other) {
                neighbour.neighbours_mut().set(side.opposite(), None);
            }
        }

        let removed = self.table.remove(handle).is_some();
        log::debug!("Unloaded chunk {coord}");
        removed
    }

    /// The chunk loaded at `coord`.
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.table.get(*self.chunks.get(&coord)?)
    }

    /// Handle of the chunk loaded at `coord`.
    pub fn handle_of(&self, coord: ChunkCoord) -> Option<ChunkHandle> {
        self.chunks.get(&coord).copied()
    }

    /// Returns `true` if `handle` still names a loaded chunk.
    pub fn is_live(&self, handle: ChunkHandle) -> bool {
        self.table.is_live(handle)
    }

    /// Coordinates of all loaded chunks, in draw order.
    pub fn loaded_coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Splits a world position into chunk coordinate and local position.
    ///
    /// Returns `None` if `pos.y` is outside `0..height`. The chunk does not
    /// need to be loaded.
    pub fn locate(&self, pos: Point3<i32>) -> Option<(ChunkCoord, Point3<i32>)> {
        if pos.y < 0 || pos.y >= self.dims.height() as i32 {
            return None;
        }
        let dim = self.dims.dim() as i32;
        let coord = ChunkCoord::new(pos.x.div_euclid(dim), pos.z.div_euclid(dim));
        let local = Point3::new(pos.x.rem_euclid(dim), pos.y, pos.z.rem_euclid(dim));
        Some((coord, local))
    }

    /// Block at a world position, or `None` if it is outside the world or
    /// its chunk is not loaded.
    pub fn get_block(&self, pos: Point3<i32>) -> Option<BlockId> {
        let (coord, local) = self.locate(pos)?;
        self.get_chunk(coord)?.get_block(local)
    }

    /// Writes a block and updates the affected meshes.
    ///
    /// # Errors
    /// * [`WorldError::OutOfRange`] if `pos.y` is outside the world
    /// * [`WorldError::NotLoaded`] if the chunk holding `pos` is not loaded
    /// * [`WorldError::Chunk`] for unknown ids and buffer failures
    pub fn set_block(&mut self, pos: Point3<i32>, id: BlockId) -> Result<(), WorldError> {
        let (coord, local) = self.locate(pos).ok_or(WorldError::OutOfRange {
            pos,
            height: self.dims.height(),
        })?;
        let handle = self.handle_of(coord).ok_or(WorldError::NotLoaded(coord))?;

        self.table
            .get_mut(handle)
            .ok_or(WorldError::NotLoaded(coord))?
            .set_block(local, id)?;
        self.update_at_position(coord, local)
    }

    /// Rebuilds the chunk at `coord` and, when `local` sits on its border,
    /// the live neighbours across that border.
    pub fn update_at_position(
        &mut self,
        coord: ChunkCoord,
        local: Point3<i32>,
    ) -> Result<(), WorldError> {
        let handle = self.handle_of(coord).ok_or(WorldError::NotLoaded(coord))?;
        let mut chunk = self
            .table
            .detach(handle)
            .ok_or(WorldError::NotLoaded(coord))?;
        let result = chunk.update_at_position(local, &self.table);
        self.table.restore(handle, chunk);

        for (_, neighbour) in result?.neighbours {
            self.rebuild_handle(neighbour)?;
        }
        Ok(())
    }

    fn rebuild_handle(&mut self, handle: ChunkHandle) -> Result<MeshStats, WorldError> {
        let Some(mut chunk) = self.table.detach(handle) else {
            return Ok(MeshStats::default());
        };
        let result = chunk.rebuild_mesh(&self.table);
        self.table.restore(handle, chunk);
        Ok(result?)
    }

    /// Re-meshes the chunk at `coord`.
    pub fn rebuild_chunk(&mut self, coord: ChunkCoord) -> Result<MeshStats, WorldError> {
        let handle = self.handle_of(coord).ok_or(WorldError::NotLoaded(coord))?;
        self.rebuild_handle(handle)
    }

    /// Re-meshes the chunk at `coord` and every loaded chunk beside it.
    ///
    /// Used after loading a chunk next to already-meshed ones, so the faces
    /// along the shared borders close.
    pub fn rebuild_around(&mut self, coord: ChunkCoord) -> Result<MeshStats, WorldError> {
        let mut stats = self.rebuild_chunk(coord)?;
        for side in BlockSide::horizontal() {
            if let Some(handle) = self.handle_of(coord.neighbour(side)) {
                stats += self.rebuild_handle(handle)?;
            }
        }
        Ok(stats)
    }

    /// Re-meshes every loaded chunk.
    pub fn rebuild_all(&mut self) -> Result<MeshStats, WorldError> {
        let handles: Vec<_> = self.chunks.values().copied().collect();
        let mut stats = MeshStats::default();
        for handle in handles {
            stats += self.rebuild_handle(handle)?;
        }
        log::info!(
            "Meshed {} chunks: {} quads in {:?}",
            self.chunks.len(),
            stats.quads,
            stats.elapsed
        );
        Ok(stats)
    }

    /// Submits every drawable chunk in coordinate order.
    ///
    /// # Returns
    /// The number of draws issued.
    pub fn draw(&self, encoder: &mut dyn ChunkDrawEncoder) -> usize {
        self.chunks
            .values()
            .filter_map(|&handle| self.table.get(handle))
            .filter(|chunk| chunk.draw(encoder))
            .count()
    }

    /// Counts loaded chunks, drawable chunks and visible quads.
    pub fn stats(&self) -> WorldStats {
        self.chunks
            .values()
            .filter_map(|&handle| self.table.get(handle))
            .fold(
                WorldStats {
                    loaded_chunks: self.chunks.len(),
                    ..Default::default()
                },
                |mut stats, chunk| {
                    if chunk.is_drawable() {
                        stats.drawable_chunks += 1;
                    }
                    stats.total_quads += u64::from(chunk.quad_count());
                    stats
                },
            )
    }
}
