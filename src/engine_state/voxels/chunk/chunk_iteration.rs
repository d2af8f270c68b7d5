//! # Chunk Iteration Module
//!
//! An iterator over the non-air cells of a chunk.
//!
//! Because the block vector is laid out `((y * dim) + x) * dim + z`, walking
//! it front to back visits cells in (y, x, z) order. The iterator only has to
//! skip air and turn each flat index back into a local position.

use cgmath::Point3;

use crate::engine_state::voxels::block::{BlockId, AIR};

use super::ChunkDimensions;

/// An iterator over all non-air blocks in a chunk, yielding
/// `(local position, block id)` in (y, x, z) order.
pub struct ChunkBlockIterator<'a> {
    /// The chunk's flat block storage
    blocks: &'a [BlockId],
    /// Dimensions used to decode flat indices
    dims: ChunkDimensions,
    /// Next flat index to inspect
    current_offset: usize,
}

impl<'a> ChunkBlockIterator<'a> {
    /// Creates an iterator over `blocks`, laid out according to `dims`.
    pub fn new(blocks: &'a [BlockId], dims: ChunkDimensions) -> Self {
        ChunkBlockIterator {
            blocks,
            dims,
            current_offset: 0,
        }
    }
}

impl Iterator for ChunkBlockIterator<'_> {
    type Item = (Point3<i32>, BlockId);

    fn next(&mut self) -> Option<Self::Item> {
        while self.current_offset < self.blocks.len() {
            let offset = self.current_offset;
            self.current_offset += 1;

            let id = self.blocks[offset];
            if id != AIR {
                return Some((self.dims.position(offset), id));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.blocks.len() - self.current_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_air_and_keeps_scan_order() {
        let dims = ChunkDimensions::new(2, 2).unwrap();
        let mut blocks = vec![AIR; dims.block_count()];
        let cells = [
            (Point3::new(1, 1, 0), 4),
            (Point3::new(0, 0, 1), 1),
            (Point3::new(1, 0, 0), 2),
        ];
        for (pos, id) in cells {
            blocks[dims.index(pos).unwrap()] = id;
        }

        let visited: Vec<_> = ChunkBlockIterator::new(&blocks, dims).collect();
        assert_eq!(
            visited,
            vec![
                (Point3::new(0, 0, 1), 1),
                (Point3::new(1, 0, 0), 2),
                (Point3::new(1, 1, 0), 4),
            ]
        );
    }

    #[test]
    fn empty_chunks_yield_nothing() {
        let dims = ChunkDimensions::new(3, 3).unwrap();
        let blocks = vec![AIR; dims.block_count()];
        assert_eq!(ChunkBlockIterator::new(&blocks, dims).count(), 0);
    }
}
