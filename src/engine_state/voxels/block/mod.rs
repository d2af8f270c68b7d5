//! # Block Module
//!
//! Block descriptors and the geometry shared by every cube.
//!
//! A chunk stores nothing but [`BlockId`]s. Everything else about a block
//! (whether it is a cube, its model, its per-face textures) lives in a
//! [`Block`] descriptor held by the [`BlockRegistry`], which every chunk
//! shares read-only.

use block_side::BlockSide;

pub mod block_side;
pub mod block_type;
pub mod registry;

pub use registry::{BlockRegistry, RegistryError};

/// The underlying integer type used to store blocks in a chunk.
pub type BlockId = u8;

/// Id reserved for empty space in every registry.
pub const AIR: BlockId = 0;

/// One corner of a model quad.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModelVertex {
    /// Corner position inside the unit cube, each axis 0 or 1
    pub offset: [u32; 3],
    /// Texture corner: 0 lower-left, 1 lower-right, 2 upper-left, 3 upper-right
    pub uv: u32,
    /// Light level, 0..=3
    pub shading: u32,
}

/// Four corners ordered lower-left, lower-right, upper-left, upper-right as
/// seen from outside the block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Quad {
    /// The corners
    pub vertices: [ModelVertex; 4],
}

/// The six face quads of a block, indexed by [`BlockSide`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockModel {
    /// One quad per face
    pub quads: [Quad; 6],
}

impl BlockModel {
    /// Quad for the given face.
    pub fn face(&self, side: BlockSide) -> &Quad {
        &self.quads[side.index()]
    }
}

const fn corner(offset: [u32; 3], uv: u32, shading: u32) -> ModelVertex {
    ModelVertex {
        offset,
        uv,
        shading,
    }
}

const fn face(corners: [[u32; 3]; 4], shading: u32) -> Quad {
    Quad {
        vertices: [
            corner(corners[0], 0, shading),
            corner(corners[1], 1, shading),
            corner(corners[2], 2, shading),
            corner(corners[3], 3, shading),
        ],
    }
}

/// The unit cube. With the shared index pattern `[0, 1, 3, 0, 3, 2]` every face
/// produces two counter-clockwise triangles seen from outside.
pub const CUBE_MODEL: BlockModel = BlockModel {
    quads: [
        // EAST
        face([[1, 0, 1], [1, 0, 0], [1, 1, 1], [1, 1, 0]], 2),
        // WEST
        face([[0, 0, 0], [0, 0, 1], [0, 1, 0], [0, 1, 1]], 2),
        // UP
        face([[0, 1, 1], [1, 1, 1], [0, 1, 0], [1, 1, 0]], 3),
        // DOWN
        face([[0, 0, 0], [1, 0, 0], [0, 0, 1], [1, 0, 1]], 1),
        // SOUTH
        face([[0, 0, 1], [1, 0, 1], [0, 1, 1], [1, 1, 1]], 2),
        // NORTH
        face([[1, 0, 0], [0, 0, 0], [1, 1, 0], [0, 1, 0]], 2),
    ],
};

/// Immutable description of a block type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Name used in config files and logs
    pub name: String,
    /// Full cubes are meshed and hide the faces of neighbouring cubes
    pub is_cube: bool,
    /// Geometry, one quad per face
    pub model: &'static BlockModel,
    /// Atlas index of each face, ordered like [`BlockSide::all`]
    pub textures: [u8; 6],
}

impl Block {
    /// Creates a cube block.
    pub fn cube(name: impl Into<String>, textures: [u8; 6]) -> Self {
        Block {
            name: name.into(),
            is_cube: true,
            model: &CUBE_MODEL,
            textures,
        }
    }

    /// Creates a block that is never meshed and never occludes.
    pub fn non_cube(name: impl Into<String>) -> Self {
        Block {
            name: name.into(),
            is_cube: false,
            model: &CUBE_MODEL,
            textures: [0; 6],
        }
    }

    /// Atlas index of the given face.
    pub fn texture(&self, side: BlockSide) -> u8 {
        self.textures[side.index()]
    }
}
