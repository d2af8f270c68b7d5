//! # Block Side Module
//!
//! The six faces of a voxel block and the direction each one points in.

use cgmath::Vector3;

/// One of the six faces of a block, named by the direction it faces.
///
/// The discriminant is the face's index in a [`BlockModel`](super::BlockModel)
/// and in a block's texture layout. The order is:
/// [EAST, WEST, UP, DOWN, SOUTH, NORTH]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// Facing +X
    EAST = 0,

    /// Facing -X
    WEST = 1,

    /// Facing +Y
    UP = 2,

    /// Facing -Y
    DOWN = 3,

    /// Facing +Z
    SOUTH = 4,

    /// Facing -Z
    NORTH = 5,
}

impl BlockSide {
    /// All six faces in model order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::EAST,
            BlockSide::WEST,
            BlockSide::UP,
            BlockSide::DOWN,
            BlockSide::SOUTH,
            BlockSide::NORTH,
        ]
    }

    /// The four faces that can border another chunk.
    pub fn horizontal() -> [BlockSide; 4] {
        [
            BlockSide::EAST,
            BlockSide::WEST,
            BlockSide::SOUTH,
            BlockSide::NORTH,
        ]
    }

    /// Index of this face in models and texture layouts.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Unit step from a block to the neighbour this face touches.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::EAST => Vector3::new(1, 0, 0),
            BlockSide::WEST => Vector3::new(-1, 0, 0),
            BlockSide::UP => Vector3::new(0, 1, 0),
            BlockSide::DOWN => Vector3::new(0, -1, 0),
            BlockSide::SOUTH => Vector3::new(0, 0, 1),
            BlockSide::NORTH => Vector3::new(0, 0, -1),
        }
    }

    /// The face pointing the other way.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::EAST => BlockSide::WEST,
            BlockSide::WEST => BlockSide::EAST,
            BlockSide::UP => BlockSide::DOWN,
            BlockSide::DOWN => BlockSide::UP,
            BlockSide::SOUTH => BlockSide::NORTH,
            BlockSide::NORTH => BlockSide::SOUTH,
        }
    }

    /// Fixed light level baked into the face's vertices (0..=3).
    pub fn shading(self) -> u32 {
        match self {
            BlockSide::UP => 3,
            BlockSide::EAST | BlockSide::WEST => 2,
            BlockSide::SOUTH | BlockSide::NORTH => 2,
            BlockSide::DOWN => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_model_order() {
        for (i, side) in BlockSide::all().into_iter().enumerate() {
            assert_eq!(side.index(), i);
        }
    }

    #[test]
    fn opposite_faces_cancel_out() {
        for side in BlockSide::all() {
            assert_eq!(side.offset() + side.opposite().offset(), Vector3::new(0, 0, 0));
            assert_eq!(side.opposite().opposite(), side);
        }
    }

    #[test]
    fn horizontal_faces_never_move_vertically() {
        assert!(BlockSide::horizontal().iter().all(|side| side.offset().y == 0));
    }
}
