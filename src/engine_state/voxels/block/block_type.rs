//! # Block Type Module
//!
//! The built-in block catalog. [`BlockRegistry::default`](super::registry::BlockRegistry)
//! registers one entry per variant, so a `BlockType` discriminant is also its
//! [`BlockId`] in the default registry.

use num_derive::FromPrimitive;
use phf::phf_map;

use super::BlockId;

/// Enumerates the block types of the default catalog.
///
/// The `FromPrimitive` derive converts stored block ids back into the enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Never meshed and never occludes.
    AIR,

    /// A basic dirt block.
    DIRT,

    /// A grass block: green top, grassy sides, dirt bottom.
    GRASS,

    /// A wooden block with bark on every side.
    WOOD,

    /// A plain white block, handy for debugging.
    WHITE,

    /// Stone, used below the dirt layer by the terrain fillers.
    STONE,
}

/// Default block names, as used in config files.
static BLOCK_NAMES: phf::Map<&'static str, BlockType> = phf_map! {
    "air" => BlockType::AIR,
    "dirt" => BlockType::DIRT,
    "grass" => BlockType::GRASS,
    "wood" => BlockType::WOOD,
    "white" => BlockType::WHITE,
    "stone" => BlockType::STONE,
};

impl BlockType {
    /// Every variant, in id order.
    pub const ALL: [BlockType; 6] = [
        BlockType::AIR,
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::WOOD,
        BlockType::WHITE,
        BlockType::STONE,
    ];

    /// Converts a stored id back into a `BlockType`.
    ///
    /// Returns `None` for ids outside the default catalog.
    pub fn from_id(id: BlockId) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(id)
    }

    /// Looks a block type up by its config name.
    pub fn from_name(name: &str) -> Option<Self> {
        BLOCK_NAMES.get(name).copied()
    }

    /// The id of this type in the default registry.
    pub fn id(self) -> BlockId {
        self as BlockId
    }

    /// Lower-case name used in config files.
    pub fn name(self) -> &'static str {
        match self {
            BlockType::AIR => "air",
            BlockType::DIRT => "dirt",
            BlockType::GRASS => "grass",
            BlockType::WOOD => "wood",
            BlockType::WHITE => "white",
            BlockType::STONE => "stone",
        }
    }

    /// Whether the block is a full cube.
    pub fn is_cube(self) -> bool {
        self != BlockType::AIR
    }

    /// Atlas index of each face, ordered [EAST, WEST, UP, DOWN, SOUTH, NORTH].
    pub fn texture_layout(self) -> [u8; 6] {
        match self {
            BlockType::AIR => [0; 6],
            BlockType::DIRT => [1; 6],
            BlockType::GRASS => [2, 2, 3, 1, 2, 2],
            BlockType::WOOD => [0; 6],
            BlockType::WHITE => [4; 6],
            BlockType::STONE => [5; 6],
        }
    }

    /// Generates a random block type (excluding AIR).
    pub fn get_random_type(rng: &mut fastrand::Rng) -> Self {
        Self::ALL[rng.usize(1..Self::ALL.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_primitive() {
        for block_type in BlockType::ALL {
            assert_eq!(BlockType::from_id(block_type.id()), Some(block_type));
        }
        assert_eq!(BlockType::from_id(BlockType::ALL.len() as BlockId), None);
    }

    #[test]
    fn names_resolve_through_the_static_map() {
        for block_type in BlockType::ALL {
            assert_eq!(BlockType::from_name(block_type.name()), Some(block_type));
        }
        assert_eq!(BlockType::from_name("lava"), None);
    }

    #[test]
    fn random_types_are_never_air() {
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..64 {
            assert_ne!(BlockType::get_random_type(&mut rng), BlockType::AIR);
        }
    }
}
