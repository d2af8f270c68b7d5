//! # Block Registry
//!
//! The catalog of block descriptors, indexed by [`BlockId`].
//!
//! The registry is built once, before any chunk exists, and then shared
//! read-only (`Rc<BlockRegistry>`) with the world and every chunk. It can be
//! the built-in [`BlockType`] catalog or a data-driven one loaded from JSON:
//!
//! ```json
//! [
//!     { "name": "air", "cube": false },
//!     { "name": "stone", "textures": 5 },
//!     { "name": "grass", "textures": [2, 2, 3, 1, 2, 2] }
//! ]
//! ```
//!
//! Entries get ids in file order. Entry 0 must be a non-cube block, since id 0
//! is air everywhere in the engine.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::block_type::BlockType;
use super::{Block, BlockId, AIR};

/// Most block types a registry can hold, bounded by the id width.
pub const MAX_BLOCKS: usize = BlockId::MAX as usize + 1;

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The catalog has no entries
    #[error("block catalog is empty")]
    Empty,
    /// Entry 0 is a cube
    #[error("block 0 ('{0}') must be a non-cube air block")]
    FirstNotAir(String),
    /// Two entries share a name
    #[error("block name '{0}' is defined more than once")]
    DuplicateName(String),
    /// More entries than ids
    #[error("block catalog has {0} entries but at most {max} ids exist", max = MAX_BLOCKS)]
    TooMany(usize),
    /// The catalog file could not be read
    #[error("could not read block catalog: {0}")]
    Io(#[from] std::io::Error),
    /// The catalog JSON is malformed
    #[error("invalid block catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Texture layout of a catalog entry: one index for every face, or one per face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TextureLayout {
    /// Same atlas index on all six faces
    All(u8),
    /// Atlas index per face, ordered [EAST, WEST, UP, DOWN, SOUTH, NORTH]
    PerFace([u8; 6]),
}

impl Default for TextureLayout {
    fn default() -> Self {
        TextureLayout::All(0)
    }
}

impl TextureLayout {
    fn layout(self) -> [u8; 6] {
        match self {
            TextureLayout::All(index) => [index; 6],
            TextureLayout::PerFace(layout) => layout,
        }
    }
}

fn default_cube() -> bool {
    true
}

/// One entry of a data-driven catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockDefinition {
    /// Unique block name
    pub name: String,
    /// Whether the block is a full cube (defaults to `true`)
    #[serde(default = "default_cube")]
    pub cube: bool,
    /// Per-face textures (defaults to atlas index 0)
    #[serde(default)]
    pub textures: TextureLayout,
}

/// Maps block ids to their descriptors.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
    by_name: HashMap<String, BlockId>,
}

impl Default for BlockRegistry {
    /// The built-in catalog: one entry per [`BlockType`], ids matching discriminants.
    fn default() -> Self {
        let blocks: Vec<Block> = BlockType::ALL
            .iter()
            .map(|&block_type| {
                if block_type.is_cube() {
                    Block::cube(block_type.name(), block_type.texture_layout())
                } else {
                    Block::non_cube(block_type.name())
                }
            })
            .collect();
        Self::index(blocks)
    }
}

impl BlockRegistry {
    fn index(blocks: Vec<Block>) -> Self {
        let by_name = blocks
            .iter()
            .enumerate()
            .map(|(id, block)| (block.name.clone(), id as BlockId))
            .collect();
        Self { blocks, by_name }
    }

    /// Builds a registry from catalog entries, assigning ids in order.
    ///
    /// # Errors
    /// See [`RegistryError`] for the validation rules.
    pub fn from_definitions(definitions: &[BlockDefinition]) -> Result<Self, RegistryError> {
        let first = definitions.first().ok_or(RegistryError::Empty)?;
        if first.cube {
            return Err(RegistryError::FirstNotAir(first.name.clone()));
        }
        if definitions.len() > MAX_BLOCKS {
            return Err(RegistryError::TooMany(definitions.len()));
        }

        let mut blocks = Vec::with_capacity(definitions.len());
        for definition in definitions {
            if blocks.iter().any(|b: &Block| b.name == definition.name) {
                return Err(RegistryError::DuplicateName(definition.name.clone()));
            }
            blocks.push(if definition.cube {
                Block::cube(definition.name.clone(), definition.textures.layout())
            } else {
                Block::non_cube(definition.name.clone())
            });
        }

        Ok(Self::index(blocks))
    }

    /// Parses and validates a JSON catalog.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let definitions: Vec<BlockDefinition> = serde_json::from_str(json)?;
        Self::from_definitions(&definitions)
    }

    /// Reads, parses and validates a JSON catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns the descriptor of a registered block.
    ///
    /// # Panics
    /// Panics if `id` is not registered. Chunks only ever store ids that came
    /// from this registry, so an unknown id is a bug.
    pub fn lookup(&self, id: BlockId) -> &Block {
        match self.blocks.get(id as usize) {
            Some(block) => block,
            None => panic!(
                "block id {id} is not registered ({} blocks known)",
                self.blocks.len()
            ),
        }
    }

    /// Returns the descriptor of `id`, or `None` if it is not registered.
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id as usize)
    }

    /// Resolves a block name to its id.
    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// Returns `true` if `id` names a registered block.
    pub fn contains(&self, id: BlockId) -> bool {
        (id as usize) < self.blocks.len()
    }

    /// Whether `id` hides the faces of cubes next to it. Unknown ids do not.
    pub fn occludes(&self, id: BlockId) -> bool {
        id != AIR && self.get(id).is_some_and(|block| block.is_cube)
    }

    /// Number of registered blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no blocks are registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates `(id, descriptor)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(id, block)| (id as BlockId, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::block_side::BlockSide;

    #[test]
    fn default_catalog_matches_block_types() {
        let registry = BlockRegistry::default();

        assert_eq!(registry.len(), BlockType::ALL.len());
        for block_type in BlockType::ALL {
            let block = registry.lookup(block_type.id());
            assert_eq!(block.name, block_type.name());
            assert_eq!(block.is_cube, block_type.is_cube());
            assert_eq!(registry.id_of(block_type.name()), Some(block_type.id()));
        }
        assert_eq!(
            registry.lookup(BlockType::GRASS.id()).texture(BlockSide::UP),
            3
        );
    }

    #[test]
    fn air_never_occludes() {
        let registry = BlockRegistry::default();
        assert!(!registry.lookup(AIR).is_cube);
        assert!(!registry.occludes(AIR));
        assert!(registry.occludes(BlockType::STONE.id()));
        assert!(!registry.occludes(200));
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn unknown_ids_panic_in_lookup() {
        BlockRegistry::default().lookup(42);
    }

    #[test]
    fn unknown_ids_are_none_in_get() {
        assert!(BlockRegistry::default().get(42).is_none());
    }

    #[test]
    fn json_catalog_assigns_ids_in_order() {
        let registry = BlockRegistry::from_json_str(
            r#"[
                { "name": "void", "cube": false },
                { "name": "rock", "textures": 7 },
                { "name": "turf", "textures": [1, 1, 2, 3, 1, 1] }
            ]"#,
        )
        .unwrap();

        assert_eq!(registry.id_of("turf"), Some(2));
        assert_eq!(registry.lookup(1).textures, [7; 6]);
        assert_eq!(registry.lookup(2).texture(BlockSide::DOWN), 3);
        assert!(registry.lookup(2).is_cube);
    }

    #[test]
    fn json_catalog_validation() {
        assert!(matches!(
            BlockRegistry::from_json_str("[]"),
            Err(RegistryError::Empty)
        ));
        assert!(matches!(
            BlockRegistry::from_json_str(r#"[{ "name": "rock" }]"#),
            Err(RegistryError::FirstNotAir(name)) if name == "rock"
        ));
        assert!(matches!(
            BlockRegistry::from_json_str(
                r#"[{ "name": "air", "cube": false }, { "name": "a" }, { "name": "a" }]"#
            ),
            Err(RegistryError::DuplicateName(name)) if name == "a"
        ));
        assert!(matches!(
            BlockRegistry::from_json_str(r#"{ "name": "air" }"#),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn oversized_catalogs_are_rejected() {
        let mut definitions = vec![BlockDefinition {
            name: "air".into(),
            cube: false,
            textures: TextureLayout::default(),
        }];
        definitions.extend((1..=MAX_BLOCKS).map(|i| BlockDefinition {
            name: format!("b{i}"),
            cube: true,
            textures: TextureLayout::All(1),
        }));

        assert!(matches!(
            BlockRegistry::from_definitions(&definitions),
            Err(RegistryError::TooMany(257))
        ));
    }
}
