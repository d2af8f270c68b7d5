//! # Chunk Generation
//!
//! Fillers decide what a freshly loaded chunk contains. They stand in for a
//! real world generator: the world only needs something that writes block ids
//! into a chunk's storage.
//!
//! Every filler is deterministic for a given chunk coordinate, so reloading a
//! chunk reproduces it exactly.

use noise::{NoiseFn, Perlin};

use super::block::block_type::BlockType;
use super::block::{BlockId, BlockRegistry, AIR};
use super::chunk::{ChunkCoord, ChunkDimensions};
use crate::engine_state::config::{ConfigError, TerrainConfig};

/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.03;

/// Writes the initial contents of a chunk.
pub trait ChunkFiller {
    /// Fills `blocks`, laid out as described by `dims`, for the chunk at `coord`.
    ///
    /// `blocks` is all air on entry.
    fn fill(&self, coord: ChunkCoord, dims: ChunkDimensions, blocks: &mut [BlockId]);
}

/// Leaves chunks empty.
pub struct EmptyFiller;

impl ChunkFiller for EmptyFiller {
    fn fill(&self, _coord: ChunkCoord, _dims: ChunkDimensions, _blocks: &mut [BlockId]) {}
}

/// Fills the bottom `height` layers with one block.
pub struct FlatFiller {
    /// Number of solid layers, clamped to the chunk height
    pub height: u32,
    /// Block used for every solid layer
    pub block: BlockId,
}

impl ChunkFiller for FlatFiller {
    fn fill(&self, _coord: ChunkCoord, dims: ChunkDimensions, blocks: &mut [BlockId]) {
        let layer = (dims.dim() * dims.dim()) as usize;
        let layers = self.height.min(dims.height()) as usize;
        blocks[..layer * layers].fill(self.block);
    }
}

/// Rolling hills from a 2D Perlin heightmap.
///
/// Columns are `surface` on top, `subsurface` for the next few layers and
/// `deep` below that.
pub struct PerlinFiller {
    perlin: Perlin,
    /// Top block of each column
    pub surface: BlockId,
    /// Blocks just under the surface
    pub subsurface: BlockId,
    /// Everything deeper
    pub deep: BlockId,
}

impl PerlinFiller {
    /// Depth of the subsurface layer.
    const SUBSURFACE_DEPTH: i32 = 3;

    /// Creates a filler using the default grass, dirt and stone blocks.
    pub fn new(seed: u32) -> Self {
        Self::with_blocks(
            seed,
            BlockType::GRASS.id(),
            BlockType::DIRT.id(),
            BlockType::STONE.id(),
        )
    }

    /// Creates a filler with explicit layer blocks.
    pub fn with_blocks(seed: u32, surface: BlockId, subsurface: BlockId, deep: BlockId) -> Self {
        Self {
            perlin: Perlin::new(seed),
            surface,
            subsurface,
            deep,
        }
    }

    /// Height of the terrain column at a world x/z.
    pub fn column_height(&self, x: i32, z: i32, dims: ChunkDimensions) -> i32 {
        let height = dims.height() as f64;
        let sample = self.perlin.get([
            x as f64 * PERLIN_SCALE_FACTOR,
            z as f64 * PERLIN_SCALE_FACTOR,
        ]);
        let surface = height * 0.4 + sample * height * 0.25;
        (surface as i32).clamp(1, dims.height() as i32)
    }
}

impl ChunkFiller for PerlinFiller {
    fn fill(&self, coord: ChunkCoord, dims: ChunkDimensions, blocks: &mut [BlockId]) {
        let origin = coord.origin(dims);
        let dim = dims.dim() as i32;

        for x in 0..dim {
            for z in 0..dim {
                let top = self.column_height(origin.x + x, origin.z + z, dims);
                for y in 0..top {
                    let id = if y == top - 1 {
                        self.surface
                    } else if y >= top - 1 - Self::SUBSURFACE_DEPTH {
                        self.subsurface
                    } else {
                        self.deep
                    };
                    if let Some(index) = dims.index(cgmath::Point3::new(x, y, z)) {
                        blocks[index] = id;
                    }
                }
            }
        }
    }
}

/// Random solid blocks at a fixed density, for stress testing.
pub struct ScatterFiller {
    /// Fraction of cells that become solid
    pub density: f64,
    /// Base random seed
    pub seed: u64,
    /// Blocks to pick from
    pub palette: Vec<BlockId>,
}

impl ScatterFiller {
    /// Creates a filler that picks from every cube in `registry`.
    pub fn new(density: f64, seed: u64, registry: &BlockRegistry) -> Self {
        let palette = registry
            .iter()
            .filter(|(_, block)| block.is_cube)
            .map(|(id, _)| id)
            .collect();
        Self {
            density,
            seed,
            palette,
        }
    }
}

impl ChunkFiller for ScatterFiller {
    fn fill(&self, coord: ChunkCoord, _dims: ChunkDimensions, blocks: &mut [BlockId]) {
        if self.palette.is_empty() {
            return;
        }

        let chunk_seed = self.seed
            ^ (coord.x as u32 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (coord.z as u32 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        let mut rng = fastrand::Rng::with_seed(chunk_seed);

        for block in blocks.iter_mut() {
            *block = if rng.f64() < self.density {
                self.palette[rng.usize(..self.palette.len())]
            } else {
                AIR
            };
        }
    }
}

fn resolve(registry: &BlockRegistry, name: &str) -> Result<BlockId, ConfigError> {
    registry
        .id_of(name)
        .ok_or_else(|| ConfigError::UnknownBlock(name.to_string()))
}

/// Builds the filler described by a terrain config, resolving block names
/// against `registry`.
pub fn filler_from_config(
    config: &TerrainConfig,
    registry: &BlockRegistry,
) -> Result<Box<dyn ChunkFiller>, ConfigError> {
    Ok(match config {
        TerrainConfig::Empty => Box::new(EmptyFiller),
        TerrainConfig::Flat { height, block } => Box::new(FlatFiller {
            height: *height,
            block: resolve(registry, block)?,
        }),
        TerrainConfig::Perlin { seed } => Box::new(PerlinFiller::with_blocks(
            *seed,
            resolve(registry, BlockType::GRASS.name())?,
            resolve(registry, BlockType::DIRT.name())?,
            resolve(registry, BlockType::STONE.name())?,
        )),
        TerrainConfig::Scatter { density, seed } => {
            Box::new(ScatterFiller::new(*density, *seed, registry))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> ChunkDimensions {
        ChunkDimensions::new(4, 16).unwrap()
    }

    fn filled(filler: &dyn ChunkFiller, coord: ChunkCoord) -> Vec<BlockId> {
        let mut blocks = vec![AIR; dims().block_count()];
        filler.fill(coord, dims(), &mut blocks);
        blocks
    }

    #[test]
    fn flat_fills_whole_layers() {
        let blocks = filled(&FlatFiller { height: 2, block: 5 }, ChunkCoord::new(0, 0));
        let layer = 16;

        assert!(blocks[..2 * layer].iter().all(|&id| id == 5));
        assert!(blocks[2 * layer..].iter().all(|&id| id == AIR));
    }

    #[test]
    fn flat_is_clamped_to_the_chunk() {
        let blocks = filled(&FlatFiller { height: 99, block: 1 }, ChunkCoord::new(0, 0));
        assert!(blocks.iter().all(|&id| id == 1));
    }

    #[test]
    fn perlin_columns_are_layered() {
        let filler = PerlinFiller::new(7);
        let dims = dims();
        let blocks = filled(&filler, ChunkCoord::new(2, -3));

        for x in 0..4 {
            for z in 0..4 {
                let column: Vec<_> = (0..16)
                    .map(|y| blocks[dims.index(cgmath::Point3::new(x, y, z)).unwrap()])
                    .collect();
                let top = column.iter().rposition(|&id| id != AIR).unwrap();

                assert_eq!(column[top], BlockType::GRASS.id());
                assert!(column[..top].iter().all(|&id| id != AIR));
                assert!(column[top + 1..].iter().all(|&id| id == AIR));
            }
        }
    }

    #[test]
    fn fillers_are_deterministic() {
        let registry = BlockRegistry::default();
        let scatter = ScatterFiller::new(0.3, 11, &registry);
        let coord = ChunkCoord::new(-1, 4);

        assert_eq!(filled(&scatter, coord), filled(&scatter, coord));
        assert_ne!(filled(&scatter, coord), filled(&scatter, ChunkCoord::new(0, 4)));
        assert_eq!(
            filled(&PerlinFiller::new(3), coord),
            filled(&PerlinFiller::new(3), coord)
        );
    }

    #[test]
    fn scatter_never_places_air_from_its_palette() {
        let registry = BlockRegistry::default();
        let scatter = ScatterFiller::new(1.0, 1, &registry);
        assert!(filled(&scatter, ChunkCoord::new(0, 0)).iter().all(|&id| id != AIR));
    }

    #[test]
    fn config_names_must_exist() {
        let registry = BlockRegistry::default();
        let config = TerrainConfig::Flat {
            height: 1,
            block: "obsidian".to_string(),
        };

        assert!(matches!(
            filler_from_config(&config, &registry),
            Err(ConfigError::UnknownBlock(name)) if name == "obsidian"
        ));
        assert!(filler_from_config(&TerrainConfig::default(), &registry).is_ok());
    }
}
