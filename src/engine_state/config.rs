//! Engine configuration.
//!
//! Everything the engine needs to know at start-up lives in [`EngineConfig`]:
//! chunk dimensions, how many chunks to load and how to fill them, buffer
//! limits for the host backend, and the offscreen frame to render. The config
//! is plain JSON and every field has a default, so an empty object (or no file
//! at all) is a valid configuration.
//!
//! ```json
//! {
//!     "chunk": { "dim": 16, "height": 64 },
//!     "world": { "radius": 2, "terrain": { "kind": "perlin", "seed": 7 } },
//!     "render": { "width": 1280, "height": 720, "output": "frame.png" }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::voxels::chunk::ChunkDimensions;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("could not read config file '{path}'")]
    Io {
        /// Path that failed to load
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
    /// The config text is not valid JSON for [`EngineConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    /// Chunk dimensions do not fit the packed vertex format
    #[error(
        "invalid chunk dimensions {dim}x{dim}x{height}: dim must be in 1..={max_dim}, height in 1..={max_height}"
    )]
    InvalidDimensions {
        /// Requested horizontal size
        dim: u32,
        /// Requested vertical size
        height: u32,
        /// Largest horizontal size the vertex format can address
        max_dim: u32,
        /// Largest vertical size the vertex format can address
        max_height: u32,
    },
    /// A block name in the config is not in the registry
    #[error("unknown block '{0}'")]
    UnknownBlock(String),
}

/// Chunk size, threaded into every chunk and the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Horizontal edge length in blocks
    pub dim: u32,
    /// Vertical size in blocks
    pub height: u32,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            dim: 16,
            height: 64,
        }
    }
}

/// How freshly loaded chunks are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainConfig {
    /// All air
    Empty,
    /// Solid ground up to `height` (exclusive) made of `block`
    Flat {
        /// Number of solid layers
        height: u32,
        /// Block name used for every layer
        block: String,
    },
    /// Perlin heightmap with grass over dirt over stone
    Perlin {
        /// Noise seed
        seed: u32,
    },
    /// Random blocks at the given density, for stress testing
    Scatter {
        /// Fraction of cells that become solid
        density: f64,
        /// Random seed
        seed: u64,
    },
}

impl Default for TerrainConfig {
    fn default() -> Self {
        TerrainConfig::Perlin { seed: 0 }
    }
}

/// Which chunks the world loads at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunks are loaded for every grid cell with |x|, |z| < radius
    pub radius: i32,
    /// Terrain used to fill newly loaded chunks
    pub terrain: TerrainConfig,
    /// Optional JSON block catalog replacing the default registry
    pub blocks: Option<PathBuf>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            terrain: TerrainConfig::default(),
            blocks: None,
        }
    }
}

/// Host-memory backend limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Largest single allocation the host backend accepts, in bytes
    pub max_host_buffer_size: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_host_buffer_size: 256 << 20,
        }
    }
}

/// Offscreen frame settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Where the captured frame is written
    pub output: PathBuf,
    /// Camera eye position in world space
    pub eye: [f32; 3],
    /// Point the camera looks at
    pub target: [f32; 3],
    /// Optional vertex shader override (WGSL)
    pub vertex_shader: Option<PathBuf>,
    /// Optional fragment shader override (WGSL)
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            output: PathBuf::from("frame.png"),
            eye: [-40.0, 80.0, -40.0],
            target: [8.0, 20.0, 8.0],
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chunk dimensions
    pub chunk: ChunkConfig,
    /// World loading
    pub world: WorldConfig,
    /// Host buffer limits
    pub buffers: BufferConfig,
    /// Offscreen rendering
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Parses a config from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Validates the chunk section and returns the dimensions to build with.
    pub fn chunk_dimensions(&self) -> Result<ChunkDimensions, ConfigError> {
        ChunkDimensions::new(self.chunk.dim, self.chunk.height)
    }
}
