//! Rendering for the voxel engine.
//!
//! Chunks produce packed vertices and one indirect command each; this module
//! defines those formats and turns them into frames:
//!
//! - [`vertex`] and [`indirect`]: the data chunks write to their buffers
//! - [`draw`]: how a chunk hands its buffers to whoever is drawing
//! - [`shader`] and [`renderer`]: the pipeline and per-frame submission
//! - [`camera`], [`texture`] and [`offscreen`]: the fixed view and the
//!   render targets a frame is captured from

pub mod camera;
pub mod draw;
pub mod indirect;
pub mod offscreen;
pub mod renderer;
pub mod shader;
pub mod texture;
pub mod vertex;

pub use draw::{ChunkDrawCall, ChunkDrawEncoder, RecordingEncoder};
pub use indirect::DrawIndirectCommand;
pub use renderer::{ChunkRenderer, RenderError};
pub use vertex::PackedVertex;
