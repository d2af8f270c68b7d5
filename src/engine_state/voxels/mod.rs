//! # Voxel Engine Core
//!
//! The block grid and everything that turns it into geometry.
//!
//! ## Architecture
//!
//! * **Block**: block ids, descriptors, the cube model and the block registry
//! * **Chunk**: fixed-size block storage, visible-face meshing and draw submission
//! * **World**: chunk ownership, coordinate resolution and edit propagation
//! * **Generation**: fillers that decide what a newly loaded chunk contains
//!
//! ## Data Flow
//!
//! 1. The world receives a block edit at a world position
//! 2. It resolves the owning chunk and writes the block there
//! 3. The chunk rebuilds its mesh, then the world rebuilds any live neighbour
//!    sharing the edited border
//! 4. The renderer picks up the new buffers on the next frame
//!
//! Everything here runs on one thread; see [`crate::core::StSystem`].

pub mod block;
pub mod chunk;
pub mod generation;
pub mod world;
