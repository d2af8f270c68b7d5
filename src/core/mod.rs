//! # Core Module
//!
//! Shared-ownership primitives used throughout the engine.
//!
//! The engine runs meshing, block edits, and draw submission on a single
//! thread, so the only container it needs is the single-threaded
//! [`StSystem`]. It is how the buffer registry is handed to the world, to each
//! chunk's buffers, and to the renderer.
//!
//! ## Usage
//! ```rust
//! use voxel_chunk_engine::core::StSystem;
//!
//! let system = StSystem::new(Box::new(42u32));
//! assert_eq!(**system.get(), 42);
//! ```

pub mod st_system;

pub use st_system::StSystem;
