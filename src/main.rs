//! # Voxel Chunk Engine Entry Point
//!
//! Calls into the library's `run()` and exits non-zero on failure.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --config world.json --output frame.png
//! ```

fn main() -> anyhow::Result<()> {
    voxel_chunk_engine::run()
}
