//! Indirect draw command records.

/// Arguments of one indexed indirect draw, laid out exactly as the GPU reads them.
///
/// A chunk writes a single command per rebuild: `count` is six indices per
/// visible quad and the remaining fields stay at their defaults, so the draw
/// walks the shared quad index buffer from the start against the chunk's own
/// vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawIndirectCommand {
    /// Number of indices to draw
    pub count: u32,
    /// Number of instances to draw
    pub instance_count: u32,
    /// First index in the index buffer
    pub first_index: u32,
    /// Value added to each index before fetching the vertex
    pub base_vertex: i32,
    /// First instance id
    pub base_instance: u32,
}

impl DrawIndirectCommand {
    /// Size of one command in bytes.
    pub const SIZE: usize = std::mem::size_of::<DrawIndirectCommand>();

    /// A single-instance draw of the first `quads` quads.
    pub fn for_quads(quads: u32) -> Self {
        Self {
            count: quads * 6,
            instance_count: 1,
            ..Default::default()
        }
    }

    /// Number of quads the command draws.
    pub fn quads(&self) -> u32 {
        self.count / 6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_gpu_layout() {
        assert_eq!(DrawIndirectCommand::SIZE, 20);

        let command = DrawIndirectCommand::for_quads(3);
        let expected = wgpu::util::DrawIndexedIndirectArgs {
            index_count: 18,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        };
        assert_eq!(bytemuck::bytes_of(&command), expected.as_bytes());
    }

    #[test]
    fn empty_mesh_still_draws_one_instance() {
        let command = DrawIndirectCommand::for_quads(0);
        assert_eq!(command.count, 0);
        assert_eq!(command.instance_count, 1);
        assert_eq!(command.quads(), 0);
    }
}
