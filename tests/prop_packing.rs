use cgmath::Point3;
use proptest::prelude::*;
use voxel_chunk_engine::engine_state::rendering::vertex::{
    VertexFields, MAX_SHADING, MAX_TEXTURE, MAX_UV, MAX_X, MAX_Y, MAX_Z,
};
use voxel_chunk_engine::engine_state::rendering::DrawIndirectCommand;
use voxel_chunk_engine::engine_state::voxels::chunk::ChunkDimensions;

fn arb_fields() -> impl Strategy<Value = VertexFields> {
    (
        0..=MAX_X,
        0..=MAX_Y,
        0..=MAX_Z,
        0..=MAX_UV,
        0..=MAX_TEXTURE,
        0..=MAX_SHADING,
    )
        .prop_map(|(x, y, z, tex_uv, texture_id, shading)| VertexFields {
            x,
            y,
            z,
            tex_uv,
            texture_id,
            shading,
        })
}

fn arb_dims() -> impl Strategy<Value = ChunkDimensions> {
    (1..=ChunkDimensions::MAX_DIM, 1..=64u32)
        .prop_map(|(dim, height)| ChunkDimensions::new(dim, height).unwrap())
}

proptest! {
    // Every in-range vertex survives packing unchanged.
    #[test]
    fn vertex_fields_round_trip(fields in arb_fields()) {
        prop_assert!(fields.fits());
        prop_assert_eq!(fields.pack().unpack(), fields);
    }

    // Changing one field never disturbs the others.
    #[test]
    fn fields_do_not_overlap(fields in arb_fields(), texture_id in 0..=MAX_TEXTURE) {
        let changed = VertexFields { texture_id, ..fields };
        let unpacked = changed.pack().unpack();
        prop_assert_eq!(unpacked.texture_id, texture_id);
        prop_assert_eq!(VertexFields { texture_id: fields.texture_id, ..unpacked }, fields);
    }

    // Index and position are inverse over the whole chunk.
    #[test]
    fn chunk_index_round_trips(dims in arb_dims(), seed in any::<usize>()) {
        let index = seed % dims.block_count();
        let position = dims.position(index);
        prop_assert!(dims.contains(position));
        prop_assert_eq!(dims.index(position), Some(index));
    }

    // Positions one step outside any face have no index.
    #[test]
    fn outside_positions_have_no_index(dims in arb_dims(), a in any::<u16>(), b in any::<u16>()) {
        let dim = dims.dim() as i32;
        let height = dims.height() as i32;
        let u = i32::from(a) % dim;
        let v = i32::from(b) % dim;
        let w = i32::from(b) % height;

        prop_assert_eq!(dims.index(Point3::new(-1, w, u)), None);
        prop_assert_eq!(dims.index(Point3::new(dim, w, u)), None);
        prop_assert_eq!(dims.index(Point3::new(u, -1, v)), None);
        prop_assert_eq!(dims.index(Point3::new(u, height, v)), None);
        prop_assert_eq!(dims.index(Point3::new(u, w, -1)), None);
        prop_assert_eq!(dims.index(Point3::new(u, w, dim)), None);
    }

    #[test]
    fn indirect_commands_draw_six_indices_per_quad(quads in 0..1_000_000u32) {
        let command = DrawIndirectCommand::for_quads(quads);
        prop_assert_eq!(command.count, quads * 6);
        prop_assert_eq!(command.quads(), quads);
        prop_assert_eq!(command.instance_count, 1);
    }
}

#[test]
fn maxima_pack_to_all_ones() {
    let fields = VertexFields {
        x: MAX_X,
        y: MAX_Y,
        z: MAX_Z,
        tex_uv: MAX_UV,
        texture_id: MAX_TEXTURE,
        shading: MAX_SHADING,
    };
    assert_eq!(fields.pack().bits(), u32::MAX);
    assert_eq!(fields.pack().unpack(), fields);
}
