use std::rc::Rc;

use cgmath::Point3;
use voxel_chunk_engine::core::StSystem;
use voxel_chunk_engine::engine_state::buffer_state::BufferState;
use voxel_chunk_engine::engine_state::rendering::{DrawIndirectCommand, RecordingEncoder};
use voxel_chunk_engine::engine_state::voxels::block::block_type::BlockType;
use voxel_chunk_engine::engine_state::voxels::block::BlockRegistry;
use voxel_chunk_engine::engine_state::voxels::chunk::{
    Chunk, ChunkCoord, ChunkDimensions, NoNeighbours,
};
use voxel_chunk_engine::engine_state::voxels::generation::{FlatFiller, PerlinFiller};
use voxel_chunk_engine::engine_state::voxels::world::World;

fn buffers() -> StSystem<BufferState> {
    StSystem::new(Box::new(BufferState::headless(1 << 26)))
}

fn world(dim: u32, height: u32) -> World {
    World::new(
        Rc::new(BlockRegistry::default()),
        ChunkDimensions::new(dim, height).unwrap(),
        buffers(),
    )
}

fn stone() -> u8 {
    BlockType::STONE.id()
}

fn solid(height: u32) -> FlatFiller {
    FlatFiller {
        height,
        block: stone(),
    }
}

fn quads(world: &World, x: i32, z: i32) -> u32 {
    world.get_chunk(ChunkCoord::new(x, z)).unwrap().quad_count()
}

#[test]
fn air_chunk_is_drawable_with_no_indices() {
    let mut world = world(4, 4);
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();
    world.rebuild_chunk(ChunkCoord::new(0, 0)).unwrap();

    let chunk = world.get_chunk(ChunkCoord::new(0, 0)).unwrap();
    assert!(chunk.is_drawable());
    assert_eq!(chunk.index_count(), 0);
    assert_eq!(chunk.indirect_command(), DrawIndirectCommand::for_quads(0));
}

#[test]
fn single_block_in_tiny_chunk_has_six_faces() {
    let state = buffers();
    let mut chunk = Chunk::new(
        ChunkCoord::new(0, 0),
        ChunkDimensions::new(2, 2).unwrap(),
        Rc::new(BlockRegistry::default()),
        &state,
    )
    .unwrap();
    chunk.set_block(Point3::new(0, 0, 0), stone()).unwrap();

    let stats = chunk.rebuild_mesh(&NoNeighbours).unwrap();

    assert_eq!(stats.quads, 6);
    assert_eq!(stats.indices, 36);
    assert_eq!(chunk.index_count(), 36);
    let command = chunk.indirect_buffer().read_back().unwrap()[0];
    assert_eq!(command.count, 36);
    assert_eq!(command.instance_count, 1);
    assert_eq!(command.first_index, 0);
    assert_eq!(command.base_vertex, 0);
    assert_eq!(command.base_instance, 0);
}

#[test]
fn solid_chunk_surrounded_by_solid_chunks_keeps_only_top_and_bottom() {
    let (dim, height) = (4, 3);
    let mut world = world(dim, height);
    let centre = ChunkCoord::new(0, 0);
    world.load_chunk_with(centre, &solid(height)).unwrap();
    for (x, z) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
        world
            .load_chunk_with(ChunkCoord::new(x, z), &solid(height))
            .unwrap();
    }

    world.rebuild_chunk(centre).unwrap();

    assert_eq!(quads(&world, 0, 0), 2 * dim * dim);
}

#[test]
fn rebuilding_without_edits_is_byte_identical() {
    let mut world = world(8, 32);
    let filler = PerlinFiller::new(42);
    for x in -1..=1 {
        for z in -1..=1 {
            world.load_chunk_with(ChunkCoord::new(x, z), &filler).unwrap();
        }
    }
    world.rebuild_all().unwrap();

    let chunk = world.get_chunk(ChunkCoord::new(0, 0)).unwrap();
    let vertices = chunk.vertex_buffer().read_back().unwrap();
    let command = chunk.indirect_command();

    world.rebuild_all().unwrap();

    let chunk = world.get_chunk(ChunkCoord::new(0, 0)).unwrap();
    assert_eq!(chunk.vertex_buffer().read_back().unwrap(), vertices);
    assert_eq!(chunk.indirect_command(), command);
}

#[test]
fn boundary_edit_rebuilds_the_west_neighbour() {
    let mut world = world(4, 4);
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();
    world.load_chunk(ChunkCoord::new(-1, 0)).unwrap();
    world.set_block(Point3::new(-1, 1, 2), stone()).unwrap();
    assert_eq!(quads(&world, -1, 0), 6);

    // Local (0, 1, 2) of chunk (0, 0), touching the block above.
    world.set_block(Point3::new(0, 1, 2), stone()).unwrap();

    assert_eq!(quads(&world, 0, 0), 5);
    assert_eq!(quads(&world, -1, 0), 5);
}

#[test]
fn corner_edit_rebuilds_both_neighbours() {
    let mut world = world(4, 4);
    for (x, z) in [(0, 0), (-1, 0), (0, -1)] {
        world.load_chunk(ChunkCoord::new(x, z)).unwrap();
    }
    world.set_block(Point3::new(-1, 0, 0), stone()).unwrap();
    world.set_block(Point3::new(0, 0, -1), stone()).unwrap();

    world.set_block(Point3::new(0, 0, 0), stone()).unwrap();

    assert_eq!(quads(&world, 0, 0), 4);
    assert_eq!(quads(&world, -1, 0), 5);
    assert_eq!(quads(&world, 0, -1), 5);
}

#[test]
fn edit_next_to_an_unloaded_neighbour_only_touches_its_chunk() {
    let mut world = world(4, 4);
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();
    world.load_chunk(ChunkCoord::new(-1, 0)).unwrap();
    let west = world.handle_of(ChunkCoord::new(-1, 0)).unwrap();
    assert!(world.unload_chunk(ChunkCoord::new(-1, 0)));
    assert!(!world.is_live(west));

    world.set_block(Point3::new(0, 0, 0), stone()).unwrap();

    assert_eq!(quads(&world, 0, 0), 6);
    assert!(world.get_chunk(ChunkCoord::new(-1, 0)).is_none());
}

#[test]
fn unloading_a_neighbour_opens_the_shared_border() {
    let (dim, height) = (4, 2);
    let mut world = world(dim, height);
    world.load_chunk_with(ChunkCoord::new(0, 0), &solid(height)).unwrap();
    world.load_chunk_with(ChunkCoord::new(1, 0), &solid(height)).unwrap();
    world.rebuild_all().unwrap();
    let before = quads(&world, 0, 0);

    assert!(world.unload_chunk(ChunkCoord::new(1, 0)));
    world.rebuild_chunk(ChunkCoord::new(0, 0)).unwrap();

    assert_eq!(quads(&world, 0, 0), before + dim * height);
}

#[test]
fn loading_beside_a_meshed_chunk_closes_the_border_after_rebuild_around() {
    let (dim, height) = (4, 2);
    let mut world = world(dim, height);
    world.load_chunk_with(ChunkCoord::new(0, 0), &solid(height)).unwrap();
    world.rebuild_all().unwrap();
    let alone = quads(&world, 0, 0);

    world.load_chunk_with(ChunkCoord::new(0, 1), &solid(height)).unwrap();
    world.rebuild_around(ChunkCoord::new(0, 1)).unwrap();

    assert_eq!(quads(&world, 0, 0), alone - dim * height);
    assert_eq!(quads(&world, 0, 1), alone - dim * height);
}

#[test]
fn negative_world_positions_land_in_negative_chunks() {
    let mut world = world(4, 4);
    world.load_chunk(ChunkCoord::new(-1, -1)).unwrap();

    world.set_block(Point3::new(-1, 3, -4), stone()).unwrap();

    let chunk = world.get_chunk(ChunkCoord::new(-1, -1)).unwrap();
    assert_eq!(chunk.get_block(Point3::new(3, 3, 0)), Some(stone()));
    assert_eq!(world.get_block(Point3::new(-1, 3, -4)), Some(stone()));
    assert_eq!(chunk.quad_count(), 6);
}

#[test]
fn world_draw_records_one_call_per_chunk() {
    let mut world = world(2, 2);
    for x in 0..3 {
        world.load_chunk_with(ChunkCoord::new(x, 0), &solid(1)).unwrap();
    }
    world.rebuild_all().unwrap();

    let mut encoder = RecordingEncoder::default();
    assert_eq!(world.draw(&mut encoder), 3);

    let coords: Vec<_> = encoder.calls.iter().map(|call| call.coord).collect();
    assert_eq!(
        coords,
        vec![ChunkCoord::new(0, 0), ChunkCoord::new(1, 0), ChunkCoord::new(2, 0)]
    );
    // A 6x2 slab one block thick.
    assert_eq!(encoder.total_indices(), 6 * (2 * 12 + 2 * 6 + 2 * 2));
}

#[test]
fn meshing_uses_the_host_buffers() {
    let state = buffers();
    let mut world = World::new(
        Rc::new(BlockRegistry::default()),
        ChunkDimensions::new(4, 4).unwrap(),
        state.clone(),
    );
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();
    let allocated = state.get().get_total_allocated_memory();
    assert!(allocated > 0);

    world.set_block(Point3::new(0, 0, 0), stone()).unwrap();

    // 24 packed vertices plus one command.
    assert!(state.get().get_total_used_memory() >= 24 * 4 + 20);
    assert_eq!(state.get().get_total_allocated_memory(), allocated);
}
