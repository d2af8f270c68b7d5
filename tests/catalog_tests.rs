use std::rc::Rc;

use cgmath::Point3;
use voxel_chunk_engine::core::StSystem;
use voxel_chunk_engine::engine_state::buffer_state::BufferState;
use voxel_chunk_engine::engine_state::voxels::block::block_side::BlockSide;
use voxel_chunk_engine::engine_state::voxels::block::BlockRegistry;
use voxel_chunk_engine::engine_state::voxels::chunk::{ChunkCoord, ChunkDimensions};
use voxel_chunk_engine::engine_state::voxels::world::World;

const CATALOG: &str = r#"[
    { "name": "air", "cube": false },
    { "name": "stone", "textures": 5 },
    { "name": "log", "textures": [4, 4, 6, 6, 4, 4] },
    { "name": "glass", "cube": false }
]"#;

fn world_with(registry: BlockRegistry) -> World {
    World::new(
        Rc::new(registry),
        ChunkDimensions::new(4, 4).unwrap(),
        StSystem::new(Box::new(BufferState::headless(1 << 24))),
    )
}

#[test]
fn every_registered_id_resolves() {
    let registry = BlockRegistry::from_json_str(CATALOG).unwrap();

    assert_eq!(registry.len(), 4);
    for (id, block) in registry.iter() {
        assert_eq!(registry.lookup(id).name, block.name);
        assert_eq!(registry.id_of(&block.name), Some(id));
    }
    assert!(!registry.lookup(0).is_cube);
    assert!(registry.get(4).is_none());
}

#[test]
fn per_face_textures_follow_face_order() {
    let registry = BlockRegistry::from_json_str(CATALOG).unwrap();
    let log = registry.lookup(registry.id_of("log").unwrap());

    assert_eq!(log.texture(BlockSide::UP), 6);
    assert_eq!(log.texture(BlockSide::DOWN), 6);
    for side in BlockSide::horizontal() {
        assert_eq!(log.texture(side), 4);
    }
}

#[test]
fn non_cube_blocks_are_not_meshed_and_do_not_hide_faces() {
    let registry = BlockRegistry::from_json_str(CATALOG).unwrap();
    let stone = registry.id_of("stone").unwrap();
    let glass = registry.id_of("glass").unwrap();
    let mut world = world_with(registry);
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();

    world.set_block(Point3::new(1, 1, 1), stone).unwrap();
    world.set_block(Point3::new(2, 1, 1), glass).unwrap();

    let chunk = world.get_chunk(ChunkCoord::new(0, 0)).unwrap();
    assert_eq!(chunk.get_block(Point3::new(2, 1, 1)), Some(glass));
    assert_eq!(chunk.quad_count(), 6);
}

#[test]
fn ids_outside_the_catalog_are_refused() {
    let mut world = world_with(BlockRegistry::from_json_str(CATALOG).unwrap());
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();

    assert!(world.set_block(Point3::new(0, 0, 0), 9).is_err());
    assert_eq!(world.get_block(Point3::new(0, 0, 0)), Some(0));
}

#[test]
fn vertices_carry_the_face_texture() {
    let registry = BlockRegistry::from_json_str(CATALOG).unwrap();
    let log = registry.id_of("log").unwrap();
    let mut world = world_with(registry);
    world.load_chunk(ChunkCoord::new(0, 0)).unwrap();
    world.set_block(Point3::new(0, 0, 0), log).unwrap();

    let chunk = world.get_chunk(ChunkCoord::new(0, 0)).unwrap();
    let vertices = chunk.vertex_buffer().read_back().unwrap();
    let textures: Vec<u32> = vertices[..24]
        .chunks(4)
        .map(|quad| quad[0].unpack().texture_id)
        .collect();

    assert_eq!(textures, vec![4, 4, 6, 6, 4, 4]);
}
