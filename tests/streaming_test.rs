//! # Streaming Integration Test
//!
//! Walks the observer through the world on a real worker pool and checks what ends up
//! resident and visible.

use std::collections::HashSet;

use cgmath::Point3;
use voxel_sandbox::engine_state::{
    config::WorldConfig,
    voxels::{
        block::{BlockPosition, MaterialId},
        chunk::ChunkCoordinate,
        terrain::TerrainGenerator,
    },
    EngineState,
};

fn engine(workers: usize) -> EngineState {
    let config = WorldConfig {
        worker_threads: workers,
        ..WorldConfig::default()
    };
    EngineState::new(config, 12345).unwrap()
}

fn resident(engine: &EngineState) -> HashSet<ChunkCoordinate> {
    engine.world().chunks().resident_coordinates().into_iter().collect()
}

/// Test: The same position twice loads and evicts nothing the second time.
#[test]
fn test_same_position_is_idempotent() {
    let mut engine = engine(4);
    let first = engine.update_observer(Point3::new(7.0, 10.0, 7.0)).unwrap();
    assert_eq!(first.to_load.len(), 25);
    engine.flush_tasks();
    let before = resident(&engine);

    assert!(engine.update_observer(Point3::new(7.0, 10.0, 7.0)).is_none());
    assert!(engine.update_observer(Point3::new(7.0, 99.0, 7.0)).is_none());
    engine.flush_tasks();
    assert_eq!(resident(&engine), before);
    assert_eq!(engine.num_tasks_in_flight(), 0);
}

/// Test: Walking east keeps exactly the hysteresis window resident.
#[test]
fn test_walk_keeps_window_bounded() {
    let mut engine = engine(3);
    for step in 0..20 {
        let x = step as f32 * 16.0 + 8.0;
        engine.update_observer(Point3::new(x, 10.0, 8.0));
        engine.process_tasks();
    }
    engine.flush_tasks();

    // Observer ends in chunk 19; chunks 17..=21 are loaded, chunk 16 is kept by the
    // one-chunk eviction margin.
    let chunks = resident(&engine);
    assert_eq!(chunks.len(), 30);
    assert!(chunks.iter().all(|c| (16..=21).contains(&c.x) && (-2..=2).contains(&c.z)));
}

/// Test: Results for chunks evicted before they arrive are dropped.
#[test]
fn test_far_jump_discards_in_flight_chunks() {
    let mut engine = engine(2);
    engine.update_observer(Point3::new(0.0, 10.0, 0.0));
    engine.update_observer(Point3::new(5000.0, 10.0, 5000.0));
    engine.flush_tasks();

    let chunks = resident(&engine);
    assert_eq!(chunks.len(), 25);
    let center = ChunkCoordinate::new(312, 312);
    assert!(chunks.iter().all(|c| c.chebyshev_distance(&center) <= 2));
}

/// Test: Worker-generated terrain matches the generator byte for byte.
#[test]
fn test_worker_chunks_match_direct_generation() {
    let mut engine = engine(4);
    engine.update_observer(Point3::new(-20.0, 10.0, 35.0));
    engine.flush_tasks();

    let generator = TerrainGenerator::new(12345, 5, 15);
    for coordinate in resident(&engine) {
        let chunk = engine.world().chunks().get_resident(coordinate).unwrap();
        assert_eq!(chunk.blocks(), generator.generate_chunk(coordinate, 16).blocks());
    }
}

/// Test: Breaking a terrain cell hides it even though the cached chunk still lists it.
#[test]
fn test_removed_terrain_masks_cached_chunk() {
    let mut engine = engine(0);
    engine.update_observer(Point3::new(0.0, 10.0, 0.0));
    engine.flush_tasks();

    let cell = BlockPosition::new(37, 4, -12);
    assert!(engine.is_solid_at(cell));
    assert!(engine.break_block(cell));

    let chunk = engine
        .world()
        .chunks()
        .get_resident(ChunkCoordinate::new(2, -1))
        .unwrap();
    assert!(chunk.blocks().iter().any(|b| b.position == cell));
    assert!(!engine.is_solid_at(cell));
    assert!(engine.visible_blocks().iter().all(|b| b.position != cell));

    engine.place_block(cell, MaterialId::Glass);
    assert!(engine.is_solid_at(cell));
    let covering: Vec<_> = engine
        .visible_blocks()
        .iter()
        .filter(|b| b.position == cell)
        .copied()
        .collect();
    assert_eq!(covering.len(), 1);
    assert_eq!(covering[0].material, MaterialId::Glass);
}
