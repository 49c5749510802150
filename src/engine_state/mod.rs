//! # Engine State Module
//!
//! The coordinating layer of the sandbox: it owns the world, drives streaming from the
//! observer position, schedules chunk generation on the worker pool and runs gravity on
//! its fixed cadence.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container and coordinating loop
//! * `config` - World and engine settings
//! * `error` - Errors from configuration and persistence
//! * `persistence` - Save format and save directory
//! * `task_management` - Worker pool for chunk generation
//! * `voxels` - Terrain, chunks, overlay and gravity
//!
//! ## Threading
//!
//! Every world mutation happens on the thread that owns the `EngineState`. Workers only
//! generate chunks; their results are applied during `process_tasks()`, one at a time.
//! Observer updates, block edits and gravity are therefore serialized with each other
//! and with chunk arrival.

use std::collections::HashSet;

use cgmath::Point3;
use log::{debug, info};
use web_time::Instant;

use config::WorldConfig;
use error::WorldResult;
use persistence::{unix_now, SaveData};
use task_management::TaskManager;
use voxels::{
    block::{BlockPosition, BlockRecord, MaterialId},
    chunk::ChunkCoordinate,
    gravity::{FallOutcome, FallReport, FallSimulator, FallingBlock},
    overlay::BlockId,
    streamer::{StreamingPlan, WorldStreamer},
    tasks::chunk_generation_task::ChunkGenerationTask,
    terrain::TerrainGenerator,
    world::WorldModel,
};

pub mod config;
pub mod error;
pub mod persistence;
pub mod task_management;
pub mod voxels;

/// Exclusive upper bound for seeds picked when a new world is created without one.
pub const RANDOM_SEED_RANGE: u64 = 1_000_000;

/// The main state container for the sandbox.
///
/// # Examples
///
/// ```
/// use cgmath::Point3;
/// use voxel_sandbox::engine_state::{config::WorldConfig, EngineState};
///
/// let config = WorldConfig { worker_threads: 0, ..WorldConfig::default() };
/// let mut engine = EngineState::new(config, 12345).unwrap();
///
/// engine.update_observer(Point3::new(0.0, 10.0, 0.0));
/// engine.flush_tasks();
/// assert_eq!(engine.world().chunks().len(), 25);
/// ```
pub struct EngineState {
    /// Settings the engine was built with
    config: WorldConfig,
    /// Terrain, overlay and gravity state
    world: WorldModel,
    /// Plans chunk residency around the observer
    streamer: WorldStreamer,
    /// Worker pool for chunk generation
    task_manager: TaskManager,
    /// Last reported observer position
    observer_position: Point3<f32>,
    /// When the current world was first created, Unix seconds
    created_at: u64,
    /// When the last full gravity scan ran
    last_gravity_tick: Option<Instant>,
}

impl EngineState {
    /// Creates an engine for a fresh world with the given seed.
    ///
    /// No chunks are loaded until the first `update_observer` call.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` is out of range; `Io` if worker threads cannot start.
    pub fn new(config: WorldConfig, seed: u64) -> WorldResult<Self> {
        config.validate()?;

        let terrain = TerrainGenerator::new(seed, config.sea_level, config.max_height);
        let world = WorldModel::new(terrain, config.chunk_size, config.landing_velocity_threshold);
        let streamer = WorldStreamer::new(config.chunk_size, config.render_distance);
        let task_manager = TaskManager::new(config.worker_threads)?;

        info!(
            "Created world with seed {} (chunk size {}, render distance {})",
            seed, config.chunk_size, config.render_distance
        );

        Ok(EngineState {
            config,
            world,
            streamer,
            task_manager,
            observer_position: Point3::new(0.0, 10.0, 0.0),
            created_at: unix_now(),
            last_gravity_tick: None,
        })
    }

    /// Creates an engine for a new world, picking a random seed if none is given.
    pub fn new_world(config: WorldConfig, seed: Option<u64>) -> WorldResult<Self> {
        let seed = seed.unwrap_or_else(|| fastrand::u64(0..RANDOM_SEED_RANGE));
        Self::new(config, seed)
    }

    /// Creates an engine and loads `data` into it.
    pub fn from_save(config: WorldConfig, data: &SaveData) -> WorldResult<Self> {
        let restored = data.decode()?;
        let mut engine = Self::new(config, restored.seed)?;
        engine.load(data)?;
        Ok(engine)
    }

    /// Settings the engine was built with.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The world.
    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    /// The world's seed.
    pub fn seed(&self) -> u64 {
        self.world.seed()
    }

    /// Last reported observer position.
    pub fn observer_position(&self) -> Point3<f32> {
        self.observer_position
    }

    /// Chunk generation tasks that have not been applied yet.
    pub fn num_tasks_in_flight(&self) -> usize {
        self.task_manager.num_tasks_in_flight() + self.task_manager.num_queued_tasks()
    }

    /// Records the observer's position and streams chunks around it.
    ///
    /// Loads are dispatched to the worker pool and the call returns without waiting for
    /// them. Only `x` and `z` decide which chunks are resident.
    ///
    /// # Returns
    /// The plan that was carried out, or `None` if the observer is still in the same chunk.
    pub fn update_observer(&mut self, position: Point3<f32>) -> Option<StreamingPlan> {
        self.observer_position = position;

        let loaded: HashSet<ChunkCoordinate> = self.world.loaded_or_pending();
        let plan = self.streamer.update_observer(position, &loaded)?;

        for coordinate in &plan.to_evict {
            self.world.evict_chunk(*coordinate);
        }
        for coordinate in &plan.to_load {
            if self.world.request_chunk(*coordinate) {
                self.task_manager
                    .publish_task(Box::new(ChunkGenerationTask::for_world(
                        &self.world,
                        *coordinate,
                    )));
            }
        }

        Some(plan)
    }

    /// Applies finished chunks and hands queued tasks to free workers.
    ///
    /// This method should be called every frame of the coordinating loop.
    pub fn process_tasks(&mut self) {
        self.task_manager.process_completed_tasks(&mut self.world);
        self.task_manager.process_queued_tasks();
    }

    /// Blocks until every requested chunk has been applied.
    pub fn flush_tasks(&mut self) {
        self.task_manager.wait_for_all(&mut self.world);
    }

    /// Advances the engine clock to `now`.
    ///
    /// Applies finished chunks, then runs a full gravity scan if the configured interval
    /// has elapsed since the previous one. The first call only starts the clock.
    ///
    /// # Returns
    /// Ids of blocks that started falling.
    pub fn update(&mut self, now: Instant) -> Vec<BlockId> {
        self.process_tasks();

        match self.last_gravity_tick {
            None => {
                self.last_gravity_tick = Some(now);
                Vec::new()
            }
            Some(last) if now.duration_since(last) >= self.config.gravity_tick_interval() => {
                self.last_gravity_tick = Some(now);
                self.gravity_tick()
            }
            Some(_) => Vec::new(),
        }
    }

    /// Runs a full gravity scan immediately.
    pub fn gravity_tick(&mut self) -> Vec<BlockId> {
        let fell = self.world.gravity_tick();
        if !fell.is_empty() {
            debug!("{} block(s) lost support", fell.len());
        }
        fell
    }

    /// Advances all falling blocks by `dt` seconds through `simulator`.
    pub fn step_falling(&mut self, simulator: &mut dyn FallSimulator, dt: f32) -> Vec<FallOutcome> {
        self.world.step_falling(simulator, dt)
    }

    /// Applies a report produced by an external physics collaborator.
    pub fn apply_fall_report(&mut self, report: FallReport) -> FallOutcome {
        self.world.apply_fall_report(report)
    }

    /// Places a block at `position`.
    pub fn place_block(&mut self, position: BlockPosition, material: MaterialId) -> BlockId {
        self.world.place_block(position, material)
    }

    /// Breaks the block at `position`.
    ///
    /// # Returns
    /// `true` if something was broken.
    pub fn break_block(&mut self, position: BlockPosition) -> bool {
        self.world.break_block(position)
    }

    /// Static solid cells for the renderer.
    pub fn visible_blocks(&mut self) -> &[BlockRecord] {
        self.world.visible_blocks()
    }

    /// Blocks currently falling, for the renderer.
    pub fn falling_blocks(&self) -> &[FallingBlock] {
        self.world.falling_blocks()
    }

    /// Whether the cell at `position` is solid.
    pub fn is_solid_at(&self, position: BlockPosition) -> bool {
        self.world.is_solid_at(position)
    }

    /// Captures the world for the persistence collaborator.
    ///
    /// Blocks that are mid-fall are saved at their current cell, stacked upward past any
    /// cell that is already taken.
    pub fn save_data(&self) -> SaveData {
        let blocks = self.world.settled_records();
        SaveData::capture(
            self.world.seed(),
            &blocks,
            &self.world.overlay().removed_terrain(),
            self.observer_position,
            self.created_at,
        )
    }

    /// Replaces the current world with `data`.
    ///
    /// The save is fully validated first; on error the engine is unchanged. On success the
    /// chunk cache is emptied, the overlay rebuilt and streaming restarted around the
    /// saved observer position.
    pub fn load(&mut self, data: &SaveData) -> WorldResult<()> {
        let restored = data.decode()?;

        let terrain =
            TerrainGenerator::new(restored.seed, self.config.sea_level, self.config.max_height);
        self.world
            .restore(terrain, &restored.blocks, &restored.removed_terrain);
        self.streamer.reset();
        self.last_gravity_tick = None;
        if data.created_at != 0 {
            self.created_at = data.created_at;
        }

        info!(
            "Loaded world {:?} with seed {} and {} overlay block(s)",
            data.name,
            restored.seed,
            restored.blocks.len()
        );
        self.update_observer(restored.observer_position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{error::WorldError, voxels::gravity::KinematicFall};
    use web_time::Duration;

    fn offline_engine() -> EngineState {
        let config = WorldConfig {
            worker_threads: 0,
            ..WorldConfig::default()
        };
        EngineState::new(config, 12345).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = WorldConfig {
            chunk_size: 0,
            ..WorldConfig::default()
        };
        assert!(matches!(
            EngineState::new(config, 1),
            Err(WorldError::InvalidConfig(_))
        ));
    }

    #[test]
    fn random_seeds_stay_in_range() {
        let config = WorldConfig {
            worker_threads: 0,
            ..WorldConfig::default()
        };
        let engine = EngineState::new_world(config.clone(), None).unwrap();
        assert!(engine.seed() < RANDOM_SEED_RANGE);
        assert_eq!(EngineState::new_world(config, Some(9)).unwrap().seed(), 9);
    }

    #[test]
    fn gravity_runs_on_the_configured_cadence() {
        let mut engine = offline_engine();
        engine.place_block(BlockPosition::new(0, 40, 0), MaterialId::Sand);

        let start = Instant::now();
        assert!(engine.update(start).is_empty());
        assert!(engine.update(start + Duration::from_millis(500)).is_empty());
        assert_eq!(engine.falling_blocks().len(), 0);
        assert_eq!(engine.update(start + Duration::from_millis(1000)).len(), 1);
        assert!(engine.update(start + Duration::from_millis(1500)).is_empty());
    }

    #[test]
    fn save_includes_blocks_that_are_mid_fall() {
        let mut engine = offline_engine();
        engine.place_block(BlockPosition::new(3, 30, 3), MaterialId::Gravel);
        engine.gravity_tick();
        assert_eq!(engine.falling_blocks().len(), 1);

        let restored = engine.save_data().decode().unwrap();
        assert_eq!(
            restored.blocks,
            vec![BlockRecord::new(BlockPosition::new(3, 30, 3), MaterialId::Gravel)]
        );
    }

    #[test]
    fn block_placed_over_a_falling_block_survives_a_reload() {
        let mut engine = offline_engine();
        engine.place_block(BlockPosition::new(3, 30, 3), MaterialId::Gravel);
        engine.gravity_tick();
        engine.place_block(BlockPosition::new(3, 30, 3), MaterialId::Glass);

        let data = engine.save_data();
        assert_eq!(data.overlay_blocks.len(), 2);

        let reloaded = EngineState::from_save(engine.config().clone(), &data).unwrap();
        let records = reloaded.world().overlay_records();
        assert_eq!(
            records,
            vec![
                BlockRecord::new(BlockPosition::new(3, 30, 3), MaterialId::Glass),
                BlockRecord::new(BlockPosition::new(3, 31, 3), MaterialId::Gravel),
            ]
        );
    }

    #[test]
    fn edges_of_the_coordinate_range_are_accepted() {
        let mut engine = offline_engine();
        engine.place_block(BlockPosition::new(0, i32::MAX, 0), MaterialId::Stone);
        engine.place_block(BlockPosition::new(i32::MIN, 3, i32::MAX), MaterialId::Wood);
        assert!(engine.is_solid_at(BlockPosition::new(0, i32::MAX, 0)));
        assert!(engine.break_block(BlockPosition::new(0, i32::MAX, 0)));

        let plan = engine
            .update_observer(Point3::new(1.0e11, 10.0, 0.0))
            .unwrap();
        assert_eq!(plan.to_load.len(), 15);
        engine.flush_tasks();
        assert_eq!(engine.world().chunks().len(), 15);
        assert!(engine
            .world()
            .chunks()
            .iter()
            .all(|chunk| chunk.coordinate().is_addressable(16)));
        assert!(!engine.visible_blocks().is_empty());
    }

    #[test]
    fn failed_load_leaves_the_world_untouched() {
        let mut engine = offline_engine();
        engine.place_block(BlockPosition::new(0, 6, 0), MaterialId::Wood);
        let bad = SaveData::from_json_str(r#"{ "overlayBlocks": [] }"#).unwrap();

        assert!(matches!(engine.load(&bad), Err(WorldError::MissingSeed)));
        assert_eq!(engine.seed(), 12345);
        assert!(engine.is_solid_at(BlockPosition::new(0, 6, 0)));
    }

    #[test]
    fn load_restreams_around_the_saved_observer() {
        let mut engine = offline_engine();
        engine.update_observer(Point3::new(0.0, 10.0, 0.0));
        engine.flush_tasks();

        let mut other = offline_engine();
        other.update_observer(Point3::new(100.0, 10.0, 100.0));
        let data = other.save_data();

        engine.load(&data).unwrap();
        engine.flush_tasks();
        assert_eq!(engine.observer_position(), Point3::new(100.0, 10.0, 100.0));
        assert_eq!(engine.world().chunks().len(), 25);
        assert!(engine
            .world()
            .chunks()
            .contains(ChunkCoordinate::new(6, 6)));
    }

    #[test]
    fn simulated_fall_settles_in_the_overlay() {
        let mut engine = offline_engine();
        engine.update_observer(Point3::new(0.0, 10.0, 0.0));
        engine.flush_tasks();

        // Column (5, 5) is 9 tall.
        engine.place_block(BlockPosition::new(5, 20, 5), MaterialId::Cobblestone);
        engine.gravity_tick();
        let mut simulator = KinematicFall::default();
        for _ in 0..200 {
            engine.step_falling(&mut simulator, 0.05);
        }
        assert!(engine.falling_blocks().is_empty());
        assert!(engine.is_solid_at(BlockPosition::new(5, 10, 5)));
        assert!(!engine.is_solid_at(BlockPosition::new(5, 11, 5)));
    }
}
