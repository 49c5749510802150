//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask` which generates chunk terrain off the
//! coordinating thread. It is scheduled by the engine whenever the streamer asks for a
//! chunk that is neither resident nor already requested.

use std::sync::Arc;

use crate::engine_state::{
    task_management::task::{Task, TaskResult},
    voxels::{
        chunk::{Chunk, ChunkCoordinate},
        terrain::TerrainGenerator,
        world::WorldModel,
    },
};

/// A task that generates one chunk.
///
/// The task owns everything it needs: a shared handle to the generator and the
/// coordinate. Generation is pure, so a task can run on any worker.
pub struct ChunkGenerationTask {
    /// The generator of the world that requested the chunk
    terrain: Arc<TerrainGenerator>,
    /// The chunk to generate
    coordinate: ChunkCoordinate,
    /// Columns along each chunk edge
    chunk_size: i32,
    /// World epoch the request was made in
    epoch: u64,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `terrain` - The generator to use
    /// * `coordinate` - The chunk to generate
    /// * `chunk_size` - Columns along each chunk edge
    /// * `epoch` - The requesting world's current epoch
    ///
    /// # Returns
    /// A new `ChunkGenerationTask` instance
    pub fn new(
        terrain: Arc<TerrainGenerator>,
        coordinate: ChunkCoordinate,
        chunk_size: i32,
        epoch: u64,
    ) -> Self {
        ChunkGenerationTask {
            terrain,
            coordinate,
            chunk_size,
            epoch,
        }
    }

    /// Creates a task for `coordinate` in the world's current state.
    pub fn for_world(world: &WorldModel, coordinate: ChunkCoordinate) -> Self {
        Self::new(
            world.terrain().clone(),
            coordinate,
            world.chunk_size(),
            world.epoch(),
        )
    }
}

impl Task for ChunkGenerationTask {
    /// Generates the chunk on the worker thread.
    ///
    /// # Returns
    /// A boxed `TaskResult` carrying the chunk and the epoch it was requested in
    fn process(&self) -> Box<dyn TaskResult + Send> {
        Box::new(ChunkGenerationTaskResult {
            chunk: self.terrain.generate_chunk(self.coordinate, self.chunk_size),
            epoch: self.epoch,
        })
    }
}

/// The result of a chunk generation task.
pub struct ChunkGenerationTaskResult {
    /// The generated chunk
    chunk: Chunk,
    /// World epoch the chunk was requested in
    epoch: u64,
}

impl TaskResult for ChunkGenerationTaskResult {
    /// Hands the chunk to the world on the coordinating thread.
    ///
    /// The world decides whether the chunk is still wanted; a chunk evicted while it was
    /// being generated, or requested before the world was replaced, is dropped here.
    ///
    /// # Returns
    /// No follow-up tasks
    fn handle_result(self: Box<Self>, world: &mut WorldModel) -> Vec<Box<dyn Task + Send>> {
        world.accept_chunk(self.chunk, self.epoch);
        Vec::new()
    }
}
