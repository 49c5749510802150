//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which moves CPU-bound work off the coordinating thread.
//!
//! ## Core Components
//! - `Task`: Represents a unit of work that can be executed on a worker
//! - `TaskResult`: Represents the result of a completed task
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the coordinating thread with the world
//! 5. The result can spawn follow-up tasks
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the coordinating thread
//! - Only `handle_result()` may touch the world

use crate::engine_state::voxels::world::WorldModel;

/// A trait representing a unit of work that can be executed on a worker thread.
///
/// Tasks should own all the data they need. They never see the world; anything they
/// produce is handed back through a [`TaskResult`].
///
/// # Implementation Guidelines
/// - Must be `Send` to be transferred between threads
/// - Should be relatively coarse-grained to amortize scheduling overhead
/// - Should not hold references to data that might be modified elsewhere
pub trait Task: Send {
    /// Processes the task and returns a result.
    ///
    /// This runs on a worker thread, or inline on the coordinating thread when the
    /// pool has no workers.
    ///
    /// # Returns
    /// A boxed `TaskResult` that will be processed on the coordinating thread.
    fn process(&self) -> Box<dyn TaskResult + Send>;
}

/// A trait representing the result of processing a `Task`.
///
/// Results are applied one at a time on the coordinating thread, which serializes every
/// world mutation that comes out of the pool.
pub trait TaskResult: Send {
    /// Applies the result to the world.
    ///
    /// # Arguments
    /// * `world` - The world owned by the coordinating thread
    ///
    /// # Returns
    /// Follow-up tasks to schedule (can be empty).
    fn handle_result(self: Box<Self>, world: &mut WorldModel) -> Vec<Box<dyn Task + Send>>;
}
