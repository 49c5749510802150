//! # Task Management System
//!
//! This module provides the worker pool that generates chunks off the coordinating thread.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed on a worker
//! - `TaskResult`: The result of a completed task, applied to the world on the
//!   coordinating thread
//! - `TaskChannel`: Communication channel between the coordinating thread and one worker
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send results back
//! 4. Results are applied to the world in `process_completed_tasks()`
//! 5. Results can spawn new tasks
//!
//! With zero workers the manager runs every task inline at publish time and holds the
//! result until the next `process_completed_tasks()`, so callers see the same two-step
//! flow either way.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(4)?;
//!
//! // Publish a task for background processing
//! task_manager.publish_task(Box::new(ChunkGenerationTask::for_world(&world, coordinate)));
//!
//! // In the coordinating loop:
//! task_manager.process_completed_tasks(&mut world);
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::{
    collections::VecDeque,
    sync::mpsc::{channel, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use log::{debug, info, warn};
use task::{Task, TaskResult};

use super::{error::WorldResult, voxels::world::WorldModel};

/// A communication channel between the coordinating thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from the coordinating thread to the worker
/// - `result_receiver`: Receives task results from the worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined when the manager is dropped
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task + Send>>,
    result_receiver: Receiver<Box<dyn TaskResult + Send>>,
    num_tasks_in_flight: usize,
    worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and joining worker threads
/// - Distributing tasks across available workers
/// - Queuing tasks when all workers are busy
/// - Applying results to the world
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task + Send>>,
    inline_results: VecDeque<Box<dyn TaskResult + Send>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// This is set to 1 so that a busy worker never holds a backlog; queued tasks stay on
/// the coordinating thread where they can still be handed to whichever worker frees
/// up first.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create. Zero runs tasks inline.
    ///
    /// # Errors
    /// Returns `WorldError::Io` if a worker thread cannot be spawned.
    pub fn new(num_workers: usize) -> WorldResult<Self> {
        let mut channels = Vec::with_capacity(num_workers);

        info!(
            "Starting {} chunk worker(s), available parallelism: {:?}",
            num_workers,
            thread::available_parallelism()
        );

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task + Send>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult + Send>>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{}", index))
                .spawn(task_closure)?;

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                worker,
            });
        }

        Ok(TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            inline_results: VecDeque::new(),
            current_channel: 0,
        })
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }

    /// Tasks sent to a worker whose results have not been applied yet.
    pub fn num_tasks_in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum::<usize>()
            + self.inline_results.len()
    }

    /// Tasks waiting for a free worker.
    pub fn num_queued_tasks(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether no task is queued, running, or waiting to be applied.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.num_tasks_in_flight() == 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was sent to the worker
    /// - `Err(task)` if the worker has gone away
    fn try_send_task(
        &mut self,
        task: Box<dyn Task + Send>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task + Send>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => Err(task.0),
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// Round-robin starting from the channel after the last one used, skipping channels
    /// that have reached `MAX_TASKS_IN_FLIGHT`.
    ///
    /// # Returns
    /// - `Some(usize)` index of an available channel
    /// - `None` if all channels are busy or there are no channels
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&idx| self.channels[idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// The task is sent to a free worker, queued if every worker is busy, or processed
    /// immediately if the pool has no workers.
    ///
    /// # Returns
    /// - `true` if the task was scheduled or processed right away
    /// - `false` if the task was queued
    pub fn publish_task(&mut self, task: Box<dyn Task + Send>) -> bool {
        if self.channels.is_empty() {
            self.inline_results.push_back(task.process());
            return true;
        }

        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    warn!("Chunk worker {} disconnected", channel_idx);
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to workers until the queue is empty or every worker is busy.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put the task back and stop
                    warn!("Chunk worker {} disconnected", channel_idx);
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Applies every result that is ready without blocking.
    ///
    /// # Arguments
    /// * `world` - The world results are applied to
    ///
    /// # Returns
    /// The number of results applied.
    pub fn process_completed_tasks(&mut self, world: &mut WorldModel) -> usize {
        let mut ready: Vec<Box<dyn TaskResult + Send>> = self.inline_results.drain(..).collect();
        for (idx, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight -= 1;
                        ready.push(result);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if channel.num_tasks_in_flight > 0 {
                            warn!(
                                "Chunk worker {} stopped with {} task(s) in flight",
                                idx, channel.num_tasks_in_flight
                            );
                            channel.num_tasks_in_flight = 0;
                        }
                        break;
                    }
                }
            }
        }

        let applied = ready.len();
        self.apply_results(ready, world);
        applied
    }

    /// Blocks until every published task, including follow-ups, has been applied.
    ///
    /// Meant for tools and tests; the coordinating loop should poll with
    /// `process_completed_tasks()` instead.
    pub fn wait_for_all(&mut self, world: &mut WorldModel) {
        loop {
            self.process_completed_tasks(world);
            self.process_queued_tasks();
            if self.is_idle() {
                return;
            }

            let Some(channel) = self
                .channels
                .iter_mut()
                .find(|channel| channel.num_tasks_in_flight > 0)
            else {
                warn!(
                    "No chunk worker available, leaving {} task(s) queued",
                    self.queued_tasks.len()
                );
                return;
            };
            match channel.result_receiver.recv() {
                Ok(result) => {
                    channel.num_tasks_in_flight -= 1;
                    self.apply_results(vec![result], world);
                }
                Err(_) => {
                    warn!("Chunk worker stopped while a task was in flight");
                    channel.num_tasks_in_flight = 0;
                }
            }
        }
    }

    fn apply_results(&mut self, results: Vec<Box<dyn TaskResult + Send>>, world: &mut WorldModel) {
        for result in results {
            for task in result.handle_result(world) {
                self.publish_task(task);
            }
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for channel in self.channels.drain(..) {
            let TaskChannel {
                task_sender,
                result_receiver,
                worker,
                ..
            } = channel;
            // Closing both ends lets the worker loop exit after its current task.
            drop(task_sender);
            drop(result_receiver);
            if worker.join().is_err() {
                warn!("Chunk worker panicked");
            }
        }
        debug!("Task manager shut down");
    }
}
