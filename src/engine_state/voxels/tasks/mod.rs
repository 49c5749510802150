//! # Voxel Task System
//!
//! Tasks that run on the worker pool on behalf of the world. Chunk generation is the only
//! CPU-heavy step in the simulation, so it is the only one moved off the coordinating
//! thread.

pub mod chunk_generation_task;
