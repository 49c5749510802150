//! # Voxel World
//!
//! This module contains the simulation core: deterministic terrain, chunk caching and
//! streaming, the player overlay and gravity.
//!
//! ## Architecture
//!
//! The voxel system is organized into several key components, leaves first:
//!
//! * **Noise field**: Seeded 2D gradient noise and its fractal sum
//! * **Terrain**: Column heights and layered materials derived from the noise
//! * **Block / Chunk**: Materials, cell positions and 16x16 column tiles of generated blocks
//! * **Chunk store**: Memoizes generated chunks by coordinate
//! * **Streamer**: Plans which chunks should be resident around the observer
//! * **Overlay**: Player-placed blocks and broken terrain cells
//! * **Gravity**: Support checks and the falling-block lifecycle
//! * **World**: Owns the chunk store, overlay and gravity state
//! * **Tasks**: Off-thread chunk generation
//!
//! ## Data Flow
//!
//! 1. The observer moves; the streamer produces a load/evict plan
//! 2. Loads become generation tasks; finished chunks are accepted by the world
//! 3. The world merges resident terrain with the overlay into the visible block list
//! 4. Gravity reads and writes the overlay on its own cadence
//!
//! Generated terrain is never persisted. It is reproduced from the seed on demand, and
//! only the overlay has to be saved.

pub mod block;
pub mod chunk;
pub mod chunk_store;
pub mod gravity;
pub mod noise_field;
pub mod overlay;
pub mod streamer;
pub mod tasks;
pub mod terrain;
pub mod world;
