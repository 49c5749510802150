//! # Terrain Generator
//!
//! Turns a seed and a world column into materials. Everything here is a pure function of
//! the seed and its inputs, which is what allows chunks to be thrown away and regenerated
//! instead of stored.
//!
//! ## Column layering
//!
//! For a column with surface height `h`:
//! - `y > h` is air
//! - `y == h` is grass
//! - `h - 3 <= y < h` is dirt
//! - everything below is stone, with coal ore below y=8 and iron ore below y=5 where a
//!   secondary noise sample crosses its threshold

use super::{
    block::{BlockPosition, BlockRecord, MaterialId, GROUND_FLOOR},
    chunk::{chunk_creation::ChunkBuilder, Chunk, ChunkCoordinate},
    noise_field::NoiseField,
};

/// Number of fractal octaves used for the height map.
pub const HEIGHT_OCTAVES: u32 = 4;
/// Amplitude falloff between height map octaves.
pub const HEIGHT_PERSISTENCE: f64 = 0.5;
/// Base frequency of the height map.
pub const HEIGHT_SCALE: f64 = 0.02;
/// Number of dirt cells beneath the grass.
pub const DIRT_DEPTH: i32 = 3;
/// Frequency of the ore noise.
pub const ORE_SCALE: f64 = 0.1;
/// Ore noise above this becomes coal.
pub const COAL_THRESHOLD: f64 = 0.6;
/// Ore noise below this becomes iron.
pub const IRON_THRESHOLD: f64 = -0.6;
/// Coal only appears strictly below this height.
pub const COAL_MAX_Y: i32 = 8;
/// Iron only appears strictly below this height.
pub const IRON_MAX_Y: i32 = 5;

/// Deterministic terrain source.
///
/// Holds no mutable state. Cloning it is cheap enough, but the engine shares a single
/// instance between worker threads behind an `Arc`.
#[derive(Clone, Debug)]
pub struct TerrainGenerator {
    noise: NoiseField,
    sea_level: i32,
    max_height: i32,
}

impl TerrainGenerator {
    /// Creates a generator for `seed`.
    ///
    /// # Arguments
    /// * `seed` - World seed; fully determines every generated cell
    /// * `sea_level` - Height of a column where the height noise is zero
    /// * `max_height` - Amplitude applied to the height noise
    pub fn new(seed: u64, sea_level: i32, max_height: i32) -> Self {
        TerrainGenerator {
            noise: NoiseField::new(seed),
            sea_level,
            max_height,
        }
    }

    /// The world seed.
    pub fn seed(&self) -> u64 {
        self.noise.seed()
    }

    /// The underlying noise field.
    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    /// Surface height of the column at `(x, z)`. Never less than 1.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let height_noise = self.noise.fractal(
            x as f64,
            z as f64,
            HEIGHT_OCTAVES,
            HEIGHT_PERSISTENCE,
            HEIGHT_SCALE,
        );
        let height = (self.sea_level as f64 + height_noise * self.max_height as f64).floor() as i32;
        height.max(GROUND_FLOOR)
    }

    /// Material of the cell at `(x, y, z)`, or `None` for air.
    pub fn material_at(&self, x: i32, y: i32, z: i32) -> Option<MaterialId> {
        self.material_in_column(x, y, z, self.height_at(x, z))
    }

    /// Same as [`TerrainGenerator::material_at`] with the column height already known.
    fn material_in_column(&self, x: i32, y: i32, z: i32, height: i32) -> Option<MaterialId> {
        if y < GROUND_FLOOR || y > height {
            return None;
        }
        if y == height {
            return Some(MaterialId::Grass);
        }
        if y >= height - DIRT_DEPTH {
            return Some(MaterialId::Dirt);
        }

        if y < COAL_MAX_Y {
            let ore_noise = self.noise.sample(x as f64 * ORE_SCALE, z as f64 * ORE_SCALE);
            if ore_noise > COAL_THRESHOLD {
                return Some(MaterialId::CoalOre);
            }
            if ore_noise < IRON_THRESHOLD && y < IRON_MAX_Y {
                return Some(MaterialId::IronOre);
            }
        }

        Some(MaterialId::Stone)
    }

    /// Generates the chunk at `coordinate`.
    ///
    /// Iterates the `size * size` columns in x-major order, computes each column height once
    /// and emits one record per occupied cell from y=1 up to the surface inclusive. Calling
    /// this twice with the same inputs yields identical chunks.
    pub fn generate_chunk(&self, coordinate: ChunkCoordinate, size: i32) -> Chunk {
        let mut builder = ChunkBuilder::new(coordinate, size);
        let origin = coordinate.origin(size);

        for local_x in 0..size {
            for local_z in 0..size {
                let x = origin.x + local_x;
                let z = origin.z + local_z;
                let height = self.height_at(x, z);

                builder.begin_column(height);
                for y in GROUND_FLOOR..=height {
                    if let Some(material) = self.material_in_column(x, y, z, height) {
                        builder.push_block(BlockRecord::new(BlockPosition::new(x, y, z), material));
                    }
                }
            }
        }

        builder.build()
    }
}
