//! # Chunk Store
//!
//! A memoization layer over terrain generation. Chunks are generated on first access and
//! kept until the streamer asks for them to be evicted. The store is never authoritative
//! for player changes; those live in the block overlay and are applied on top of whatever
//! the store returns.

use std::{collections::HashMap, sync::Arc};

use log::trace;

use super::{
    block::{BlockPosition, SupportQuery},
    chunk::{Chunk, ChunkCoordinate},
    terrain::TerrainGenerator,
};

/// Cache of resident chunks keyed by chunk coordinate.
///
/// Chunks are shared as `Arc<Chunk>` so that the visible block list and in-flight readers
/// can hold one without copying it. There is no size bound; residency is decided
/// entirely by the streamer.
pub struct ChunkStore {
    terrain: Arc<TerrainGenerator>,
    chunk_size: i32,
    chunks: HashMap<ChunkCoordinate, Arc<Chunk>>,
}

impl ChunkStore {
    /// Creates an empty store that generates with `terrain`.
    pub fn new(terrain: Arc<TerrainGenerator>, chunk_size: i32) -> Self {
        ChunkStore {
            terrain,
            chunk_size,
            chunks: HashMap::new(),
        }
    }

    /// The generator used for cache misses.
    pub fn terrain(&self) -> &Arc<TerrainGenerator> {
        &self.terrain
    }

    /// Number of columns along each chunk edge.
    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    /// Returns the chunk at `coordinate`, generating and caching it on a miss.
    ///
    /// Generation runs on the calling thread. The engine normally generates off-thread and
    /// calls [`ChunkStore::insert`] instead; this path serves direct lookups.
    pub fn get(&mut self, coordinate: ChunkCoordinate) -> Arc<Chunk> {
        let terrain = &self.terrain;
        let chunk_size = self.chunk_size;
        self.chunks
            .entry(coordinate)
            .or_insert_with(|| {
                trace!("Generating chunk {:?} synchronously", coordinate);
                Arc::new(terrain.generate_chunk(coordinate, chunk_size))
            })
            .clone()
    }

    /// Returns the chunk at `coordinate` only if it is resident.
    pub fn get_resident(&self, coordinate: ChunkCoordinate) -> Option<&Arc<Chunk>> {
        self.chunks.get(&coordinate)
    }

    /// Inserts a chunk generated elsewhere.
    ///
    /// # Returns
    /// `false` if a chunk was already resident at that coordinate; the resident chunk is
    /// kept since both are identical by construction.
    pub fn insert(&mut self, chunk: Chunk) -> bool {
        let coordinate = chunk.coordinate();
        if self.chunks.contains_key(&coordinate) {
            return false;
        }
        self.chunks.insert(coordinate, Arc::new(chunk));
        true
    }

    /// Drops the chunk at `coordinate`.
    ///
    /// # Returns
    /// `true` if a chunk was resident.
    pub fn evict(&mut self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.remove(&coordinate).is_some()
    }

    /// Whether a chunk is resident at `coordinate`.
    pub fn contains(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.contains_key(&coordinate)
    }

    /// Coordinates of all resident chunks, in no particular order.
    pub fn resident_coordinates(&self) -> Vec<ChunkCoordinate> {
        self.chunks.keys().copied().collect()
    }

    /// Iterates over resident chunks.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.values()
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is resident.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Drops every chunk and switches to a new generator.
    pub fn reset(&mut self, terrain: Arc<TerrainGenerator>) {
        self.chunks.clear();
        self.terrain = terrain;
    }
}

/// Raw generated terrain: resident chunks answer from their bit vector, anything else is
/// computed from the generator without caching.
impl SupportQuery for ChunkStore {
    fn is_occupied(&self, position: BlockPosition) -> bool {
        let coordinate = ChunkCoordinate::of_block(position, self.chunk_size);
        match self.chunks.get(&coordinate) {
            Some(chunk) => chunk.is_solid(position),
            None => self
                .terrain
                .material_at(position.x, position.y, position.z)
                .is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ChunkStore {
        ChunkStore::new(Arc::new(TerrainGenerator::new(12345, 5, 15)), 16)
    }

    #[test]
    fn get_generates_once_and_memoizes() {
        let mut store = store();
        let coordinate = ChunkCoordinate::new(0, 0);
        assert!(!store.contains(coordinate));

        let first = store.get(coordinate);
        assert!(store.contains(coordinate));
        let second = store.get(coordinate);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn evicted_chunks_regenerate_identically() {
        let mut store = store();
        let coordinate = ChunkCoordinate::new(-3, 4);
        let before = store.get(coordinate);

        assert!(store.evict(coordinate));
        assert!(!store.evict(coordinate));
        assert!(store.is_empty());

        let after = store.get(coordinate);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.blocks(), after.blocks());
    }

    #[test]
    fn insert_keeps_the_resident_chunk() {
        let mut store = store();
        let coordinate = ChunkCoordinate::new(1, 1);
        let chunk = store.terrain().generate_chunk(coordinate, 16);
        assert!(store.insert(chunk.clone()));
        let resident = store.get_resident(coordinate).unwrap().clone();
        assert!(!store.insert(chunk));
        assert!(Arc::ptr_eq(&resident, store.get_resident(coordinate).unwrap()));
    }

    #[test]
    fn occupancy_agrees_with_and_without_residency() {
        let mut store = store();
        let samples: Vec<BlockPosition> = (-20..20)
            .flat_map(|x| (0..12).map(move |y| BlockPosition::new(x, y, 3 - x)))
            .collect();
        let cold: Vec<bool> = samples.iter().map(|p| store.is_occupied(*p)).collect();
        assert!(store.is_empty());

        for x in -2..=1 {
            store.get(ChunkCoordinate::new(x, 0));
        }
        let warm: Vec<bool> = samples.iter().map(|p| store.is_occupied(*p)).collect();
        assert_eq!(cold, warm);
    }

    #[test]
    fn reset_clears_and_swaps_generator() {
        let mut store = store();
        store.get(ChunkCoordinate::new(0, 0));
        store.get(ChunkCoordinate::new(0, 1));
        store.reset(Arc::new(TerrainGenerator::new(7, 5, 15)));
        assert!(store.is_empty());
        assert_eq!(store.terrain().seed(), 7);
    }
}
