//! # World Module
//!
//! This module provides the `WorldModel` struct, the single owner of all mutable world
//! state: the chunk cache, the block overlay and the gravity system. Components that need
//! the world receive it by reference; there is no ambient or global world.
//!
//! ## Layering
//!
//! ```text
//! visible = (resident terrain − broken cells − cells covered by overlay) ∪ overlay
//! ```
//!
//! Falling blocks are not part of either layer. A block leaves the overlay when it starts
//! falling and re-enters it when it lands, so a cell is never both static and falling.
//!
//! ## Chunk residency
//!
//! Chunks are generated off the coordinating thread. The world tracks which coordinates it
//! asked for (`pending`) and a generation epoch that advances whenever the terrain is
//! replaced. A result is accepted only if it carries the current epoch and its coordinate
//! is still pending; anything else was evicted or belongs to a previous world and is
//! dropped.

use std::{collections::HashSet, sync::Arc};

use log::{debug, warn};

use super::{
    block::{BlockPosition, BlockRecord, MaterialId, SupportQuery},
    chunk::{Chunk, ChunkCoordinate},
    chunk_store::ChunkStore,
    gravity::{landing_cell, FallOutcome, FallReport, FallSimulator, FallingBlock, GravitySystem},
    overlay::{BlockId, BlockOverlay, LayeredSupport},
    terrain::TerrainGenerator,
};

/// Owns generated terrain, player changes and falling blocks.
///
/// # Examples
///
/// ```
/// use voxel_sandbox::engine_state::voxels::{
///     block::{BlockPosition, MaterialId},
///     terrain::TerrainGenerator,
///     world::WorldModel,
/// };
///
/// let mut world = WorldModel::new(TerrainGenerator::new(12345, 5, 15), 16, 0.1);
/// world.place_block(BlockPosition::new(0, 40, 0), MaterialId::Glass);
/// assert!(world.is_solid_at(BlockPosition::new(0, 40, 0)));
///
/// // Nothing holds it up, so the next scan starts it falling.
/// assert_eq!(world.gravity_tick().len(), 1);
/// assert!(!world.is_solid_at(BlockPosition::new(0, 40, 0)));
/// ```
pub struct WorldModel {
    chunks: ChunkStore,
    overlay: BlockOverlay,
    gravity: GravitySystem,
    pending: HashSet<ChunkCoordinate>,
    epoch: u64,
    visible: Vec<BlockRecord>,
    visible_dirty: bool,
}

impl WorldModel {
    /// Creates an empty world over `terrain`.
    ///
    /// # Arguments
    /// * `terrain` - Generator for chunk cache misses
    /// * `chunk_size` - Columns along each chunk edge
    /// * `landing_threshold` - Vertical speed under which falling blocks resettle
    pub fn new(terrain: TerrainGenerator, chunk_size: i32, landing_threshold: f32) -> Self {
        WorldModel {
            chunks: ChunkStore::new(Arc::new(terrain), chunk_size),
            overlay: BlockOverlay::new(),
            gravity: GravitySystem::new(landing_threshold),
            pending: HashSet::new(),
            epoch: 0,
            visible: Vec::new(),
            visible_dirty: false,
        }
    }

    /// The seed all terrain is generated from.
    pub fn seed(&self) -> u64 {
        self.chunks.terrain().seed()
    }

    /// The current terrain generator.
    pub fn terrain(&self) -> &Arc<TerrainGenerator> {
        self.chunks.terrain()
    }

    /// Columns along each chunk edge.
    pub fn chunk_size(&self) -> i32 {
        self.chunks.chunk_size()
    }

    /// Generation epoch; advances every time the terrain is replaced.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Resident chunks.
    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Player changes.
    pub fn overlay(&self) -> &BlockOverlay {
        &self.overlay
    }

    /// Falling blocks and the landing rule.
    pub fn gravity(&self) -> &GravitySystem {
        &self.gravity
    }

    /// Whether the cell at `position` is solid once overlay and terrain are merged.
    ///
    /// Terrain outside resident chunks is computed on the fly, so the answer does not depend
    /// on where the observer is.
    pub fn is_solid_at(&self, position: BlockPosition) -> bool {
        self.support().is_occupied(position)
    }

    /// Merged occupancy, for handing to a fall simulator.
    pub fn support(&self) -> LayeredSupport<'_> {
        LayeredSupport {
            overlay: &self.overlay,
            terrain: &self.chunks,
        }
    }

    /// Coordinates that are resident or already requested.
    pub fn loaded_or_pending(&self) -> HashSet<ChunkCoordinate> {
        let mut coordinates: HashSet<ChunkCoordinate> = self.pending.clone();
        coordinates.extend(self.chunks.resident_coordinates());
        coordinates
    }

    /// Whether a chunk at `coordinate` was requested and has not arrived yet.
    pub fn is_pending(&self, coordinate: ChunkCoordinate) -> bool {
        self.pending.contains(&coordinate)
    }

    /// Marks `coordinate` as requested.
    ///
    /// # Returns
    /// `true` if the caller should start generating it; `false` if it is already resident,
    /// in flight, or has columns outside the `i32` range.
    pub fn request_chunk(&mut self, coordinate: ChunkCoordinate) -> bool {
        if !coordinate.is_addressable(self.chunk_size()) || self.chunks.contains(coordinate) {
            return false;
        }
        self.pending.insert(coordinate)
    }

    /// Accepts a chunk generated off-thread.
    ///
    /// # Arguments
    /// * `chunk` - The generated chunk
    /// * `epoch` - Epoch the chunk was requested in
    ///
    /// # Returns
    /// `true` if the chunk became resident, `false` if it was discarded.
    pub fn accept_chunk(&mut self, chunk: Chunk, epoch: u64) -> bool {
        let coordinate = chunk.coordinate();
        if epoch != self.epoch {
            debug!(
                "Discarding chunk ({}, {}) from epoch {} (current {})",
                coordinate.x, coordinate.z, epoch, self.epoch
            );
            return false;
        }
        if !self.pending.remove(&coordinate) {
            debug!(
                "Discarding chunk ({}, {}): no longer wanted",
                coordinate.x, coordinate.z
            );
            return false;
        }
        let inserted = self.chunks.insert(chunk);
        self.visible_dirty |= inserted;
        inserted
    }

    /// Drops a resident chunk, or forgets a pending request so its result is discarded.
    ///
    /// # Returns
    /// `true` if anything was dropped.
    pub fn evict_chunk(&mut self, coordinate: ChunkCoordinate) -> bool {
        let was_pending = self.pending.remove(&coordinate);
        let was_resident = self.chunks.evict(coordinate);
        self.visible_dirty |= was_resident;
        was_pending || was_resident
    }

    /// Places a block, replacing any overlay block in that cell.
    ///
    /// Blocks resting on the cell are re-checked immediately.
    ///
    /// # Returns
    /// The id of the new block.
    pub fn place_block(&mut self, position: BlockPosition, material: MaterialId) -> BlockId {
        let id = self.overlay.place(position, material);
        self.gravity
            .check_around(position, &mut self.overlay, &self.chunks);
        self.visible_dirty = true;
        id
    }

    /// Breaks whatever occupies `position`.
    ///
    /// An overlay block is removed outright; a generated terrain cell is recorded as broken.
    /// Breaking an empty cell does nothing.
    ///
    /// # Returns
    /// `true` if something was broken.
    pub fn break_block(&mut self, position: BlockPosition) -> bool {
        let broken = if self.overlay.remove_at(position).is_some() {
            true
        } else if !self.overlay.is_terrain_removed(position) && self.chunks.is_occupied(position)
        {
            self.overlay.mark_terrain_removed(position)
        } else {
            false
        };

        if broken {
            self.gravity
                .check_around(position, &mut self.overlay, &self.chunks);
            self.visible_dirty = true;
        }
        broken
    }

    /// Runs a full support scan over the overlay.
    ///
    /// # Returns
    /// Ids of the blocks that started falling.
    pub fn gravity_tick(&mut self) -> Vec<BlockId> {
        let fell = self.gravity.tick(&mut self.overlay, &self.chunks);
        self.visible_dirty |= !fell.is_empty();
        fell
    }

    /// Advances every falling block through `simulator`.
    pub fn step_falling(&mut self, simulator: &mut dyn FallSimulator, dt: f32) -> Vec<FallOutcome> {
        let outcomes = self
            .gravity
            .step(simulator, dt, &mut self.overlay, &self.chunks);
        self.visible_dirty |= outcomes
            .iter()
            .any(|outcome| matches!(outcome, FallOutcome::Landed { .. }));
        outcomes
    }

    /// Applies one externally produced fall report.
    pub fn apply_fall_report(&mut self, report: FallReport) -> FallOutcome {
        let outcome = self
            .gravity
            .apply_report(report, &mut self.overlay, &self.chunks);
        if let FallOutcome::Landed { .. } = outcome {
            self.visible_dirty = true;
        }
        outcome
    }

    /// Blocks currently falling.
    pub fn falling_blocks(&self) -> &[FallingBlock] {
        self.gravity.falling()
    }

    /// The merged list of static solid cells: resident terrain minus broken cells, with
    /// overlay blocks taking precedence.
    ///
    /// Terrain comes first, ordered by chunk coordinate, followed by overlay blocks in
    /// placement order. The list is rebuilt only after something changed.
    pub fn visible_blocks(&mut self) -> &[BlockRecord] {
        if self.visible_dirty {
            self.rebuild_visible();
        }
        &self.visible
    }

    fn rebuild_visible(&mut self) {
        let mut coordinates = self.chunks.resident_coordinates();
        coordinates.sort();

        let overlay = &self.overlay;
        let mut visible: Vec<BlockRecord> = coordinates
            .iter()
            .filter_map(|coordinate| self.chunks.get_resident(*coordinate))
            .flat_map(|chunk| chunk.blocks().iter())
            .filter(|block| {
                !overlay.is_terrain_removed(block.position) && !overlay.has(block.position)
            })
            .copied()
            .collect();
        visible.extend(
            overlay
                .all()
                .into_iter()
                .map(|block| BlockRecord::new(block.position, block.material)),
        );

        self.visible = visible;
        self.visible_dirty = false;
    }

    /// Overlay blocks as plain records, in placement order.
    pub fn overlay_records(&self) -> Vec<BlockRecord> {
        self.overlay
            .all()
            .into_iter()
            .map(|block| BlockRecord::new(block.position, block.material))
            .collect()
    }

    /// Overlay blocks plus every falling block placed where it currently is.
    ///
    /// A falling block takes its landing cell, or the first cell above it that is free in
    /// the world and not already given to another falling block. Every record therefore has
    /// its own cell.
    pub fn settled_records(&self) -> Vec<BlockRecord> {
        let support = self.support();
        let mut records = self.overlay_records();
        let mut claimed: HashSet<BlockPosition> = HashSet::new();

        for block in self.gravity.falling() {
            let mut cell = Some(landing_cell(block.position));
            while let Some(candidate) = cell {
                if !support.is_occupied(candidate) && !claimed.contains(&candidate) {
                    break;
                }
                cell = candidate
                    .y
                    .checked_add(1)
                    .map(|y| BlockPosition::new(candidate.x, y, candidate.z));
            }
            match cell {
                Some(cell) => {
                    claimed.insert(cell);
                    records.push(BlockRecord::new(cell, block.material));
                }
                None => warn!("No free cell to record falling block {}", block.id),
            }
        }
        records
    }

    /// Replaces the whole world: new terrain, no resident chunks, and an overlay rebuilt
    /// from `blocks` and `removed_terrain`.
    ///
    /// Falling blocks are dropped and the epoch advances, so chunk results still in flight
    /// for the old terrain are discarded when they arrive.
    pub fn restore(
        &mut self,
        terrain: TerrainGenerator,
        blocks: &[BlockRecord],
        removed_terrain: &[BlockPosition],
    ) {
        self.epoch += 1;
        self.chunks.reset(Arc::new(terrain));
        self.pending.clear();
        self.gravity.clear();
        self.overlay.clear();
        for position in removed_terrain {
            self.overlay.mark_terrain_removed(*position);
        }
        for block in blocks {
            self.overlay.place(block.position, block.material);
        }
        self.visible.clear();
        self.visible_dirty = true;
        debug!(
            "World restored: seed {}, {} overlay block(s), {} broken cell(s), epoch {}",
            self.seed(),
            self.overlay.len(),
            removed_terrain.len(),
            self.epoch
        );
    }
}
