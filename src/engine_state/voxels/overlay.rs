//! # Block Overlay
//!
//! The mutable layer of player changes that sits on top of generated terrain:
//! blocks players placed (or that gravity resettled), and terrain cells players broke.
//! Unlike chunks, this layer is persisted.
//!
//! Placement and removal are O(1) through a position index. Placing into an occupied cell
//! replaces the previous block (last write wins), and removing an id that no longer exists
//! is a no-op; UI events routinely fire twice for one intent.

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use super::block::{BlockPosition, MaterialId, SupportQuery};

/// Unique identifier of an overlay block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A static block in the overlay.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OverlayBlock {
    /// Identifier assigned at placement.
    pub id: BlockId,
    /// Cell the block occupies.
    pub position: BlockPosition,
    /// What the block is made of.
    pub material: MaterialId,
}

/// Player-placed blocks plus broken terrain cells.
#[derive(Default)]
pub struct BlockOverlay {
    next_id: u64,
    blocks: HashMap<BlockId, OverlayBlock>,
    by_position: HashMap<BlockPosition, BlockId>,
    removed_terrain: HashSet<BlockPosition>,
}

impl BlockOverlay {
    /// Creates an empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a block at `position`, replacing whatever overlay block was there.
    ///
    /// # Returns
    /// The id of the new block.
    pub fn place(&mut self, position: BlockPosition, material: MaterialId) -> BlockId {
        self.remove_at(position);

        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.insert(
            id,
            OverlayBlock {
                id,
                position,
                material,
            },
        );
        self.by_position.insert(position, id);
        id
    }

    /// Removes the block with `id`.
    ///
    /// # Returns
    /// The removed block, or `None` if no block had that id.
    pub fn remove(&mut self, id: BlockId) -> Option<OverlayBlock> {
        let block = self.blocks.remove(&id)?;
        self.by_position.remove(&block.position);
        Some(block)
    }

    /// Removes whatever block occupies `position`.
    pub fn remove_at(&mut self, position: BlockPosition) -> Option<OverlayBlock> {
        let id = *self.by_position.get(&position)?;
        self.remove(id)
    }

    /// Whether an overlay block occupies `position`.
    pub fn has(&self, position: BlockPosition) -> bool {
        self.by_position.contains_key(&position)
    }

    /// The block with `id`, if it still exists.
    pub fn get(&self, id: BlockId) -> Option<&OverlayBlock> {
        self.blocks.get(&id)
    }

    /// The block occupying `position`, if any.
    pub fn get_at(&self, position: BlockPosition) -> Option<&OverlayBlock> {
        self.by_position
            .get(&position)
            .and_then(|id| self.blocks.get(id))
    }

    /// All blocks ordered by id, i.e. by placement order.
    pub fn all(&self) -> Vec<OverlayBlock> {
        let mut blocks: Vec<OverlayBlock> = self.blocks.values().copied().collect();
        blocks.sort_by_key(|block| block.id);
        blocks
    }

    /// Iterates over all blocks in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &OverlayBlock> {
        self.blocks.values()
    }

    /// Number of overlay blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the overlay holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Records that the generated terrain cell at `position` was broken.
    ///
    /// # Returns
    /// `false` if the cell was already recorded.
    pub fn mark_terrain_removed(&mut self, position: BlockPosition) -> bool {
        self.removed_terrain.insert(position)
    }

    /// Whether the generated terrain cell at `position` was broken.
    pub fn is_terrain_removed(&self, position: BlockPosition) -> bool {
        self.removed_terrain.contains(&position)
    }

    /// Broken terrain cells, sorted by `(x, y, z)`.
    pub fn removed_terrain(&self) -> Vec<BlockPosition> {
        let mut cells: Vec<BlockPosition> = self.removed_terrain.iter().copied().collect();
        cells.sort_by_key(|p| (p.x, p.y, p.z));
        cells
    }

    /// Drops every block and every terrain removal. Ids keep increasing.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.by_position.clear();
        self.removed_terrain.clear();
    }
}

/// Overlay layered over another occupancy source, normally generated terrain.
///
/// A cell is occupied when an overlay block sits in it, or when the underlying source has
/// it and the overlay has not recorded it as broken.
pub struct LayeredSupport<'a> {
    /// Player changes.
    pub overlay: &'a BlockOverlay,
    /// Occupancy underneath the overlay.
    pub terrain: &'a dyn SupportQuery,
}

impl SupportQuery for LayeredSupport<'_> {
    fn is_occupied(&self, position: BlockPosition) -> bool {
        self.overlay.has(position)
            || (!self.overlay.is_terrain_removed(position) && self.terrain.is_occupied(position))
    }
}
