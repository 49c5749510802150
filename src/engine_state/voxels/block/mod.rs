//! # Block Module
//!
//! This module provides the block-level vocabulary shared by terrain generation, the
//! overlay and the gravity system: materials, cell positions and block records.

use cgmath::Point3;

pub mod material;

pub use material::MaterialId;

/// The underlying integer type used to represent materials in memory.
pub type MaterialSize = u8;

/// Integer position of a single cell in world coordinates.
pub type BlockPosition = Point3<i32>;

/// The lowest height a static block can rest at. Blocks at or below this height never
/// need support.
pub const GROUND_FLOOR: i32 = 1;

/// A solid cell: where it is and what it is made of.
///
/// This is the unit handed to the rendering collaborator and the unit a chunk is made of.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockRecord {
    /// Cell position in world coordinates.
    pub position: BlockPosition,
    /// Material occupying the cell.
    pub material: MaterialId,
}

impl BlockRecord {
    /// Creates a new block record.
    pub fn new(position: BlockPosition, material: MaterialId) -> Self {
        BlockRecord { position, material }
    }
}

/// Answers whether a cell is occupied.
///
/// Gravity and fall simulation only ever need this one question, so they take it as a
/// trait object instead of a concrete world type.
pub trait SupportQuery {
    /// Returns `true` if the cell at `position` holds a solid block.
    fn is_occupied(&self, position: BlockPosition) -> bool;
}

/// An occupancy source with nothing in it.
///
/// Used when only the overlay should count, e.g. in a flat test world.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTerrain;

impl SupportQuery for NoTerrain {
    fn is_occupied(&self, _position: BlockPosition) -> bool {
        false
    }
}
