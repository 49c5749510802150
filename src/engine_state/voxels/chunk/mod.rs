//! # Chunk Module
//!
//! This module provides the `Chunk` struct: the generated terrain of one square tile of
//! columns, and `ChunkCoordinate`, the key chunks are cached under.
//!
//! ## Storage
//!
//! A chunk keeps two views of the same data:
//! - `blocks`: every occupied cell as a `BlockRecord`, in generation order. This is what
//!   gets merged into the visible block list.
//! - `solid_array`: one bit per cell of the chunk's bounding box (columns × vertical span),
//!   giving O(1) solidity checks without scanning `blocks`.
//!
//! Chunks are immutable once built. They are never persisted; the same seed and
//! coordinate always regenerate the same chunk.

use std::ops::RangeInclusive;

use bitvec::prelude::BitVec;
use cgmath::Point3;

use super::block::{BlockPosition, BlockRecord, GROUND_FLOOR};

pub mod chunk_creation;

/// Default number of columns along each horizontal edge of a chunk.
pub const CHUNK_DIMENSION: i32 = 16;

/// Identifies a chunk by its position on the horizontal chunk grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoordinate {
    /// Chunk index along world x.
    pub x: i32,
    /// Chunk index along world z.
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a chunk coordinate.
    pub fn new(x: i32, z: i32) -> Self {
        ChunkCoordinate { x, z }
    }

    /// Chunk indices whose every column lies inside the `i32` coordinate range.
    ///
    /// `size` must be at least 1.
    pub fn addressable_range(size: i32) -> RangeInclusive<i32> {
        let per_side = (1i64 << 31) / i64::from(size.max(1));
        (-per_side) as i32..=(per_side - 1) as i32
    }

    /// Whether every column of this chunk has an `i32` world coordinate.
    pub fn is_addressable(&self, size: i32) -> bool {
        let range = Self::addressable_range(size);
        range.contains(&self.x) && range.contains(&self.z)
    }

    /// The chunk containing the world-space point `(x, z)` for chunks of `size` columns.
    ///
    /// Uses floor division so that negative positions map to negative chunks. Points beyond
    /// the addressable range map to the nearest edge chunk.
    pub fn containing(x: f32, z: f32, size: i32) -> Self {
        let range = Self::addressable_range(size);
        let size = size as f32;
        let clamp = |v: f32| ((v / size).floor() as i32).clamp(*range.start(), *range.end());
        ChunkCoordinate {
            x: clamp(x),
            z: clamp(z),
        }
    }

    /// The chunk containing the cell at `position`.
    pub fn of_block(position: BlockPosition, size: i32) -> Self {
        ChunkCoordinate {
            x: position.x.div_euclid(size),
            z: position.z.div_euclid(size),
        }
    }

    /// World position of the chunk's lowest corner column, at y=0.
    ///
    /// Exact for addressable chunks; saturates outside that range.
    pub fn origin(&self, size: i32) -> BlockPosition {
        Point3::new(self.x.saturating_mul(size), 0, self.z.saturating_mul(size))
    }

    /// Chebyshev distance between two chunk coordinates, saturating at `i32::MAX`.
    pub fn chebyshev_distance(&self, other: &ChunkCoordinate) -> i32 {
        let distance = self.x.abs_diff(other.x).max(self.z.abs_diff(other.z));
        i32::try_from(distance).unwrap_or(i32::MAX)
    }
}

/// The generated terrain of one chunk.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// The coordinate this chunk was generated for.
    coordinate: ChunkCoordinate,

    /// Number of columns along each edge.
    size: i32,

    /// Height of the tallest column; the vertical span of `solid_array`.
    span: i32,

    /// Surface height of each column, indexed by `local_x * size + local_z`.
    column_heights: Vec<i32>,

    /// One bit per cell, indexed by `column * span + (y - GROUND_FLOOR)`.
    solid_array: BitVec,

    /// Every occupied cell, in generation order.
    blocks: Vec<BlockRecord>,
}

impl Chunk {
    /// The coordinate this chunk was generated for.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// Number of columns along each edge.
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Every occupied cell, in generation order.
    pub fn blocks(&self) -> &[BlockRecord] {
        &self.blocks
    }

    /// Surface height of the column at world `(x, z)`, if the column belongs to this chunk.
    pub fn column_height(&self, x: i32, z: i32) -> Option<i32> {
        self.column_index(x, z).map(|index| self.column_heights[index])
    }

    /// Checks whether the cell at world `position` is occupied by generated terrain.
    ///
    /// # Returns
    /// `false` for air and for positions outside this chunk.
    pub fn is_solid(&self, position: BlockPosition) -> bool {
        if position.y < GROUND_FLOOR || position.y >= GROUND_FLOOR.saturating_add(self.span) {
            return false;
        }
        match self.column_index(position.x, position.z) {
            Some(column) => {
                let bit = column * self.span as usize + (position.y - GROUND_FLOOR) as usize;
                self.solid_array[bit]
            }
            None => false,
        }
    }

    fn column_index(&self, x: i32, z: i32) -> Option<usize> {
        let origin = self.coordinate.origin(self.size);
        let local_x = x.checked_sub(origin.x)?;
        let local_z = z.checked_sub(origin.z)?;
        if (0..self.size).contains(&local_x) && (0..self.size).contains(&local_z) {
            Some(local_x as usize * self.size as usize + local_z as usize)
        } else {
            None
        }
    }
}
