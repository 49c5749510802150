//! # Chunk Creation Module
//!
//! Builder used by the terrain generator to assemble a `Chunk` column by column while
//! keeping the block list and the solidity bit vector consistent with each other.

use bitvec::vec::BitVec;

use crate::engine_state::voxels::block::{BlockRecord, GROUND_FLOOR};

use super::{Chunk, ChunkCoordinate};

/// Accumulates the columns of a chunk and produces the finished `Chunk`.
///
/// Columns must be started with [`ChunkBuilder::begin_column`] in x-major order
/// (`local_x` outer, `local_z` inner), matching the order the generator walks them.
pub struct ChunkBuilder {
    coordinate: ChunkCoordinate,
    size: i32,
    column_heights: Vec<i32>,
    blocks: Vec<BlockRecord>,
}

impl ChunkBuilder {
    /// Creates an empty builder for the chunk at `coordinate`.
    pub fn new(coordinate: ChunkCoordinate, size: i32) -> Self {
        let side = size.max(0) as usize;
        let columns = side * side;
        ChunkBuilder {
            coordinate,
            size,
            column_heights: Vec::with_capacity(columns),
            blocks: Vec::new(),
        }
    }

    /// Starts the next column with the given surface height.
    pub fn begin_column(&mut self, height: i32) {
        self.column_heights.push(height);
    }

    /// Appends an occupied cell to the current column.
    pub fn push_block(&mut self, block: BlockRecord) {
        self.blocks.push(block);
    }

    /// Finishes the chunk, filling in the solidity bit vector from the pushed blocks.
    pub fn build(self) -> Chunk {
        let span = self.column_heights.iter().copied().max().unwrap_or(0).max(0);
        let origin = self.coordinate.origin(self.size);

        let mut solid_array = BitVec::repeat(false, self.column_heights.len() * span as usize);
        for block in &self.blocks {
            let local_x = block.position.x - origin.x;
            let local_z = block.position.z - origin.z;
            let column = local_x as usize * self.size as usize + local_z as usize;
            let bit = column * span as usize + (block.position.y - GROUND_FLOOR) as usize;
            solid_array.set(bit, true);
        }

        Chunk {
            coordinate: self.coordinate,
            size: self.size,
            span,
            column_heights: self.column_heights,
            solid_array,
            blocks: self.blocks,
        }
    }
}
