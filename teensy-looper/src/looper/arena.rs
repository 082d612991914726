//! Bump allocator over the loop memory.
//!
//! Clips take contiguous runs of blocks from the front; space comes back
//! only through [`LoopArena::rollback`] or [`LoopArena::clear`].

use crate::block::Samples;

pub struct LoopArena<'a> {
    blocks: &'a mut [Samples],
    cursor: usize,
}

impl<'a> LoopArena<'a> {
    pub fn new(blocks: &'a mut [Samples]) -> Self {
        LoopArena { blocks, cursor: 0 }
    }

    /// Take `count` zeroed blocks. Returns the index of the first one.
    pub fn reserve(&mut self, count: usize) -> Option<usize> {
        if count > self.remaining() {
            return None;
        }
        let start = self.cursor;
        for block in &mut self.blocks[start..start + count] {
            block.fill(0);
        }
        self.cursor += count;
        Some(start)
    }

    /// Give back everything from `index` onwards.
    pub fn rollback(&mut self, index: usize) {
        self.cursor = self.cursor.min(index);
    }

    pub fn clear(&mut self) {
        self.cursor = 0;
    }

    pub fn block(&self, index: usize) -> &Samples {
        &self.blocks[index]
    }

    pub fn block_mut(&mut self, index: usize) -> &mut Samples {
        &mut self.blocks[index]
    }

    /// Write cursor: blocks handed out so far.
    pub fn used(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.blocks.len() - self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }
}
