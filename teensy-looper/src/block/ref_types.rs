use core::ops::{Deref, DerefMut};

use super::pool::BlockPool;
use super::Samples;

/// Exclusive (mutable) handle to a pool block.
///
/// This is the scoped guard a producing node holds while it fills a block:
/// every exit path drops it, and dropping releases the slot.
pub struct BlockMut<'p> {
    pool: &'p BlockPool,
    slot: u8,
}

impl<'p> BlockMut<'p> {
    /// The slot must have just been claimed with refcount 1.
    pub(crate) fn new(pool: &'p BlockPool, slot: u8) -> Self {
        BlockMut { pool, slot }
    }

    /// Convert into a shared handle without touching the refcount.
    pub fn into_shared(self) -> BlockRef<'p> {
        let handle = BlockRef {
            pool: self.pool,
            slot: self.slot,
        };
        core::mem::forget(self);
        handle
    }

    /// Pool slot index.
    pub fn slot(&self) -> u8 {
        self.slot
    }
}

impl Deref for BlockMut<'_> {
    type Target = Samples;

    fn deref(&self) -> &Self::Target {
        // SAFETY: a BlockMut is the only handle to its slot.
        unsafe { &(*self.pool.data_ptr(self.slot)).samples }
    }
}

impl DerefMut for BlockMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: a BlockMut is the only handle to its slot.
        unsafe { &mut (*self.pool.data_ptr(self.slot)).samples }
    }
}

impl Drop for BlockMut<'_> {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}

/// Shared (immutable) handle to a pool block.
///
/// Cloning retains the slot; dropping releases it. When the last handle goes
/// away the block returns to the pool.
pub struct BlockRef<'p> {
    pool: &'p BlockPool,
    slot: u8,
}

impl<'p> BlockRef<'p> {
    /// Pool slot index.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Number of handles currently sharing this block.
    pub fn refcount(&self) -> u8 {
        self.pool.refcount(self.slot)
    }

    /// Turn back into an exclusive handle.
    ///
    /// Sole owners convert in place. Otherwise the data is copied into a new
    /// block; `None` if the pool is exhausted.
    pub fn into_mut(self) -> Option<BlockMut<'p>> {
        if self.refcount() == 1 {
            let handle = BlockMut::new(self.pool, self.slot);
            core::mem::forget(self);
            Some(handle)
        } else {
            let mut copy = self.pool.allocate()?;
            copy.copy_from_slice(&self[..]);
            Some(copy)
        }
    }
}

impl Deref for BlockRef<'_> {
    type Target = Samples;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the slot stays allocated while any handle exists and shared
        // handles never write.
        unsafe { &(*self.pool.data_ptr(self.slot)).samples }
    }
}

impl Clone for BlockRef<'_> {
    fn clone(&self) -> Self {
        self.pool.retain(self.slot);
        BlockRef {
            pool: self.pool,
            slot: self.slot,
        }
    }
}

impl Drop for BlockRef<'_> {
    fn drop(&mut self) {
        self.pool.release(self.slot);
    }
}
