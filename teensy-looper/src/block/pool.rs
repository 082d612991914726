use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::constants::{AUDIO_BLOCK_SAMPLES, POOL_CAPACITY_MAX};
use crate::error::ConfigError;

use super::ref_types::BlockMut;

/// Number of 32-bit bitmap words covering every slot.
const BITMAP_WORDS: usize = POOL_CAPACITY_MAX.div_ceil(32);

/// Raw audio block storage: 128 signed 16-bit samples, 4-byte aligned.
#[repr(C, align(4))]
pub struct BlockData {
    pub samples: [i16; AUDIO_BLOCK_SAMPLES],
}

impl BlockData {
    const fn zeroed() -> Self {
        BlockData {
            samples: [0i16; AUDIO_BLOCK_SAMPLES],
        }
    }
}

/// Fixed-capacity, lock-free pool of reference-counted audio blocks.
///
/// An atomic bitmap tracks which slots are taken and each slot carries an
/// atomic reference count, so allocation and release are O(1) and safe to
/// call from the DMA completion interrupt as well as from the scheduler.
///
/// A freshly constructed pool hands out nothing until [`init`](Self::init)
/// sets its usable capacity, mirroring `AudioMemory(n)` on the Teensy.
///
/// ```ignore
/// static POOL: BlockPool = BlockPool::new();
///
/// POOL.init(24)?;
/// let block = POOL.allocate().ok_or(..)?;
/// ```
pub struct BlockPool {
    /// Bit N set means slot N is either allocated or beyond the capacity.
    bitmap: [AtomicU32; BITMAP_WORDS],
    refcounts: [AtomicU8; POOL_CAPACITY_MAX],
    storage: [UnsafeCell<BlockData>; POOL_CAPACITY_MAX],
    capacity: AtomicU32,
    in_use: AtomicU32,
    high_water: AtomicU32,
    alloc_failures: AtomicU32,
}

// SAFETY: all bookkeeping is atomic. A slot's storage is only written through
// the unique `BlockMut` created right after the bitmap claim, and only read
// through handles that keep the slot's refcount above zero.
unsafe impl Sync for BlockPool {}

impl BlockPool {
    /// Create an empty pool with zero usable capacity.
    #[allow(clippy::declare_interior_mut_const)]
    pub const fn new() -> Self {
        const FULL: AtomicU32 = AtomicU32::new(u32::MAX);
        const ZERO_REFCOUNT: AtomicU8 = AtomicU8::new(0);
        const EMPTY: UnsafeCell<BlockData> = UnsafeCell::new(BlockData::zeroed());
        BlockPool {
            bitmap: [FULL; BITMAP_WORDS],
            refcounts: [ZERO_REFCOUNT; POOL_CAPACITY_MAX],
            storage: [EMPTY; POOL_CAPACITY_MAX],
            capacity: AtomicU32::new(0),
            in_use: AtomicU32::new(0),
            high_water: AtomicU32::new(0),
            alloc_failures: AtomicU32::new(0),
        }
    }

    /// Set the number of usable blocks and free all of them.
    ///
    /// Call once during setup, before the first scheduler pass. Any handle
    /// still alive when this runs is invalidated.
    pub fn init(&self, block_count: usize) -> Result<(), ConfigError> {
        if block_count == 0 || block_count > POOL_CAPACITY_MAX {
            log::error!("pool: capacity {} outside 1..={}", block_count, POOL_CAPACITY_MAX);
            return Err(ConfigError::PoolCapacity(block_count));
        }
        for (word, bits) in self.bitmap.iter().enumerate() {
            let first = word * 32;
            let usable = block_count.saturating_sub(first).min(32);
            let free_mask = if usable == 32 { u32::MAX } else { (1u32 << usable) - 1 };
            bits.store(!free_mask, Ordering::Release);
        }
        for rc in &self.refcounts {
            rc.store(0, Ordering::Release);
        }
        self.capacity.store(block_count as u32, Ordering::Release);
        self.in_use.store(0, Ordering::Release);
        self.high_water.store(0, Ordering::Release);
        self.alloc_failures.store(0, Ordering::Release);
        log::debug!("pool: initialised with {} blocks", block_count);
        Ok(())
    }

    /// Allocate a zeroed block. Returns `None` when the pool is exhausted.
    ///
    /// Never blocks. The returned handle releases the slot on drop.
    pub fn allocate(&self) -> Option<BlockMut<'_>> {
        self.claim_slot().map(|slot| BlockMut::new(self, slot))
    }

    fn claim_slot(&self) -> Option<u8> {
        for (word, bits) in self.bitmap.iter().enumerate() {
            let mut current = bits.load(Ordering::Acquire);
            while current != u32::MAX {
                let bit_index = (!current).trailing_zeros();
                let bit = 1u32 << bit_index;
                match bits.compare_exchange_weak(
                    current,
                    current | bit,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        let slot = word * 32 + bit_index as usize;
                        self.refcounts[slot].store(1, Ordering::Release);
                        // SAFETY: the bitmap CAS above gave us exclusive ownership.
                        unsafe {
                            *self.storage[slot].get() = BlockData::zeroed();
                        }
                        let used = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
                        self.high_water.fetch_max(used, Ordering::AcqRel);
                        return Some(slot as u8);
                    }
                    // Raced with another context, retry with the fresh value.
                    Err(actual) => current = actual,
                }
            }
        }
        self.alloc_failures.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Increment the reference count of an allocated slot.
    pub(crate) fn retain(&self, slot: u8) {
        let old = self.refcounts[slot as usize].fetch_add(1, Ordering::AcqRel);
        debug_assert!(old > 0, "retain on unallocated slot");
        debug_assert!(old < u8::MAX, "refcount overflow");
    }

    /// Decrement the reference count; at zero the slot returns to the free bitmap.
    pub(crate) fn release(&self, slot: u8) {
        let old = self.refcounts[slot as usize].fetch_sub(1, Ordering::AcqRel);
        debug_assert!(old > 0, "release on slot with refcount 0");
        if old == 1 {
            let word = slot as usize / 32;
            let bit = 1u32 << (slot as u32 % 32);
            self.in_use.fetch_sub(1, Ordering::AcqRel);
            self.bitmap[word].fetch_and(!bit, Ordering::Release);
        }
    }

    /// Current reference count of a slot (0 when free).
    pub fn refcount(&self, slot: u8) -> u8 {
        self.refcounts[slot as usize].load(Ordering::Acquire)
    }

    /// Pointer to the storage of a slot.
    ///
    /// # Safety
    /// The slot must be allocated, and the caller must respect the
    /// exclusive/shared discipline of `BlockMut`/`BlockRef`.
    pub(crate) unsafe fn data_ptr(&self, slot: u8) -> *mut BlockData {
        self.storage[slot as usize].get()
    }

    /// Usable capacity set by [`init`](Self::init).
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire) as usize
    }

    /// Number of blocks currently allocated.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire) as usize
    }

    /// Most blocks ever allocated at once since init or the last reset.
    pub fn high_water(&self) -> usize {
        self.high_water.load(Ordering::Acquire) as usize
    }

    /// Number of allocation requests that found the pool exhausted.
    pub fn alloc_failures(&self) -> u32 {
        self.alloc_failures.load(Ordering::Relaxed)
    }

    /// Restart the high-water mark from the current usage and clear failures.
    pub fn reset_high_water(&self) {
        self.high_water.store(self.in_use.load(Ordering::Acquire), Ordering::Release);
        self.alloc_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for BlockPool {
    fn default() -> Self {
        Self::new()
    }
}
