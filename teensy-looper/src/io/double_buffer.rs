//! Ping-pong sample buffer shared between bus DMA and the scheduler.
//!
//! ```text
//!             toggle (written only by the completion interrupt)
//!                 │
//!   ┌─────────────▼─────────────┐
//!   │  half 0      │  half 1    │
//!   │  (hardware)  │ (software) │   after one completion the roles swap
//!   └───────────────────────────┘
//! ```
//!
//! Software only ever sees the half it owns, through
//! [`with_software_half`](DoubleBuffer::with_software_half) and
//! [`with_software_half_mut`](DoubleBuffer::with_software_half_mut). The
//! hardware-owned half is reachable only as a raw DMA address.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Two `WORDS`-long halves plus the ownership toggle.
///
/// Place it in a `static` (and DMA-capable memory) on hardware:
///
/// ```ignore
/// #[link_section = ".dmabss"]
/// static TX: DoubleBuffer<128> = DoubleBuffer::new();
/// ```
pub struct DoubleBuffer<const WORDS: usize> {
    halves: [UnsafeCell<[u32; WORDS]>; 2],
    /// Index of the software-owned half.
    software: AtomicU8,
    /// Set while an accessor closure holds the software half.
    borrowed: AtomicBool,
}

// SAFETY: the DMA engine only touches the hardware-owned half, software only
// touches the half named by `software`, and `borrowed` prevents two accessor
// closures from aliasing it.
unsafe impl<const WORDS: usize> Sync for DoubleBuffer<WORDS> {}

impl<const WORDS: usize> DoubleBuffer<WORDS> {
    /// Both halves silent. Hardware starts on half 0, software owns half 1.
    pub const fn new() -> Self {
        DoubleBuffer {
            halves: [UnsafeCell::new([0; WORDS]), UnsafeCell::new([0; WORDS])],
            software: AtomicU8::new(1),
            borrowed: AtomicBool::new(false),
        }
    }

    /// Length of one half in words.
    pub const fn words(&self) -> usize {
        WORDS
    }

    /// Index (0 or 1) of the half software currently owns.
    pub fn software_half(&self) -> usize {
        self.software.load(Ordering::Acquire) as usize
    }

    /// Run `f` over the software-owned half. Returns `None` if the half is
    /// already borrowed by an enclosing accessor.
    pub fn with_software_half<R>(&self, f: impl FnOnce(&[u32; WORDS]) -> R) -> Option<R> {
        let _guard = self.borrow()?;
        // SAFETY: the guard gives exclusive software access and DMA is
        // working on the other half.
        let half = unsafe { &*self.halves[self.software_half()].get() };
        Some(f(half))
    }

    /// Mutable variant of [`with_software_half`](Self::with_software_half).
    pub fn with_software_half_mut<R>(
        &self,
        f: impl FnOnce(&mut [u32; WORDS]) -> R,
    ) -> Option<R> {
        let _guard = self.borrow()?;
        // SAFETY: as above.
        let half = unsafe { &mut *self.halves[self.software_half()].get() };
        Some(f(half))
    }

    /// DMA address of half `index`.
    pub fn half_address(&self, index: usize) -> usize {
        self.halves[index & 1].get() as usize
    }

    /// Hand the half software owns back to hardware and take the other one.
    pub(crate) fn flip(&self) {
        self.software.fetch_xor(1, Ordering::AcqRel);
    }

    /// Force software ownership onto `index`, used to resynchronise after a
    /// missed completion.
    pub(crate) fn set_software_half(&self, index: usize) {
        self.software.store((index & 1) as u8, Ordering::Release);
    }

    /// Reset ownership to the power-on arrangement and silence both halves.
    pub(crate) fn reset(&self) {
        if let Some(_guard) = self.borrow() {
            for half in &self.halves {
                // SAFETY: called before the bus is enabled, so DMA holds no half.
                unsafe { (*half.get()).fill(0) };
            }
            self.software.store(1, Ordering::Release);
        }
    }

    fn borrow(&self) -> Option<BorrowGuard<'_>> {
        self.borrowed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(BorrowGuard(&self.borrowed))
    }

    /// Copy of half `index`, regardless of ownership, for simulated
    /// hardware in tests.
    #[cfg(test)]
    pub(crate) fn peek(&self, index: usize) -> [u32; WORDS] {
        // SAFETY: tests have no real DMA engine.
        unsafe { *self.halves[index & 1].get() }
    }

    /// Simulated DMA write into half `index`.
    #[cfg(test)]
    pub(crate) fn poke(&self, index: usize, words: &[u32; WORDS]) {
        // SAFETY: tests have no real DMA engine.
        unsafe { *self.halves[index & 1].get() = *words };
    }
}

impl<const WORDS: usize> Default for DoubleBuffer<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

struct BorrowGuard<'a>(&'a AtomicBool);

impl Drop for BorrowGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
