//! Fixed-size audio blocks and the reference-counted pool that owns them.
//!
//! Blocks are handed out as RAII handles: [`BlockMut`] for the producer that
//! just allocated a block and [`BlockRef`] for shared, read-only fan-out.
//! Cloning a `BlockRef` retains the slot; dropping either handle releases it.

pub mod pool;
mod ref_types;

pub use pool::{BlockData, BlockPool};
pub use ref_types::{BlockMut, BlockRef};

use crate::constants::AUDIO_BLOCK_SAMPLES;

/// One block period worth of signed 16-bit samples.
pub type Samples = [i16; AUDIO_BLOCK_SAMPLES];
