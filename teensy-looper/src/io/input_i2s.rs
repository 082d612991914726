//! Receive endpoint: turns the software-owned RX half into graph blocks.
//!
//! ```text
//! codec ADC ──DMA──► [ half 0 | half 1 ] ──unpack──► out[0] (ch 0)
//!                                           └──────► out[1] (ch 1)
//! ```

use crate::block::{BlockMut, BlockPool, BlockRef};
use crate::error::ConfigError;
use crate::node::AudioNode;

use super::double_buffer::DoubleBuffer;
use super::interleave::FrameLayout;

/// Source node with one output per layout channel.
///
/// Each pass reads the half the last completion interrupt handed to
/// software. A channel whose block cannot be allocated is skipped.
pub struct I2sInput<'b, const WORDS: usize> {
    buffer: &'b DoubleBuffer<WORDS>,
    layout: FrameLayout,
}

impl<'b, const WORDS: usize> I2sInput<'b, WORDS> {
    /// Fails unless each half of `buffer` holds one block period in `layout`.
    pub fn new(buffer: &'b DoubleBuffer<WORDS>, layout: FrameLayout) -> Result<Self, ConfigError> {
        layout.check_block_words(WORDS)?;
        Ok(I2sInput { buffer, layout })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }
}

impl<const WORDS: usize> AudioNode for I2sInput<'_, WORDS> {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        self.layout.channels()
    }

    fn update<'p>(
        &mut self,
        pool: &'p BlockPool,
        _inputs: &[Option<BlockRef<'p>>],
        outputs: &mut [Option<BlockMut<'p>>],
    ) {
        let layout = self.layout;
        self.buffer.with_software_half(|half| {
            for (channel, slot) in outputs.iter_mut().enumerate() {
                if let Some(mut block) = pool.allocate() {
                    layout.unpack(half, channel, &mut block[..]);
                    *slot = Some(block);
                }
            }
        });
    }
}
