//! Transmit endpoint: packs graph blocks into the software-owned TX half.

use crate::block::{BlockMut, BlockPool, BlockRef};
use crate::error::ConfigError;
use crate::node::AudioNode;

use super::double_buffer::DoubleBuffer;
use super::interleave::FrameLayout;

/// Sink node with one input per layout channel.
///
/// Missing inputs are written as silence, so an exhausted pool or an
/// unconnected port never replays stale samples.
pub struct I2sOutput<'b, const WORDS: usize> {
    buffer: &'b DoubleBuffer<WORDS>,
    layout: FrameLayout,
}

impl<'b, const WORDS: usize> I2sOutput<'b, WORDS> {
    /// Fails unless each half of `buffer` holds one block period in `layout`.
    pub fn new(buffer: &'b DoubleBuffer<WORDS>, layout: FrameLayout) -> Result<Self, ConfigError> {
        layout.check_block_words(WORDS)?;
        Ok(I2sOutput { buffer, layout })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }
}

impl<const WORDS: usize> AudioNode for I2sOutput<'_, WORDS> {
    fn num_inputs(&self) -> usize {
        self.layout.channels()
    }

    fn num_outputs(&self) -> usize {
        0
    }

    fn update<'p>(
        &mut self,
        _pool: &'p BlockPool,
        inputs: &[Option<BlockRef<'p>>],
        _outputs: &mut [Option<BlockMut<'p>>],
    ) {
        let layout = self.layout;
        self.buffer.with_software_half_mut(|half| {
            for (channel, input) in inputs.iter().enumerate() {
                layout.pack(half, channel, input.as_ref().map(|b| &b[..]));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AUDIO_BLOCK_SAMPLES;
    use crate::io::interleave::SampleWidth;

    const WORDS: usize = AUDIO_BLOCK_SAMPLES * 2;

    #[test]
    fn writes_msb_aligned_frames() {
        let pool = BlockPool::new();
        pool.init(2).unwrap();
        let buffer = DoubleBuffer::<WORDS>::new();
        let layout = FrameLayout::new(SampleWidth::Bits32, 2).unwrap();
        let mut output = I2sOutput::new(&buffer, layout).unwrap();

        let mut left = pool.allocate().unwrap();
        left.fill(100);
        let inputs = [Some(left.into_shared()), None];
        output.update(&pool, &inputs, &mut []);

        let written = buffer.peek(1);
        assert_eq!(written[0], 100 << 16);
        assert_eq!(written[1], 0);
        assert_eq!(buffer.peek(0), [0; WORDS]);
    }

    #[test]
    fn missing_input_overwrites_stale_samples() {
        let pool = BlockPool::new();
        pool.init(1).unwrap();
        let buffer = DoubleBuffer::<AUDIO_BLOCK_SAMPLES>::new();
        buffer.poke(1, &[0x1234_5678; AUDIO_BLOCK_SAMPLES]);
        let layout = FrameLayout::new(SampleWidth::Bits16, 2).unwrap();
        let mut output = I2sOutput::new(&buffer, layout).unwrap();

        output.update(&pool, &[None, None], &mut []);
        assert_eq!(buffer.peek(1), [0; AUDIO_BLOCK_SAMPLES]);
    }

    #[test]
    fn rejects_buffer_of_wrong_size() {
        let buffer = DoubleBuffer::<512>::new();
        let layout = FrameLayout::new(SampleWidth::Bits16, 1).unwrap();
        assert_eq!(
            I2sOutput::new(&buffer, layout).err(),
            Some(ConfigError::BufferLength {
                expected: AUDIO_BLOCK_SAMPLES,
                actual: 512
            })
        );
    }
}
