//! RMS level meter.

use crate::block::{BlockMut, BlockPool, BlockRef};
use crate::constants::AUDIO_BLOCK_SAMPLES;
use crate::node::AudioNode;

/// Accumulates the sum of squares over one or more periods and reports
/// `sqrt(mean) / 32767` on [`read`](Self::read). Sink node: 1 input.
///
/// A period with no input block counts as silence.
pub struct RmsMeter {
    accum: u64,
    count: u32,
    new_output: bool,
}

impl RmsMeter {
    pub const fn new() -> Self {
        RmsMeter {
            accum: 0,
            count: 0,
            new_output: false,
        }
    }

    pub fn available(&self) -> bool {
        self.new_output
    }

    /// RMS level in `0.0..=1.0`, then reset. Returns 0.0 with no samples.
    pub fn read(&mut self) -> f32 {
        let sum = core::mem::take(&mut self.accum);
        let num = core::mem::take(&mut self.count);
        self.new_output = false;

        if num == 0 {
            return 0.0;
        }
        let rms = libm::sqrt(sum as f64 / num as f64);
        (rms / 32767.0) as f32
    }
}

impl Default for RmsMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for RmsMeter {
    fn num_inputs(&self) -> usize {
        1
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
        if let Some(input) = inputs.first().and_then(Option::as_ref) {
            self.accum += input
                .iter()
                .map(|&s| (s as i64 * s as i64) as u64)
                .sum::<u64>();
        }
        self.count += AUDIO_BLOCK_SAMPLES as u32;
        self.new_output = true;
    }
}
