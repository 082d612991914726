//! Peak level meter.

use crate::block::{BlockMut, BlockPool, BlockRef};
use crate::node::AudioNode;

/// Tracks the minimum and maximum sample seen since the last read.
/// Sink node: 1 input, 0 outputs.
///
/// ```ignore
/// if meter.available() {
///     let level = meter.read(); // 0.0..=1.0
/// }
/// ```
pub struct PeakMeter {
    min_val: i16,
    max_val: i16,
    new_output: bool,
}

impl PeakMeter {
    pub const fn new() -> Self {
        PeakMeter {
            min_val: i16::MAX,
            max_val: i16::MIN,
            new_output: false,
        }
    }

    /// `true` once a block has been observed since the last read.
    pub fn available(&self) -> bool {
        self.new_output
    }

    /// Largest absolute sample normalised to `0.0..=1.0`, then reset.
    ///
    /// Returns 0.0 when nothing was observed.
    pub fn read(&mut self) -> f32 {
        let (min, max) = self.take();
        if min > max {
            return 0.0;
        }
        let peak = (min as i32).abs().max((max as i32).abs()).min(32767);
        peak as f32 / 32767.0
    }

    /// `(max - min) / 32767`, then reset.
    pub fn read_peak_to_peak(&mut self) -> f32 {
        let (min, max) = self.take();
        if min > max {
            return 0.0;
        }
        (max as i32 - min as i32) as f32 / 32767.0
    }

    fn take(&mut self) -> (i16, i16) {
        let pair = (self.min_val, self.max_val);
        self.min_val = i16::MAX;
        self.max_val = i16::MIN;
        self.new_output = false;
        pair
    }
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for PeakMeter {
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
        let Some(input) = inputs.first().and_then(Option::as_ref) else {
            return;
        };
        for &d in input.iter() {
            self.min_val = self.min_val.min(d);
            self.max_val = self.max_val.max(d);
        }
        self.new_output = true;
    }
}
