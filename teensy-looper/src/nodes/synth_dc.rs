//! Constant-level source, handy for calibration and test signals.

use crate::block::{BlockMut, BlockPool, BlockRef};
use crate::node::AudioNode;

/// Outputs a constant sample value on every block.
///
/// Source node: 0 inputs, 1 output. A level of zero still emits a (silent)
/// block so downstream accounting sees a producer every period.
pub struct DcSource {
    value: i16,
}

impl DcSource {
    /// Create a source at zero output.
    pub const fn new() -> Self {
        DcSource { value: 0 }
    }

    /// Set the level from a float in `-1.0..=1.0`.
    pub fn amplitude(&mut self, level: f32) {
        self.value = (level.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    }

    /// Set the raw sample value.
    pub fn set_value(&mut self, value: i16) {
        self.value = value;
    }

    pub fn value(&self) -> i16 {
        self.value
    }
}

impl Default for DcSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioNode for DcSource {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update<'p>(
        &mut self,
        pool: &'p BlockPool,
        _inputs: &[Option<BlockRef<'p>>],
        outputs: &mut [Option<BlockMut<'p>>],
    ) {
        if let Some(mut out) = pool.allocate() {
            out.fill(self.value);
            outputs[0] = Some(out);
        }
    }
}
