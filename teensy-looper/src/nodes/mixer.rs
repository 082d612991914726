//! N-channel mixer with per-channel gain.
//!
//! Uses a const generic `N` for the channel count; `Mixer<4>` matches the
//! classic four-input mixer.

use crate::block::{BlockMut, BlockPool, BlockRef, Samples};
use crate::dsp::intrinsics::{mul_32x16b, saturate16};
use crate::node::AudioNode;

/// Fixed-point unity gain: 1.0 in Q16.16 format = 65536.
const MULTI_UNITYGAIN: i32 = 65536;

/// Mixes N input channels into a single mono output with per-channel gain.
///
/// Sums saturate at the `i16` bounds. With no connected inputs the mixer
/// produces no block at all, which downstream nodes read as silence.
pub struct Mixer<const N: usize> {
    /// Per-channel gain in Q16.16 fixed-point. 65536 = unity (1.0).
    multiplier: [i32; N],
}

impl<const N: usize> Mixer<N> {
    /// Create a new mixer with all channels at unity gain.
    pub const fn new() -> Self {
        Mixer {
            multiplier: [MULTI_UNITYGAIN; N],
        }
    }

    /// Set the gain for one channel.
    ///
    /// `level` is linear: 0.0 = silence, 1.0 = unity, >1.0 = boost, clamped
    /// to ±32767. Out-of-range channels are ignored.
    pub fn gain(&mut self, channel: usize, level: f32) {
        if channel >= N {
            return;
        }
        let clamped = level.clamp(-32767.0, 32767.0);
        self.multiplier[channel] = (clamped * 65536.0) as i32;
    }
}

impl<const N: usize> Default for Mixer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply gain to `src` and saturating-add into `dst`.
fn apply_gain_then_add(dst: &mut Samples, src: &Samples, mult: i32) {
    if mult == MULTI_UNITYGAIN {
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d = saturate16(*d as i32 + s as i32);
        }
    } else {
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            let gained = saturate16(mul_32x16b(mult, s as u16 as u32));
            *d = saturate16(*d as i32 + gained as i32);
        }
    }
}

impl<const N: usize> AudioNode for Mixer<N> {
    fn num_inputs(&self) -> usize {
        N
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn update<'p>(
        &mut self,
        pool: &'p BlockPool,
        inputs: &[Option<BlockRef<'p>>],
        outputs: &mut [Option<BlockMut<'p>>],
    ) {
        if inputs.iter().all(Option::is_none) {
            return;
        }
        let Some(mut out) = pool.allocate() else { return };
        for (input, &mult) in inputs.iter().zip(self.multiplier.iter()) {
            if let Some(block) = input {
                apply_gain_then_add(&mut out, block, mult);
            }
        }
        outputs[0] = Some(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AUDIO_BLOCK_SAMPLES;

    fn pool_with(count: usize) -> BlockPool {
        let pool = BlockPool::new();
        pool.init(count).unwrap();
        pool
    }

    fn block_with<'p>(pool: &'p BlockPool, values: &[i16]) -> BlockRef<'p> {
        let mut block = pool.allocate().unwrap();
        for (i, &v) in values.iter().enumerate().take(AUDIO_BLOCK_SAMPLES) {
            block[i] = v;
        }
        block.into_shared()
    }

    #[test]
    fn unity_gain_single_channel() {
        let pool = pool_with(4);
        let mut mixer = Mixer::<2>::new();
        let inputs = [Some(block_with(&pool, &[1000, -2000, 32767, -32768])), None];
        let mut outputs = [None];

        mixer.update(&pool, &inputs, &mut outputs);

        let out = outputs[0].as_ref().unwrap();
        assert_eq!(&out[..4], &[1000, -2000, 32767, -32768]);
    }

    #[test]
    fn half_gain() {
        let pool = pool_with(4);
        let mut mixer = Mixer::<1>::new();
        mixer.gain(0, 0.5);
        let inputs = [Some(block_with(&pool, &[10000, -10000]))];
        let mut outputs = [None];

        mixer.update(&pool, &inputs, &mut outputs);

        let out = outputs[0].as_ref().unwrap();
        assert!((out[0] - 5000).abs() <= 1);
        assert!((out[1] + 5000).abs() <= 1);
    }

    #[test]
    fn two_channels_saturate() {
        let pool = pool_with(4);
        let mut mixer = Mixer::<2>::new();
        let inputs = [
            Some(block_with(&pool, &[1000, 30000, -30000])),
            Some(block_with(&pool, &[3000, 30000, -30000])),
        ];
        let mut outputs = [None];

        mixer.update(&pool, &inputs, &mut outputs);

        let out = outputs[0].as_ref().unwrap();
        assert_eq!(out[0], 4000);
        assert_eq!(out[1], i16::MAX);
        assert_eq!(out[2], i16::MIN);
    }

    #[test]
    fn no_inputs_produces_no_block() {
        let pool = pool_with(4);
        let mut mixer = Mixer::<2>::new();
        let inputs: [Option<BlockRef<'_>>; 2] = [None, None];
        let mut outputs = [None];

        mixer.update(&pool, &inputs, &mut outputs);
        assert!(outputs[0].is_none());
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn gain_out_of_range_ignored() {
        let mut mixer = Mixer::<2>::new();
        mixer.gain(5, 1.0);
        assert_eq!(mixer.multiplier, [MULTI_UNITYGAIN; 2]);
    }
}
