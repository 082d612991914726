//! Block-level saturating helpers.

use crate::block::Samples;

use super::intrinsics::saturate16;

/// Saturating addition of two samples.
#[inline(always)]
pub fn saturating_add(a: i16, b: i16) -> i16 {
    saturate16(a as i32 + b as i32)
}

/// Saturating-add `src` into `dst` sample-by-sample.
pub fn block_accumulate(dst: &mut Samples, src: &Samples) {
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d = saturating_add(*d, s);
    }
}

/// Largest absolute sample in a block, as `0..=32768`.
pub fn block_peak(block: &Samples) -> u16 {
    block
        .iter()
        .map(|&s| (s as i32).unsigned_abs() as u16)
        .max()
        .unwrap_or(0)
}
