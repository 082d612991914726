//! ARM DSP instruction wrappers with pure-Rust fallbacks.
//!
//! On `thumbv7em` targets (Cortex-M4/M7 with DSP extension) these compile to
//! single-cycle instructions. Host builds use the equivalent Rust code.

/// Saturate an `i32` to `i16` range (`-32768..=32767`).
///
/// Maps to ARM `SSAT #16`.
#[inline(always)]
pub fn saturate16(val: i32) -> i16 {
    #[cfg(all(target_arch = "arm", target_feature = "dsp"))]
    {
        let out: i32;
        unsafe {
            core::arch::asm!(
                "ssat {out}, #16, {val}",
                out = out(reg) out,
                val = in(reg) val,
            );
        }
        out as i16
    }
    #[cfg(not(all(target_arch = "arm", target_feature = "dsp")))]
    {
        val.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }
}

/// Multiply 32-bit by the bottom 16 bits of `b`, right-shift 16.
///
/// Computes `(a * b[15:0]) >> 16`. Maps to ARM `SMULWB`.
#[inline(always)]
pub fn mul_32x16b(a: i32, b: u32) -> i32 {
    #[cfg(all(target_arch = "arm", target_feature = "dsp"))]
    {
        let out: i32;
        unsafe {
            core::arch::asm!(
                "smulwb {out}, {a}, {b}",
                out = out(reg) out,
                a = in(reg) a,
                b = in(reg) b,
            );
        }
        out
    }
    #[cfg(not(all(target_arch = "arm", target_feature = "dsp")))]
    {
        ((a as i64 * (b as i16 as i64)) >> 16) as i32
    }
}
