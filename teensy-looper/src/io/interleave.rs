//! Sample packing between mono blocks and the word buffers the bus DMA
//! walks.
//!
//! ## Word formats
//!
//! - [`SampleWidth::Bits16`]: one `u32` per frame. Channel 0 sits in bits
//!   0–15 and channel 1 in bits 16–31, i.e. `[ch0, ch1]` as consecutive `i16`
//!   on little-endian ARM.
//! - [`SampleWidth::Bits32`]: one `u32` per channel per frame, sample
//!   MSB-aligned (`sample << 16`), channels interleaved frame by frame.

use crate::constants::AUDIO_BLOCK_SAMPLES;
use crate::error::ConfigError;

/// Width of one slot on the serial bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleWidth {
    Bits16,
    Bits32,
}

impl SampleWidth {
    /// Map a bit count onto a supported width.
    pub fn from_bits(bits: u8) -> Result<Self, ConfigError> {
        match bits {
            16 => Ok(SampleWidth::Bits16),
            32 => Ok(SampleWidth::Bits32),
            other => Err(ConfigError::InvalidSampleWidth(other)),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            SampleWidth::Bits16 => 16,
            SampleWidth::Bits32 => 32,
        }
    }
}

/// Where each channel's samples live inside a DMA word buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameLayout {
    width: SampleWidth,
    channels: u8,
}

impl FrameLayout {
    /// Layouts carry one or two channels.
    pub fn new(width: SampleWidth, channels: u8) -> Result<Self, ConfigError> {
        if !(1..=2).contains(&channels) {
            return Err(ConfigError::InvalidChannelCount(channels));
        }
        Ok(FrameLayout { width, channels })
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels as usize
    }

    /// Words needed to carry `frames` frames.
    pub fn words(&self, frames: usize) -> usize {
        match self.width {
            SampleWidth::Bits16 => frames,
            SampleWidth::Bits32 => frames * self.channels(),
        }
    }

    /// Require a buffer half of `words` to carry exactly one block period.
    pub fn check_block_words(&self, words: usize) -> Result<(), ConfigError> {
        let expected = self.words(AUDIO_BLOCK_SAMPLES);
        if words != expected {
            return Err(ConfigError::BufferLength {
                expected,
                actual: words,
            });
        }
        Ok(())
    }

    /// Write one channel into `dest`. `None` writes silence for that channel
    /// and leaves the other channel's bits alone. Frames past the end of
    /// `samples` are silent.
    pub fn pack(&self, dest: &mut [u32], channel: usize, samples: Option<&[i16]>) {
        debug_assert!(channel < self.channels());
        let frames = dest.len() / self.words(1);
        let sample_at = |i: usize| samples.and_then(|s| s.get(i)).copied().unwrap_or(0);

        match self.width {
            SampleWidth::Bits16 => {
                let shift = 16 * channel as u32;
                let mask = !(0xFFFFu32 << shift);
                for (i, word) in dest.iter_mut().enumerate().take(frames) {
                    *word = (*word & mask) | ((sample_at(i) as u16 as u32) << shift);
                }
            }
            SampleWidth::Bits32 => {
                let stride = self.channels();
                for i in 0..frames {
                    dest[i * stride + channel] = ((sample_at(i) as i32) << 16) as u32;
                }
            }
        }
    }

    /// Extract one channel from `src` into `out`.
    pub fn unpack(&self, src: &[u32], channel: usize, out: &mut [i16]) {
        debug_assert!(channel < self.channels());
        let frames = (src.len() / self.words(1)).min(out.len());

        match self.width {
            SampleWidth::Bits16 => {
                let shift = 16 * channel as u32;
                for (sample, &word) in out.iter_mut().zip(src).take(frames) {
                    *sample = (word >> shift) as i16;
                }
            }
            SampleWidth::Bits32 => {
                let stride = self.channels();
                for (i, sample) in out.iter_mut().enumerate().take(frames) {
                    *sample = (src[i * stride + channel] >> 16) as i16;
                }
            }
        }
    }
}

/// Fill a buffer with silence on every channel.
pub fn silence(dest: &mut [u32]) {
    dest.fill(0);
}
