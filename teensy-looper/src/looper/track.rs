//! Tracks and their layered clips.
//!
//! Clip 0 of a track defines the loop length; every other clip of the
//! track commits at exactly that length.

use crate::constants::LOOPER_CLIPS;
use crate::error::LooperError;

/// Lifecycle of one clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClipState {
    #[default]
    Empty,
    /// Arena space reserved; recording starts at the next loop top.
    Armed,
    Recording,
    Committed,
}

/// One layer of a track: a run of arena blocks, `channels` blocks per
/// block period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clip {
    pub(crate) state: ClipState,
    /// First arena block of the clip.
    pub(crate) start: usize,
    /// Block periods captured since recording started.
    pub(crate) recorded: usize,
    /// Committed length in block periods (0 until committed).
    pub(crate) length: usize,
    /// Playback/record position in block periods.
    pub(crate) cursor: usize,
}

impl Clip {
    pub fn state(&self) -> ClipState {
        self.state
    }

    pub fn is_committed(&self) -> bool {
        self.state == ClipState::Committed
    }

    /// Committed length in block periods, or 0.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Arena index of `channel` at block period `block`.
    pub(crate) fn arena_index(&self, block: usize, channel: usize, channels: usize) -> usize {
        self.start + block * channels + channel
    }

    /// Step the cursor one period, wrapping at `length`.
    pub(crate) fn advance(&mut self, length: usize) {
        if length > 0 {
            self.cursor = (self.cursor + 1) % length;
        }
    }
}

/// Owner of up to [`LOOPER_CLIPS`] layered clips sharing one loop length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Track {
    pub(crate) clips: [Clip; LOOPER_CLIPS],
    pub(crate) muted: bool,
}

impl Track {
    pub fn clip(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Loop length fixed by clip 0, once it has committed.
    pub fn loop_length(&self) -> Option<usize> {
        self.clips[0].is_committed().then_some(self.clips[0].length)
    }

    pub fn committed_clips(&self) -> usize {
        self.clips.iter().filter(|c| c.is_committed()).count()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// First clip that has not committed yet.
    pub fn next_uncommitted(&self) -> Option<usize> {
        self.clips.iter().position(|c| !c.is_committed())
    }

    /// Fix clip `index` at the length captured since it started.
    ///
    /// Clip 0 commits at whatever it captured. Layers above it need at
    /// least one full loop and always commit at the loop length.
    pub fn commit(&mut self, index: usize) -> Result<usize, LooperError> {
        let loop_len = self.loop_length();
        let clip = self.clips.get_mut(index).ok_or(LooperError::InvalidTransition)?;
        match clip.state {
            ClipState::Committed => return Err(LooperError::AlreadyCommitted),
            ClipState::Recording if clip.recorded > 0 => {}
            _ => return Err(LooperError::EmptyClip),
        }
        let length = if index == 0 {
            clip.recorded
        } else {
            match loop_len {
                Some(len) if clip.recorded >= len => len,
                _ => return Err(LooperError::InvalidTransition),
            }
        };
        clip.state = ClipState::Committed;
        clip.length = length;
        clip.cursor = 0;
        Ok(length)
    }

    pub(crate) fn reset_cursors(&mut self) {
        for clip in &mut self.clips {
            clip.cursor = 0;
        }
    }
}
