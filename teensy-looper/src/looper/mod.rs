//! Multi-track, multi-layer looper node.
//!
//! ## States
//!
//! ```text
//!          record               play (commits clip 0)
//!   Idle ─────────► Recording ─────────────────────► Playing
//!    ▲                 │ ▲                             │  ▲
//!    │ clear-all       │ │ record (armed,              │  │ play
//!    │                 │ │ starts at loop top)         ▼  │
//!    └──────────────── Stopped ◄───────────────────────┘ stop / play
//! ```
//!
//! Commands that would change layers mid-loop are parked as a single
//! pending state and applied on the block where the reference clip 0 wraps
//! back to its first block. New layers therefore always start on the loop
//! top and commit at exactly the loop length.
//!
//! ## Memory
//!
//! Recorded audio lives in a caller-provided arena of blocks. Clip 0 grows
//! one block period at a time; higher layers reserve a whole loop (zeroed)
//! when they are armed. Running out of arena while growing clip 0 drops
//! that recording and leaves everything already committed intact.
//!
//! ```ignore
//! static mut LOOP_MEMORY: [Samples; 1024] = [[0; AUDIO_BLOCK_SAMPLES]; 1024];
//! static mut COMMANDS: CommandQueue = CommandQueue::new();
//!
//! let (mut sender, receiver) = unsafe { COMMANDS.split() };
//! let mut looper = Looper::new(unsafe { &mut LOOP_MEMORY }, LooperConfig::default())?;
//! looper.attach_mailbox(receiver);
//!
//! // From a button handler:
//! sender.enqueue(Command::Record).ok();
//! ```

mod arena;
mod mailbox;
mod track;


pub use arena::LoopArena;
pub use mailbox::{CommandQueue, CommandReceiver, CommandSender};
pub use track::{Clip, ClipState, Track};

use crate::block::{BlockMut, BlockPool, BlockRef, Samples};
use crate::constants::{AUDIO_BLOCK_SAMPLES, LOOPER_CHANNELS_MAX, LOOPER_CLIPS, LOOPER_TRACKS};
use crate::dsp::helpers::{block_accumulate, block_peak};
use crate::error::{ConfigError, LooperError};
use crate::node::AudioNode;

/// Transport-level state of the looper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LooperState {
    #[default]
    Idle,
    Recording,
    Playing,
    Stopped,
}

/// Control input from a transport collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Record,
    Play,
    Stop,
    ClearAll,
    SelectTrack(usize),
    SetMuted { track: usize, muted: bool },
    /// Pass live input through to the output.
    Monitor(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LooperConfig {
    /// Audio channels per block period, `1..=LOOPER_CHANNELS_MAX`.
    pub channels: u8,
    pub monitor: bool,
}

impl Default for LooperConfig {
    fn default() -> Self {
        LooperConfig {
            channels: 2,
            monitor: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClipRef {
    track: usize,
    clip: usize,
}

/// The looper node: `channels` inputs, `channels` outputs.
pub struct Looper<'a> {
    arena: LoopArena<'a>,
    tracks: [Track; LOOPER_TRACKS],
    active: usize,
    state: LooperState,
    pending: Option<LooperState>,
    /// Clip capturing input this period.
    recording: Option<ClipRef>,
    /// Clip waiting for the loop top.
    armed: Option<ClipRef>,
    config: LooperConfig,
    mailbox: Option<CommandReceiver<'a>>,
    last_output: [Samples; LOOPER_CHANNELS_MAX],
    output_peak: [u16; LOOPER_CHANNELS_MAX],
}

impl<'a> Looper<'a> {
    pub fn new(arena: &'a mut [Samples], config: LooperConfig) -> Result<Self, ConfigError> {
        if !(1..=LOOPER_CHANNELS_MAX).contains(&(config.channels as usize)) {
            return Err(ConfigError::InvalidChannelCount(config.channels));
        }
        log::debug!(
            "looper: {} arena blocks, {} channel(s)",
            arena.len(),
            config.channels
        );
        Ok(Looper {
            arena: LoopArena::new(arena),
            tracks: [Track::default(); LOOPER_TRACKS],
            active: 0,
            state: LooperState::Idle,
            pending: None,
            recording: None,
            armed: None,
            config,
            mailbox: None,
            last_output: [[0; AUDIO_BLOCK_SAMPLES]; LOOPER_CHANNELS_MAX],
            output_peak: [0; LOOPER_CHANNELS_MAX],
        })
    }

    /// Drain `queue` at the start of every period.
    pub fn attach_mailbox(&mut self, receiver: CommandReceiver<'a>) {
        self.mailbox = Some(receiver);
    }

    /// Apply a command now. Rejections are logged and change nothing.
    pub fn command(&mut self, command: Command) -> Result<(), LooperError> {
        let result = match command {
            Command::Record => self.record(),
            Command::Play => self.play(),
            Command::Stop => self.stop(),
            Command::ClearAll => {
                self.clear_all();
                Ok(())
            }
            Command::SelectTrack(track) => self.select_track(track),
            Command::SetMuted { track, muted } => self.set_muted(track, muted),
            Command::Monitor(on) => {
                self.config.monitor = on;
                Ok(())
            }
        };
        match result {
            Ok(()) => log::debug!(
                "looper: {:?} -> {:?} (pending {:?})",
                command,
                self.state,
                self.pending
            ),
            Err(e) => log::warn!("looper: {:?} rejected in {:?}: {}", command, self.state, e),
        }
        result
    }

    pub fn state(&self) -> LooperState {
        self.state
    }

    /// Transition waiting for the next loop top.
    pub fn pending(&self) -> Option<LooperState> {
        self.pending
    }

    pub fn active_track(&self) -> usize {
        self.active
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    pub fn config(&self) -> &LooperConfig {
        &self.config
    }

    /// Arena blocks in use by clips.
    pub fn arena_used(&self) -> usize {
        self.arena.used()
    }

    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Largest absolute sample of the last output block on `channel`.
    pub fn output_peak(&self, channel: usize) -> u16 {
        self.output_peak.get(channel).copied().unwrap_or(0)
    }

    /// The last block sent downstream on `channel`.
    pub fn last_output(&self, channel: usize) -> Option<&Samples> {
        (channel < self.channels()).then(|| &self.last_output[channel])
    }

    /// Recorded samples of one clip, for waveform display.
    pub fn clip_block(
        &self,
        track: usize,
        clip: usize,
        block: usize,
        channel: usize,
    ) -> Option<&Samples> {
        let t = self.tracks.get(track)?;
        let c = t.clips.get(clip)?;
        let span = match c.state {
            ClipState::Committed => c.length,
            ClipState::Recording if clip == 0 => c.recorded,
            ClipState::Recording | ClipState::Armed => t.loop_length().unwrap_or(0),
            ClipState::Empty => 0,
        };
        if block >= span || channel >= self.channels() {
            return None;
        }
        Some(self.arena.block(c.arena_index(block, channel, self.channels())))
    }

    fn record(&mut self) -> Result<(), LooperError> {
        match self.state {
            LooperState::Idle | LooperState::Stopped => {
                let next = self.next_layer()?;
                self.arm(next)?;
                self.start_armed(next);
                self.state = LooperState::Recording;
                Ok(())
            }
            LooperState::Playing => {
                if self.pending.is_some() {
                    return Err(LooperError::PendingBusy);
                }
                let next = self.next_layer()?;
                self.arm(next)?;
                self.pending = Some(LooperState::Recording);
                Ok(())
            }
            LooperState::Recording => {
                let current = self.recording.ok_or(LooperError::InvalidTransition)?;
                let next = ClipRef {
                    track: current.track,
                    clip: current.clip + 1,
                };
                if next.clip >= LOOPER_CLIPS {
                    return Err(LooperError::LayerCeiling);
                }
                if current.clip == 0 {
                    let len = self.tracks[current.track].clips[0].recorded;
                    if len == 0 {
                        return Err(LooperError::EmptyClip);
                    }
                    self.tracks[current.track].commit(0)?;
                    if let Err(e) = self.arm(next) {
                        // The loop is kept; only the new layer is refused.
                        self.recording = None;
                        self.state = LooperState::Playing;
                        return Err(e);
                    }
                    self.start_armed(next);
                } else {
                    if self.pending.is_some() {
                        return Err(LooperError::PendingBusy);
                    }
                    self.arm(next)?;
                    self.pending = Some(LooperState::Recording);
                }
                Ok(())
            }
        }
    }

    fn play(&mut self) -> Result<(), LooperError> {
        match self.state {
            LooperState::Recording => {
                let current = self.recording.ok_or(LooperError::InvalidTransition)?;
                if current.clip == 0 {
                    self.tracks[current.track].commit(0)?;
                    self.recording = None;
                    self.state = LooperState::Playing;
                } else {
                    self.replace_pending(LooperState::Playing)?;
                }
                Ok(())
            }
            LooperState::Playing => {
                self.halt();
                Ok(())
            }
            LooperState::Idle | LooperState::Stopped => {
                if !self.any_committed() {
                    return Err(LooperError::NothingRecorded);
                }
                self.state = LooperState::Playing;
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<(), LooperError> {
        match self.state {
            LooperState::Playing => self.halt(),
            LooperState::Recording => {
                let current = self.recording.ok_or(LooperError::InvalidTransition)?;
                if current.clip == 0 {
                    if self.tracks[current.track].clips[0].recorded == 0 {
                        self.discard(current);
                    } else {
                        self.tracks[current.track].commit(0)?;
                        self.recording = None;
                        self.halt();
                    }
                } else {
                    self.replace_pending(LooperState::Stopped)?;
                }
            }
            LooperState::Idle | LooperState::Stopped => {}
        }
        Ok(())
    }

    /// Park `next` for the loop top. A pending record is cancelled and its
    /// armed layer handed back. A pending stop only yields to another stop.
    fn replace_pending(&mut self, next: LooperState) -> Result<(), LooperError> {
        match self.pending {
            None => {}
            Some(LooperState::Recording) => self.disarm(),
            Some(_) if next == LooperState::Stopped => {}
            Some(_) => return Err(LooperError::PendingBusy),
        }
        self.pending = Some(next);
        Ok(())
    }

    fn clear_all(&mut self) {
        self.tracks = [Track::default(); LOOPER_TRACKS];
        self.arena.clear();
        self.state = LooperState::Idle;
        self.pending = None;
        self.recording = None;
        self.armed = None;
    }

    /// Make `track` the target of future recordings.
    pub fn select_track(&mut self, track: usize) -> Result<(), LooperError> {
        if track >= LOOPER_TRACKS {
            return Err(LooperError::NoSuchTrack(track));
        }
        if self.state == LooperState::Recording || self.pending.is_some() {
            return Err(LooperError::InvalidTransition);
        }
        self.active = track;
        Ok(())
    }

    /// Silence a track in the mix. Its cursors keep running.
    pub fn set_muted(&mut self, track: usize, muted: bool) -> Result<(), LooperError> {
        let t = self
            .tracks
            .get_mut(track)
            .ok_or(LooperError::NoSuchTrack(track))?;
        t.muted = muted;
        Ok(())
    }

    fn next_layer(&self) -> Result<ClipRef, LooperError> {
        let clip = self.tracks[self.active]
            .next_uncommitted()
            .ok_or(LooperError::LayerCeiling)?;
        Ok(ClipRef {
            track: self.active,
            clip,
        })
    }

    /// Claim a clip for recording. Layers above clip 0 reserve one zeroed
    /// loop of arena now.
    fn arm(&mut self, r: ClipRef) -> Result<(), LooperError> {
        let start = if r.clip == 0 {
            self.arena.used()
        } else {
            let len = self.tracks[r.track]
                .loop_length()
                .ok_or(LooperError::InvalidTransition)?;
            self.arena
                .reserve(len * self.channels())
                .ok_or(LooperError::ArenaExhausted)?
        };
        self.tracks[r.track].clips[r.clip] = Clip {
            state: ClipState::Armed,
            start,
            ..Clip::default()
        };
        self.armed = Some(r);
        Ok(())
    }

    fn start_armed(&mut self, r: ClipRef) {
        let used = self.arena.used();
        let clip = &mut self.tracks[r.track].clips[r.clip];
        clip.state = ClipState::Recording;
        clip.recorded = 0;
        clip.cursor = 0;
        if r.clip == 0 {
            clip.start = used;
        }
        self.armed = None;
        self.recording = Some(r);
    }

    /// Drop an armed clip and hand its reservation back.
    fn disarm(&mut self) {
        if let Some(r) = self.armed.take() {
            let clip = &mut self.tracks[r.track].clips[r.clip];
            if r.clip > 0 {
                self.arena.rollback(clip.start);
            }
            *clip = Clip::default();
        }
    }

    /// Throw away a clip that never produced anything usable.
    fn discard(&mut self, r: ClipRef) {
        let clip = &mut self.tracks[r.track].clips[r.clip];
        self.arena.rollback(clip.start);
        *clip = Clip::default();
        self.recording = None;
        self.disarm();
        self.pending = None;
        self.state = if self.any_committed() {
            LooperState::Stopped
        } else {
            LooperState::Idle
        };
        self.reset_cursors();
    }

    /// Stop playback and rewind every clip.
    fn halt(&mut self) {
        self.disarm();
        self.pending = None;
        self.state = LooperState::Stopped;
        self.reset_cursors();
    }

    fn reset_cursors(&mut self) {
        for track in &mut self.tracks {
            track.reset_cursors();
        }
    }

    fn any_committed(&self) -> bool {
        self.tracks.iter().any(|t| t.committed_clips() > 0)
    }

    /// Track whose clip 0 paces deferred transitions.
    fn reference_track(&self) -> Option<usize> {
        if self.tracks[self.active].clips[0].is_committed() {
            return Some(self.active);
        }
        self.tracks.iter().position(|t| t.clips[0].is_committed())
    }

    /// `true` on the period where the reference loop restarts, or always
    /// if nothing paces the loop yet.
    fn at_loop_top(&self) -> bool {
        let Some(t) = self.reference_track() else {
            return true;
        };
        if self.tracks[t].clips[0].cursor != 0 {
            return false;
        }
        match self.recording {
            // A layer that started on this very top has not looped yet.
            Some(r) if r.clip > 0 => self.tracks[r.track].clips[r.clip].recorded > 0,
            _ => true,
        }
    }

    fn apply_pending(&mut self) {
        let Some(next) = self.pending.take() else {
            return;
        };
        if let Some(r) = self.recording.take() {
            if let Err(e) = self.tracks[r.track].commit(r.clip) {
                log::warn!("looper: dropping track {} clip {}: {}", r.track, r.clip, e);
                self.tracks[r.track].clips[r.clip] = Clip::default();
            }
        }
        match next {
            LooperState::Recording => match self.armed {
                Some(r) => {
                    self.start_armed(r);
                    self.state = LooperState::Recording;
                }
                None => self.state = LooperState::Playing,
            },
            LooperState::Playing => self.state = LooperState::Playing,
            LooperState::Stopped => self.halt(),
            LooperState::Idle => {}
        }
        log::debug!("looper: loop top, now {:?}", self.state);
    }

    fn drain_mailbox(&mut self) {
        let Some(mut receiver) = self.mailbox.take() else {
            return;
        };
        while let Some(command) = receiver.dequeue() {
            let _ = self.command(command);
        }
        self.mailbox = Some(receiver);
    }

    fn capture(&mut self, input: &[Option<&Samples>]) {
        let Some(r) = self.recording else { return };
        let ch = self.channels();
        let clip = self.tracks[r.track].clips[r.clip];

        let position = if r.clip == 0 {
            let Some(start) = self.arena.reserve(ch) else {
                log::warn!("looper: arena full, recording on track {} dropped", r.track);
                self.discard(r);
                return;
            };
            debug_assert_eq!(start, clip.arena_index(clip.recorded, 0, ch));
            clip.recorded
        } else {
            clip.cursor
        };

        for c in 0..ch {
            let dst = self.arena.block_mut(clip.arena_index(position, c, ch));
            match input.get(c).copied().flatten() {
                Some(block) => *dst = *block,
                None => dst.fill(0),
            }
        }
        self.tracks[r.track].clips[r.clip].recorded += 1;
    }

    fn advance_cursors(&mut self) {
        for track in &mut self.tracks {
            let loop_len = track.loop_length().unwrap_or(0);
            for (k, clip) in track.clips.iter_mut().enumerate() {
                if clip.is_committed() {
                    let len = clip.length;
                    clip.advance(len);
                } else if k > 0 && clip.state == ClipState::Recording {
                    clip.advance(loop_len);
                }
            }
        }
    }

    /// One block period: commands, loop-top transitions, capture, mix.
    fn process(&mut self, input: &[Option<&Samples>]) {
        self.drain_mailbox();
        if self.pending.is_some() && self.at_loop_top() {
            self.apply_pending();
        }
        if self.state == LooperState::Recording {
            self.capture(input);
        }

        let ch = self.channels();
        for c in 0..ch {
            let out = &mut self.last_output[c];
            match input.get(c).copied().flatten() {
                Some(block) if self.config.monitor => *out = *block,
                _ => out.fill(0),
            }
        }

        if matches!(self.state, LooperState::Playing | LooperState::Recording) {
            for track in self.tracks.iter().filter(|t| !t.muted) {
                for clip in track.clips.iter().filter(|c| c.is_committed()) {
                    for c in 0..ch {
                        let src = self.arena.block(clip.arena_index(clip.cursor, c, ch));
                        block_accumulate(&mut self.last_output[c], src);
                    }
                }
            }
            self.advance_cursors();
        }

        for c in 0..ch {
            self.output_peak[c] = block_peak(&self.last_output[c]);
        }
    }
}

impl AudioNode for Looper<'_> {
    fn num_inputs(&self) -> usize {
        self.channels()
    }

    fn num_outputs(&self) -> usize {
        self.channels()
    }

    fn update<'p>(
        &mut self,
        pool: &'p BlockPool,
        inputs: &[Option<BlockRef<'p>>],
        outputs: &mut [Option<BlockMut<'p>>],
    ) {
        let mut input: [Option<&Samples>; LOOPER_CHANNELS_MAX] = [None; LOOPER_CHANNELS_MAX];
        for (slot, block) in input.iter_mut().zip(inputs) {
            *slot = block.as_deref();
        }
        let ch = self.channels();
        self.process(&input[..ch]);

        for (c, slot) in outputs.iter_mut().enumerate().take(ch) {
            if let Some(mut block) = pool.allocate() {
                *block = self.last_output[c];
                *slot = Some(block);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena<const BLOCKS: usize>() -> [Samples; BLOCKS] {
        [[0; AUDIO_BLOCK_SAMPLES]; BLOCKS]
    }

    fn mono() -> LooperConfig {
        LooperConfig {
            channels: 1,
            monitor: false,
        }
    }

    fn feed(looper: &mut Looper<'_>, value: i16) {
        let block = [value; AUDIO_BLOCK_SAMPLES];
        looper.process(&[Some(&block)]);
    }

    #[test]
    fn channel_count_validated() {
        let mut mem = arena::<4>();
        let config = LooperConfig {
            channels: 3,
            monitor: true,
        };
        assert_eq!(
            Looper::new(&mut mem, config).err(),
            Some(ConfigError::InvalidChannelCount(3))
        );
    }

    #[test]
    fn play_with_nothing_recorded_rejected() {
        let mut mem = arena::<4>();
        let mut looper = Looper::new(&mut mem, mono()).unwrap();
        assert_eq!(looper.command(Command::Play), Err(LooperError::NothingRecorded));
        assert_eq!(looper.state(), LooperState::Idle);
    }

    #[test]
    fn record_play_toggle() {
        let mut mem = arena::<8>();
        let mut looper = Looper::new(&mut mem, mono()).unwrap();
        looper.command(Command::Record).unwrap();
        assert_eq!(looper.command(Command::Play), Err(LooperError::EmptyClip));

        feed(&mut looper, 7);
        feed(&mut looper, 8);
        looper.command(Command::Play).unwrap();
        assert_eq!(looper.state(), LooperState::Playing);
        assert_eq!(looper.track(0).unwrap().loop_length(), Some(2));

        looper.command(Command::Play).unwrap();
        assert_eq!(looper.state(), LooperState::Stopped);
        looper.command(Command::Play).unwrap();
        assert_eq!(looper.state(), LooperState::Playing);
    }

    #[test]
    fn stop_on_empty_first_clip_discards() {
        let mut mem = arena::<4>();
        let mut looper = Looper::new(&mut mem, mono()).unwrap();
        looper.command(Command::Record).unwrap();
        looper.command(Command::Stop).unwrap();
        assert_eq!(looper.state(), LooperState::Idle);
        assert_eq!(looper.track(0).unwrap().clip(0).unwrap().state(), ClipState::Empty);
        assert_eq!(looper.arena_used(), 0);
    }

    #[test]
    fn monitor_passes_input_when_idle() {
        let mut mem = arena::<2>();
        let mut looper = Looper::new(&mut mem, mono()).unwrap();
        feed(&mut looper, 300);
        assert_eq!(looper.output_peak(0), 0);

        looper.command(Command::Monitor(true)).unwrap();
        feed(&mut looper, -300);
        assert_eq!(looper.output_peak(0), 300);
        assert_eq!(looper.last_output(0).unwrap()[5], -300);
        assert!(looper.last_output(1).is_none());
    }

    #[test]
    fn select_track_rules() {
        let mut mem = arena::<4>();
        let mut looper = Looper::new(&mut mem, mono()).unwrap();
        assert_eq!(
            looper.command(Command::SelectTrack(LOOPER_TRACKS)),
            Err(LooperError::NoSuchTrack(LOOPER_TRACKS))
        );
        looper.command(Command::SelectTrack(2)).unwrap();
        looper.command(Command::Record).unwrap();
        assert_eq!(
            looper.command(Command::SelectTrack(1)),
            Err(LooperError::InvalidTransition)
        );
        assert_eq!(looper.active_track(), 2);
    }

    #[test]
    fn mailbox_drained_before_compute() {
        let mut queue = CommandQueue::new();
        let (mut sender, receiver) = queue.split();
        let mut mem = arena::<4>();
        let mut looper = Looper::new(&mut mem, mono()).unwrap();
        looper.attach_mailbox(receiver);

        sender.enqueue(Command::Record).unwrap();
        feed(&mut looper, 42);
        assert_eq!(looper.state(), LooperState::Recording);
        assert_eq!(looper.clip_block(0, 0, 0, 0).unwrap()[0], 42);
        assert!(!looper.mailbox.as_ref().unwrap().ready());

        sender.enqueue(Command::Play).unwrap();
        feed(&mut looper, 0);
        assert_eq!(looper.state(), LooperState::Playing);
    }
}
