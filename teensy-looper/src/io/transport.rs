//! DMA transport: clocks the serial audio bus and cycles two hardware
//! descriptors per direction over a [`DoubleBuffer`].
//!
//! The bus itself (SAI registers, eDMA channels) is reached through
//! [`SerialAudioBus`], so the same state machine runs against a fake bus in
//! tests. On each completion interrupt the transport counts the event,
//! flips the buffer toggle and reports whether a scheduler pass is due.

use crate::constants::AUDIO_BLOCK_SAMPLES;
use crate::error::ConfigError;

use super::double_buffer::DoubleBuffer;
use super::interleave::{FrameLayout, SampleWidth};

/// Lowest and highest sample rates the bus clock tree can produce.
const SAMPLE_RATE_RANGE: core::ops::RangeInclusive<u32> = 8_000..=192_000;

/// Transfer direction on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Receive: codec ADC to memory.
    Rx,
    /// Transmit: memory to codec DAC.
    Tx,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::Rx => 0,
            Direction::Tx => 1,
        }
    }

    fn paired(self) -> Direction {
        match self {
            Direction::Rx => Direction::Tx,
            Direction::Tx => Direction::Rx,
        }
    }
}

/// Clocking and framing of one bus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub sample_rate: u32,
    /// Slot width in bits (16 or 32).
    pub sample_width: u8,
    pub channel_count: u8,
    /// Take bit and frame clocks from the codec instead of driving them.
    pub as_slave: bool,
}

impl BusConfig {
    /// 44.1 kHz-class stereo, 32-bit slots, bus master.
    pub const fn stereo() -> Self {
        BusConfig {
            sample_rate: 44_100,
            sample_width: 32,
            channel_count: 2,
            as_slave: false,
        }
    }

    /// Check the fields and derive the buffer layout.
    pub fn layout(&self) -> Result<FrameLayout, ConfigError> {
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        FrameLayout::new(SampleWidth::from_bits(self.sample_width)?, self.channel_count)
    }

    /// Bit and frame clocks are shared, so paired directions must agree on
    /// everything that shapes them.
    fn same_clocking(&self, other: &BusConfig) -> bool {
        self.sample_rate == other.sample_rate
            && self.sample_width == other.sample_width
            && self.as_slave == other.as_slave
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::stereo()
    }
}

/// One hardware transfer descriptor: a buffer half plus the link to the
/// descriptor that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Descriptor {
    pub address: usize,
    pub words: usize,
    pub next: u8,
}

/// What the bus reports when its interrupt fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus {
    /// Descriptor whose transfer just finished, if any.
    pub completed: Option<u8>,
    /// FIFO overrun (receive) or underrun (transmit).
    pub fifo_error: bool,
}

/// Register-level access to a serial audio bus and its DMA channels.
pub trait SerialAudioBus {
    type Error;

    /// Program clocks and framing for one direction.
    fn configure(&mut self, direction: Direction, config: &BusConfig) -> Result<(), Self::Error>;

    /// Load the two linked descriptors; hardware starts on `descriptors[0]`.
    fn load_descriptors(
        &mut self,
        direction: Direction,
        descriptors: &[Descriptor; 2],
    ) -> Result<(), Self::Error>;

    fn enable(&mut self, direction: Direction) -> Result<(), Self::Error>;

    fn disable(&mut self, direction: Direction);

    /// Read and latch the interrupt cause.
    fn status(&mut self, direction: Direction) -> BusStatus;

    fn clear_interrupt(&mut self, direction: Direction);

    /// `true` once bit and frame clocks are stable.
    fn clocks_locked(&mut self) -> bool;
}

/// How a completion interrupt hands off to the scheduler.
#[derive(Debug, Clone, Copy)]
pub enum UpdateTrigger {
    /// [`handle_interrupt`](DmaTransport::handle_interrupt) returns `true`
    /// and the caller runs the pass in place.
    Local,
    /// Call this function instead, e.g. to pend a software interrupt or
    /// signal another core.
    Signal(fn()),
    /// Never triggers a pass. Used for the direction that follows the other.
    Passive,
}

/// Per-direction interrupt counters. Read-only except for
/// [`DmaTransport::reset_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaStats {
    /// Completed hardware blocks.
    pub blocks: u32,
    /// Completions of a descriptor other than the one expected.
    pub wrong: u32,
    /// Interrupts that carried no completion.
    pub other: u32,
    /// Receive overruns or transmit underruns.
    pub fifo_errors: u32,
}

struct Channel<'b, const WORDS: usize> {
    config: Option<BusConfig>,
    buffer: Option<&'b DoubleBuffer<WORDS>>,
    trigger: UpdateTrigger,
    stats: DmaStats,
}

impl<const WORDS: usize> Channel<'_, WORDS> {
    const fn idle() -> Self {
        Channel {
            config: None,
            buffer: None,
            trigger: UpdateTrigger::Passive,
            stats: DmaStats {
                blocks: 0,
                wrong: 0,
                other: 0,
                fifo_errors: 0,
            },
        }
    }
}

/// Receive and transmit channels of one bus.
///
/// `WORDS` is the length of one buffer half; it must equal the configured
/// layout's word count for [`AUDIO_BLOCK_SAMPLES`] frames.
pub struct DmaTransport<'b, B: SerialAudioBus, const WORDS: usize> {
    bus: B,
    channels: [Channel<'b, WORDS>; 2],
}

impl<'b, B: SerialAudioBus, const WORDS: usize> DmaTransport<'b, B, WORDS> {
    pub fn new(bus: B) -> Self {
        DmaTransport {
            bus,
            channels: [Channel::idle(), Channel::idle()],
        }
    }

    /// Validate and program one direction.
    ///
    /// If the paired direction is already configured its clocking must
    /// match, otherwise interleaved codec frames would drift apart.
    pub fn configure(&mut self, config: BusConfig, direction: Direction) -> Result<(), ConfigError> {
        let layout = config.layout()?;
        if self.channels[direction.index()].buffer.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        if let Some(paired) = &self.channels[direction.paired().index()].config {
            if !paired.same_clocking(&config) {
                log::error!("transport: {:?} clocking differs from {:?}", direction, direction.paired());
                return Err(ConfigError::ClockMismatch);
            }
        }
        layout.check_block_words(WORDS)?;

        self.bus
            .configure(direction, &config)
            .map_err(|_| ConfigError::Bus)?;
        self.channels[direction.index()].config = Some(config);
        log::debug!(
            "transport: {:?} configured at {} Hz, {} bit, {} ch",
            direction,
            config.sample_rate,
            config.sample_width,
            config.channel_count
        );
        Ok(())
    }

    /// Start cycling descriptors over `buffer`.
    ///
    /// `block_len` is the frame count of one hardware block and must be one
    /// scheduler block.
    pub fn start(
        &mut self,
        direction: Direction,
        trigger: UpdateTrigger,
        block_len: usize,
        buffer: &'b DoubleBuffer<WORDS>,
    ) -> Result<(), ConfigError> {
        let channel = &self.channels[direction.index()];
        let config = channel.config.ok_or(ConfigError::NotConfigured)?;
        if channel.buffer.is_some() {
            return Err(ConfigError::AlreadyStarted);
        }
        if block_len != AUDIO_BLOCK_SAMPLES {
            return Err(ConfigError::BufferLength {
                expected: AUDIO_BLOCK_SAMPLES,
                actual: block_len,
            });
        }
        let words = config.layout()?.words(block_len);

        buffer.reset();
        let descriptors = [
            Descriptor {
                address: buffer.half_address(0),
                words,
                next: 1,
            },
            Descriptor {
                address: buffer.half_address(1),
                words,
                next: 0,
            },
        ];
        self.bus
            .load_descriptors(direction, &descriptors)
            .map_err(|_| ConfigError::Bus)?;
        self.bus.enable(direction).map_err(|_| ConfigError::Bus)?;

        let channel = &mut self.channels[direction.index()];
        channel.buffer = Some(buffer);
        channel.trigger = trigger;
        log::debug!("transport: {:?} started", direction);
        Ok(())
    }

    /// Halt one direction. Its configuration is kept.
    pub fn stop(&mut self, direction: Direction) {
        let channel = &mut self.channels[direction.index()];
        if channel.buffer.take().is_some() {
            self.bus.disable(direction);
            log::debug!("transport: {:?} stopped", direction);
        }
    }

    /// Completion interrupt body for `direction`.
    ///
    /// Returns `true` when a scheduler pass is due and the trigger is
    /// [`UpdateTrigger::Local`].
    pub fn handle_interrupt(&mut self, direction: Direction) -> bool {
        let status = self.bus.status(direction);
        self.bus.clear_interrupt(direction);

        let channel = &mut self.channels[direction.index()];
        let Some(buffer) = channel.buffer else {
            channel.stats.other = channel.stats.other.wrapping_add(1);
            return false;
        };
        if status.fifo_error {
            channel.stats.fifo_errors = channel.stats.fifo_errors.wrapping_add(1);
        }
        let Some(completed) = status.completed else {
            channel.stats.other = channel.stats.other.wrapping_add(1);
            return false;
        };

        channel.stats.blocks = channel.stats.blocks.wrapping_add(1);
        let expected = buffer.software_half() ^ 1;
        if completed as usize == expected {
            buffer.flip();
        } else {
            // Hardware finished the half software thought it owned; take
            // the one it just vacated.
            channel.stats.wrong = channel.stats.wrong.wrapping_add(1);
            buffer.set_software_half(completed as usize);
        }

        match channel.trigger {
            UpdateTrigger::Local => true,
            UpdateTrigger::Signal(f) => {
                f();
                false
            }
            UpdateTrigger::Passive => false,
        }
    }

    /// Buffer currently cycled by `direction`.
    pub fn buffer(&self, direction: Direction) -> Option<&'b DoubleBuffer<WORDS>> {
        self.channels[direction.index()].buffer
    }

    pub fn config(&self, direction: Direction) -> Option<&BusConfig> {
        self.channels[direction.index()].config.as_ref()
    }

    pub fn is_running(&self, direction: Direction) -> bool {
        self.channels[direction.index()].buffer.is_some()
    }

    pub fn clocks_locked(&mut self) -> bool {
        self.bus.clocks_locked()
    }

    pub fn stats(&self, direction: Direction) -> &DmaStats {
        &self.channels[direction.index()].stats
    }

    /// Receive FIFO has overflowed at least once since the last reset.
    pub fn overflowed(&self) -> bool {
        self.stats(Direction::Rx).fifo_errors > 0
    }

    /// Transmit FIFO has underflowed at least once since the last reset.
    pub fn underflowed(&self) -> bool {
        self.stats(Direction::Tx).fifo_errors > 0
    }

    pub fn reset_stats(&mut self) {
        for channel in &mut self.channels {
            channel.stats = DmaStats::default();
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory bus that records what the transport programs and lets
    //! tests raise completion interrupts.

    use super::*;

    #[derive(Default)]
    pub struct FakeBus {
        pub configured: [Option<BusConfig>; 2],
        pub descriptors: [Option<[Descriptor; 2]>; 2],
        pub enabled: [bool; 2],
        pub pending: [BusStatus; 2],
        pub cleared: [u32; 2],
        /// Polls left before `clocks_locked` reports `true`; `None` never locks.
        pub lock_after: Option<u32>,
        pub reject_configure: bool,
        pub enable_order: heapless::Vec<Direction, 4>,
    }

    impl FakeBus {
        pub fn locked() -> Self {
            FakeBus {
                lock_after: Some(0),
                ..Default::default()
            }
        }

        /// Queue a completion of `descriptor` for the next interrupt.
        pub fn complete(&mut self, direction: Direction, descriptor: u8) {
            self.pending[direction.index()].completed = Some(descriptor);
        }
    }

    impl SerialAudioBus for FakeBus {
        type Error = ();

        fn configure(&mut self, direction: Direction, config: &BusConfig) -> Result<(), ()> {
            if self.reject_configure {
                return Err(());
            }
            self.configured[direction.index()] = Some(*config);
            Ok(())
        }

        fn load_descriptors(
            &mut self,
            direction: Direction,
            descriptors: &[Descriptor; 2],
        ) -> Result<(), ()> {
            self.descriptors[direction.index()] = Some(*descriptors);
            Ok(())
        }

        fn enable(&mut self, direction: Direction) -> Result<(), ()> {
            self.enabled[direction.index()] = true;
            let _ = self.enable_order.push(direction);
            Ok(())
        }

        fn disable(&mut self, direction: Direction) {
            self.enabled[direction.index()] = false;
        }

        fn status(&mut self, direction: Direction) -> BusStatus {
            core::mem::take(&mut self.pending[direction.index()])
        }

        fn clear_interrupt(&mut self, direction: Direction) {
            self.cleared[direction.index()] += 1;
        }

        fn clocks_locked(&mut self) -> bool {
            match &mut self.lock_after {
                Some(0) => true,
                Some(n) => {
                    *n -= 1;
                    false
                }
                None => false,
            }
        }
    }
}
