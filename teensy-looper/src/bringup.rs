//! One-shot hardware bring-up, run before the real-time loop starts.
//!
//! Order matters: the codec must be clocked before the bus starts pulling
//! frames, and receive starts before transmit so the first transmit
//! completion (which drives the scheduler) always finds fresh input.

use embedded_hal::delay::DelayNs;

use crate::constants::AUDIO_BLOCK_SAMPLES;
use crate::control::AudioControl;
use crate::error::ConfigError;
use crate::io::{BusConfig, Direction, DmaTransport, DoubleBuffer, SerialAudioBus, UpdateTrigger};

/// Clock-lock polls before giving up.
const CLOCK_LOCK_POLLS: u32 = 100;
/// Wait between clock-lock polls.
const CLOCK_LOCK_POLL_US: u32 = 100;

/// Buffers and completion hand-off for [`bring_up`].
pub struct Streams<'b, const WORDS: usize> {
    pub rx: &'b DoubleBuffer<WORDS>,
    pub tx: &'b DoubleBuffer<WORDS>,
    /// Trigger for transmit completions. Receive follows transmit and is
    /// always passive.
    pub trigger: UpdateTrigger,
}

/// Enable the codec, configure both bus directions identically, wait for
/// clock lock, then start receive and transmit.
///
/// Any failure is fatal to audio and leaves the transport stopped.
pub fn bring_up<'b, C, B, D, const WORDS: usize>(
    codec: &mut C,
    transport: &mut DmaTransport<'b, B, WORDS>,
    delay: &mut D,
    config: BusConfig,
    streams: Streams<'b, WORDS>,
) -> Result<(), ConfigError>
where
    C: AudioControl,
    B: SerialAudioBus,
    D: DelayNs,
{
    codec.enable().map_err(|_| {
        log::error!("bring-up: codec enable failed");
        ConfigError::Codec
    })?;

    transport.configure(config, Direction::Rx)?;
    transport.configure(config, Direction::Tx)?;

    let mut polls = 0;
    while !transport.clocks_locked() {
        if polls == CLOCK_LOCK_POLLS {
            log::error!("bring-up: bus clocks did not lock");
            return Err(ConfigError::ClockTimeout);
        }
        delay.delay_us(CLOCK_LOCK_POLL_US);
        polls += 1;
    }

    transport.start(Direction::Rx, UpdateTrigger::Passive, AUDIO_BLOCK_SAMPLES, streams.rx)?;
    if let Err(e) = transport.start(Direction::Tx, streams.trigger, AUDIO_BLOCK_SAMPLES, streams.tx) {
        transport.stop(Direction::Rx);
        return Err(e);
    }
    log::debug!("bring-up: audio running after {} clock polls", polls);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::InputSource;
    use crate::io::transport::fake::FakeBus;

    const WORDS: usize = AUDIO_BLOCK_SAMPLES * 2;

    #[derive(Default)]
    struct MockCodec {
        enabled: u32,
        fail: bool,
    }

    impl AudioControl for MockCodec {
        type Error = ();

        fn enable(&mut self) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.enabled += 1;
            Ok(())
        }

        fn disable(&mut self) -> Result<(), ()> {
            Ok(())
        }

        fn volume(&mut self, _level: f32) -> Result<(), ()> {
            Ok(())
        }

        fn input_select(&mut self, _input: InputSource) -> Result<(), ()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_us: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_us += ns / 1_000;
        }
    }

    #[test]
    fn starts_receive_before_transmit() {
        let (rx, tx) = (DoubleBuffer::<WORDS>::new(), DoubleBuffer::<WORDS>::new());
        let mut codec = MockCodec::default();
        let mut delay = CountingDelay::default();
        let mut transport = DmaTransport::new(FakeBus {
            lock_after: Some(3),
            ..FakeBus::default()
        });

        let streams = Streams {
            rx: &rx,
            tx: &tx,
            trigger: UpdateTrigger::Local,
        };
        bring_up(&mut codec, &mut transport, &mut delay, BusConfig::stereo(), streams).unwrap();

        assert_eq!(codec.enabled, 1);
        assert_eq!(delay.total_us, 3 * CLOCK_LOCK_POLL_US);
        assert_eq!(transport.bus().enable_order.as_slice(), &[Direction::Rx, Direction::Tx]);
        assert!(transport.is_running(Direction::Rx));
        assert!(transport.is_running(Direction::Tx));
    }

    #[test]
    fn clock_timeout_is_bounded() {
        let (rx, tx) = (DoubleBuffer::<WORDS>::new(), DoubleBuffer::<WORDS>::new());
        let mut transport = DmaTransport::new(FakeBus::default());
        let mut delay = CountingDelay::default();

        let streams = Streams {
            rx: &rx,
            tx: &tx,
            trigger: UpdateTrigger::Local,
        };
        let result = bring_up(
            &mut MockCodec::default(),
            &mut transport,
            &mut delay,
            BusConfig::stereo(),
            streams,
        );

        assert_eq!(result, Err(ConfigError::ClockTimeout));
        assert_eq!(delay.total_us, CLOCK_LOCK_POLLS * CLOCK_LOCK_POLL_US);
        assert!(!transport.is_running(Direction::Rx));
    }

    #[test]
    fn codec_failure_stops_early() {
        let (rx, tx) = (DoubleBuffer::<WORDS>::new(), DoubleBuffer::<WORDS>::new());
        let mut transport = DmaTransport::new(FakeBus::locked());
        let mut codec = MockCodec {
            fail: true,
            ..MockCodec::default()
        };

        let streams = Streams {
            rx: &rx,
            tx: &tx,
            trigger: UpdateTrigger::Passive,
        };
        let result = bring_up(
            &mut codec,
            &mut transport,
            &mut CountingDelay::default(),
            BusConfig::stereo(),
            streams,
        );
        assert_eq!(result, Err(ConfigError::Codec));
        assert!(transport.config(Direction::Rx).is_none());
    }

    #[test]
    fn bus_rejection_surfaces() {
        let (rx, tx) = (DoubleBuffer::<WORDS>::new(), DoubleBuffer::<WORDS>::new());
        let mut transport = DmaTransport::new(FakeBus {
            reject_configure: true,
            ..FakeBus::locked()
        });
        let streams = Streams {
            rx: &rx,
            tx: &tx,
            trigger: UpdateTrigger::Passive,
        };
        let result = bring_up(
            &mut MockCodec::default(),
            &mut transport,
            &mut CountingDelay::default(),
            BusConfig::stereo(),
            streams,
        );
        assert_eq!(result, Err(ConfigError::Bus));
    }
}
