//! Software loopback through the whole I/O path:
//!
//! ```text
//! [RX half] ─► I2sInput ─► Scheduler ─► I2sOutput ─► [TX half]
//!      ▲                                                  │
//!  FakeBus "ADC"                                   FakeBus "DAC"
//! ```

use super::transport::fake::FakeBus;
use super::*;
use crate::block::BlockPool;
use crate::constants::AUDIO_BLOCK_SAMPLES;
use crate::graph::{Graph, NoCycleCounter, Scheduler};
use crate::node::AudioNode;

const WORDS: usize = AUDIO_BLOCK_SAMPLES * 2;

fn ramp(start: i16) -> [u32; WORDS] {
    let layout = BusConfig::stereo().layout().unwrap();
    let mut words = [0u32; WORDS];
    let left: [i16; AUDIO_BLOCK_SAMPLES] = core::array::from_fn(|i| start + i as i16);
    let right: [i16; AUDIO_BLOCK_SAMPLES] = core::array::from_fn(|i| -start - i as i16);
    layout.pack(&mut words, 0, Some(&left));
    layout.pack(&mut words, 1, Some(&right));
    words
}

#[test]
fn completion_moves_software_to_other_half() {
    let buffer = DoubleBuffer::<WORDS>::new();
    let mut transport = DmaTransport::new(FakeBus::locked());
    transport.configure(BusConfig::stereo(), Direction::Tx).unwrap();
    transport
        .start(Direction::Tx, UpdateTrigger::Local, AUDIO_BLOCK_SAMPLES, &buffer)
        .unwrap();

    let pattern = ramp(10);
    let owned = buffer.software_half();
    buffer.with_software_half_mut(|half| *half = pattern).unwrap();

    transport.bus_mut().complete(Direction::Tx, (owned ^ 1) as u8);
    assert!(transport.handle_interrupt(Direction::Tx));
    assert_eq!(buffer.software_half(), owned ^ 1);

    // Software now writes only the new half; the one it filled is left for
    // hardware until toggled back.
    buffer.with_software_half_mut(|half| half.fill(0xFFFF_FFFF)).unwrap();
    assert_eq!(buffer.peek(owned), pattern);

    transport.bus_mut().complete(Direction::Tx, owned as u8);
    assert!(transport.handle_interrupt(Direction::Tx));
    assert_eq!(buffer.software_half(), owned);
    assert_eq!(buffer.with_software_half(|half| *half), Some(pattern));
}

#[test]
fn loopback_through_graph() {
    let pool = BlockPool::new();
    pool.init(8).unwrap();
    let rx_buffer = DoubleBuffer::<WORDS>::new();
    let tx_buffer = DoubleBuffer::<WORDS>::new();

    let mut transport = DmaTransport::new(FakeBus::locked());
    let config = BusConfig::stereo();
    transport.configure(config, Direction::Rx).unwrap();
    transport.configure(config, Direction::Tx).unwrap();
    transport
        .start(Direction::Rx, UpdateTrigger::Passive, AUDIO_BLOCK_SAMPLES, &rx_buffer)
        .unwrap();
    transport
        .start(Direction::Tx, UpdateTrigger::Local, AUDIO_BLOCK_SAMPLES, &tx_buffer)
        .unwrap();

    let layout = config.layout().unwrap();
    let mut input = I2sInput::new(&rx_buffer, layout).unwrap();
    let mut output = I2sOutput::new(&tx_buffer, layout).unwrap();

    let mut graph = Graph::new();
    let rx = graph.add_node(&input).unwrap();
    let tx = graph.add_node(&output).unwrap();
    graph.connect(rx, 0, tx, 0).unwrap();
    graph.connect(rx, 1, tx, 1).unwrap();
    graph.topological_sort().unwrap();
    let mut scheduler = Scheduler::new(graph, &pool, NoCycleCounter);

    for (n, start) in [100i16, 2000, -3000].into_iter().enumerate() {
        let hw = (n % 2) as u8;
        // ADC lands a block in the hardware-owned half.
        rx_buffer.poke(hw as usize, &ramp(start));
        transport.bus_mut().complete(Direction::Rx, hw);
        assert!(!transport.handle_interrupt(Direction::Rx));

        transport.bus_mut().complete(Direction::Tx, hw);
        let due = transport.handle_interrupt(Direction::Tx);
        assert!(due);

        let nodes: &mut [&mut dyn AudioNode] = &mut [&mut input, &mut output];
        assert!(scheduler.tick(nodes));
        assert_eq!(tx_buffer.peek(hw as usize), ramp(start));
        assert_eq!(pool.in_use(), 0);
    }

    assert_eq!(transport.stats(Direction::Rx).blocks, 3);
    assert_eq!(transport.stats(Direction::Tx).blocks, 3);
    assert_eq!(transport.stats(Direction::Tx).wrong, 0);
}

#[test]
fn unconnected_output_sends_silence() {
    let pool = BlockPool::new();
    pool.init(2).unwrap();
    let tx_buffer = DoubleBuffer::<WORDS>::new();
    tx_buffer.poke(1, &ramp(5));
    let layout = BusConfig::stereo().layout().unwrap();
    let mut output = I2sOutput::new(&tx_buffer, layout).unwrap();

    let mut graph = Graph::new();
    graph.add_node(&output).unwrap();
    graph.topological_sort().unwrap();
    let mut scheduler = Scheduler::new(graph, &pool, NoCycleCounter);
    assert!(scheduler.tick(&mut [&mut output]));

    assert_eq!(tx_buffer.peek(1), [0; WORDS]);
}
