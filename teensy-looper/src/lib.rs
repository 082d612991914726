//! # teensy-looper
//!
//! A `no_std`, allocation-free real-time audio engine for small Cortex-M
//! boards: a reference-counted block pool, a topologically sorted
//! processing graph, a double-buffered DMA transport for a serial audio bus
//! and a multi-track looper built on top of them.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`block`] | Fixed-capacity block pool with refcounted handles |
//! | Trait | [`node`] / [`control`] | `AudioNode` and codec `AudioControl` traits |
//! | Graph | [`graph`] | Connections, topological sort, per-block scheduler |
//! | I/O | [`io`] | DMA transport, double buffer, I²S endpoints |
//! | Looper | [`looper`] | Record/play/stop state machine over tracks and clips |
//! | DSP | [`dsp`] / [`nodes`] | Saturating math, mixer and meters (feature-gated) |
//! | Startup | [`bringup`] | Codec enable, clock lock, DMA start |
//!
//! ## Quick start
//!
//! ```ignore
//! use teensy_looper::prelude::*;
//!
//! static POOL: BlockPool = BlockPool::new();
//! static RX: DoubleBuffer<256> = DoubleBuffer::new();
//! static TX: DoubleBuffer<256> = DoubleBuffer::new();
//!
//! POOL.init(32)?;
//! let layout = BusConfig::stereo().layout()?;
//! let mut input = I2sInput::new(&RX, layout)?;
//! let mut looper = Looper::new(loop_memory, LooperConfig::default())?;
//! let mut output = I2sOutput::new(&TX, layout)?;
//!
//! let mut graph = Graph::new();
//! let i = graph.add_node(&input)?;
//! let l = graph.add_node(&looper)?;
//! let o = graph.add_node(&output)?;
//! for ch in 0..2 {
//!     graph.connect(i, ch, l, ch)?;
//!     graph.connect(l, ch, o, ch)?;
//! }
//! graph.topological_sort()?;
//! let mut scheduler = Scheduler::new(graph, &POOL, dwt_cycles);
//!
//! // Transmit DMA completion interrupt:
//! if transport.handle_interrupt(Direction::Tx) {
//!     scheduler.tick(&mut [&mut input, &mut looper, &mut output]);
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `nodes` | yes | Mixer, DC source, peak and RMS meters |
//! | `defmt` | no | `defmt::Format` on public enums and diagnostics |
//!
//! ## Audio parameters
//!
//! - **Block size:** 128 samples ([`constants::AUDIO_BLOCK_SAMPLES`])
//! - **Sample format:** `i16`
//! - **Pool capacity:** up to [`constants::POOL_CAPACITY_MAX`] blocks

#![no_std]

#[cfg(test)]
extern crate std;

pub mod block;
pub mod bringup;
pub mod constants;
pub mod control;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod io;
pub mod looper;
pub mod node;

#[cfg(feature = "nodes")]
pub mod nodes;

/// The types most applications wire together.
pub mod prelude {
    pub use crate::block::{BlockMut, BlockPool, BlockRef, Samples};
    pub use crate::bringup::{bring_up, Streams};
    pub use crate::control::{AudioControl, InputSource};
    pub use crate::error::{ConfigError, GraphError, LooperError};
    pub use crate::graph::{CycleCounter, Graph, NodeId, Scheduler};
    pub use crate::io::{
        BusConfig, Direction, DmaTransport, DoubleBuffer, I2sInput, I2sOutput, SerialAudioBus,
        UpdateTrigger,
    };
    pub use crate::looper::{
        Command, CommandQueue, CommandReceiver, CommandSender, Looper, LooperConfig, LooperState,
    };
    pub use crate::node::AudioNode;
}
