//! Hardware-facing audio I/O.
//!
//! | Item | Role |
//! |------|------|
//! | [`DmaTransport`] | Configures the bus, cycles DMA descriptors, fields completion interrupts |
//! | [`DoubleBuffer`] | Ping-pong buffer whose toggle is the only hardware/software hand-off |
//! | [`I2sInput`] | 0 inputs, one output per channel, reads the software-owned RX half |
//! | [`I2sOutput`] | One input per channel, 0 outputs, fills the software-owned TX half |
//!
//! ## Per-block flow
//!
//! 1. Hardware completes descriptor `n`, the interrupt calls
//!    [`DmaTransport::handle_interrupt`].
//! 2. The toggle flips: half `n` is now software-owned, the other half is
//!    being transferred.
//! 3. The scheduler runs one pass; endpoints read or write half `n`.

pub mod double_buffer;
pub mod input_i2s;
pub mod interleave;
pub mod output_i2s;
pub mod transport;

pub use double_buffer::DoubleBuffer;
pub use input_i2s::I2sInput;
pub use interleave::{FrameLayout, SampleWidth};
pub use output_i2s::I2sOutput;
pub use transport::{
    BusConfig, BusStatus, Descriptor, Direction, DmaStats, DmaTransport, SerialAudioBus,
    UpdateTrigger,
};

#[cfg(test)]
mod integration_tests;
