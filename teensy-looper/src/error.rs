//! Error types for setup-time failures and rejected looper commands.
//!
//! Nothing on the per-block path returns these; steady-state failures are
//! sentinels (`None`, `false`) or counters.

use thiserror::Error;

use crate::graph::NodeId;

/// Failure while building or sorting the processing graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GraphError {
    #[error("graph already holds the maximum number of nodes")]
    NodeLimit,
    #[error("node {0:?} is not registered")]
    UnknownNode(NodeId),
    #[error("node declares {0} ports, more than supported")]
    PortLimit(usize),
    #[error("port {port} out of range for node {node:?}")]
    PortOutOfRange { node: NodeId, port: u8 },
    #[error("input {port} of node {node:?} is already connected")]
    InputAlreadyConnected { node: NodeId, port: u8 },
    #[error("graph already holds the maximum number of connections")]
    ConnectionLimit,
    #[error("node {0:?} has reached its fan-out limit")]
    FanOutLimit(NodeId),
    #[error("graph contains a cycle through {0} nodes")]
    Cycle(usize),
}

/// Bring-up failure of the bus, clocks, codec or pool. Fatal before audio starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("unsupported sample rate {0} Hz")]
    InvalidSampleRate(u32),
    #[error("unsupported sample width {0} bits")]
    InvalidSampleWidth(u8),
    #[error("unsupported channel count {0}")]
    InvalidChannelCount(u8),
    #[error("transmit and receive clocking do not match")]
    ClockMismatch,
    #[error("direction has not been configured")]
    NotConfigured,
    #[error("direction is already running")]
    AlreadyStarted,
    #[error("buffer half holds {actual} words, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("pool capacity {0} is out of range")]
    PoolCapacity(usize),
    #[error("bus clocks did not lock")]
    ClockTimeout,
    #[error("serial audio bus rejected the configuration")]
    Bus,
    #[error("codec did not respond")]
    Codec,
}

/// A looper command that was rejected. State is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LooperError {
    #[error("command not valid in the current state")]
    InvalidTransition,
    #[error("track has no free layer")]
    LayerCeiling,
    #[error("nothing has been recorded")]
    NothingRecorded,
    #[error("clip is empty")]
    EmptyClip,
    #[error("clip is already committed")]
    AlreadyCommitted,
    #[error("loop arena is full")]
    ArenaExhausted,
    #[error("track {0} does not exist")]
    NoSuchTrack(usize),
    #[error("a deferred transition is already pending")]
    PendingBusy,
}
