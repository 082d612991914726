/// Number of 16-bit samples per audio block.
pub const AUDIO_BLOCK_SAMPLES: usize = 128;

/// Exact audio sample rate in Hz (matches Teensy hardware PLL configuration).
pub const AUDIO_SAMPLE_RATE_EXACT: f32 = 44_117.647;

/// Largest block count accepted by [`BlockPool::init`](crate::block::BlockPool::init).
pub const POOL_CAPACITY_MAX: usize = 64;

/// Maximum number of nodes a [`Graph`](crate::graph::Graph) can register.
pub const MAX_NODES: usize = 16;

/// Maximum input or output port count of a single node.
pub const MAX_PORTS: usize = 8;

/// Maximum number of connections in a graph.
pub const MAX_CONNECTIONS: usize = 32;

/// Maximum number of connections sourced from one node.
pub const MAX_FANOUT: usize = 8;

/// Number of tracks owned by the looper.
pub const LOOPER_TRACKS: usize = 4;

/// Layer ceiling: clips per track.
pub const LOOPER_CLIPS: usize = 4;

/// Maximum channel count of the looper node.
pub const LOOPER_CHANNELS_MAX: usize = 2;

/// Slots in the looper command mailbox (usable capacity is one less).
pub const COMMAND_QUEUE_SLOTS: usize = 8;
