use crate::block::{BlockMut, BlockPool, BlockRef};

/// Core trait for all audio processing nodes.
///
/// Each node receives input blocks and produces output blocks during
/// `update()`, once per block period. Port counts are reported at
/// registration time and must not change afterwards.
///
/// Nodes allocate their own outputs from `pool` on demand; an output slot
/// left as `None` means "no block this period" and downstream nodes treat it
/// as silence. A node must not keep any block past the end of `update()`.
pub trait AudioNode {
    /// Number of input ports this node accepts.
    fn num_inputs(&self) -> usize;

    /// Number of output ports this node produces.
    fn num_outputs(&self) -> usize;

    /// Process one block of audio.
    ///
    /// `inputs` holds `num_inputs()` slots, each optionally holding a shared
    /// block from the upstream connection. `outputs` holds `num_outputs()`
    /// empty slots for the node to fill.
    fn update<'p>(
        &mut self,
        pool: &'p BlockPool,
        inputs: &[Option<BlockRef<'p>>],
        outputs: &mut [Option<BlockMut<'p>>],
    );
}
