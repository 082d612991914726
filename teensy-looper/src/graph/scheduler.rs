//! Per-block execution pass over a sorted [`Graph`].

use crate::block::{BlockMut, BlockPool, BlockRef};
use crate::constants::{MAX_NODES, MAX_PORTS};
use crate::node::AudioNode;

use super::stats::{CycleCounter, NoCycleCounter, NodeStats, SchedulerStats};
use super::Graph;

/// Runs every registered node once per block period, routing blocks along
/// the graph's connections.
///
/// The scheduler is the single context object for the real-time pass: it
/// owns the graph, the per-node input slots and all timing statistics.
/// Passes are run-to-completion; nothing here blocks or allocates beyond
/// the block pool.
pub struct Scheduler<'p, C: CycleCounter = NoCycleCounter> {
    graph: Graph,
    pool: &'p BlockPool,
    /// Blocks delivered to each node's input ports for the current pass.
    inputs: [[Option<BlockRef<'p>>; MAX_PORTS]; MAX_NODES],
    node_stats: [NodeStats; MAX_NODES],
    stats: SchedulerStats,
    budget_cycles: u32,
    counter: C,
}

impl<'p, C: CycleCounter> Scheduler<'p, C> {
    /// Take ownership of a wired graph.
    ///
    /// The graph should already be sorted; an unsorted graph runs in its
    /// current order.
    pub fn new(graph: Graph, pool: &'p BlockPool, counter: C) -> Self {
        if !graph.is_sorted() {
            log::warn!("scheduler: graph is not sorted, running in registration order");
        }
        Scheduler {
            graph,
            pool,
            inputs: core::array::from_fn(|_| Default::default()),
            node_stats: [NodeStats::default(); MAX_NODES],
            stats: SchedulerStats::default(),
            budget_cycles: u32::MAX,
            counter,
        }
    }

    /// Run one block period.
    ///
    /// `nodes` must list the application's nodes in registration order (so
    /// `nodes[id.index()]` is the node registered as `id`). A length mismatch
    /// skips the pass. Returns `false` when the pass was skipped or exceeded
    /// the cycle budget; neither is fatal.
    pub fn tick(&mut self, nodes: &mut [&mut dyn AudioNode]) -> bool {
        if nodes.len() != self.graph.node_count() {
            self.stats.skipped = self.stats.skipped.wrapping_add(1);
            return false;
        }

        let pass_start = self.counter.now();
        for position in 0..self.graph.order.len() {
            let id = self.graph.order[position];
            let index = id.index();
            let entry = &self.graph.nodes[index];
            let (n_in, n_out) = (entry.inputs as usize, entry.outputs as usize);

            let inputs = core::mem::take(&mut self.inputs[index]);
            let mut outputs: [Option<BlockMut<'p>>; MAX_PORTS] = Default::default();

            let node_start = self.counter.now();
            nodes[index].update(self.pool, &inputs[..n_in], &mut outputs[..n_out]);
            self.node_stats[index].record(self.counter.now().wrapping_sub(node_start));

            // Consumer is done with its inputs.
            drop(inputs);

            for (port, output) in outputs.iter_mut().enumerate().take(n_out) {
                let Some(block) = output.take() else { continue };
                let shared = block.into_shared();
                for &c in &self.graph.nodes[index].outgoing {
                    let conn = self.graph.connections[c as usize];
                    if conn.source_port as usize == port {
                        self.inputs[conn.dest.index()][conn.dest_port as usize] =
                            Some(shared.clone());
                    }
                }
                // The producer's own reference is dropped with `shared`.
            }
        }

        // Anything still parked belongs to a node that ran before its
        // producer (unsorted or cyclic graph); nothing survives the pass.
        for slots in self.inputs.iter_mut() {
            for slot in slots.iter_mut() {
                *slot = None;
            }
        }

        let cycles = self.counter.now().wrapping_sub(pass_start);
        self.stats.ticks = self.stats.ticks.wrapping_add(1);
        self.stats.cycles = cycles;
        self.stats.cycles_max = self.stats.cycles_max.max(cycles);
        if cycles > self.budget_cycles {
            self.stats.overruns = self.stats.overruns.wrapping_add(1);
            return false;
        }
        true
    }

    /// Set the cycle budget of one block period (see
    /// [`block_budget_cycles`](super::stats::block_budget_cycles)).
    pub fn set_budget_cycles(&mut self, cycles: u32) {
        self.budget_cycles = cycles;
    }

    pub fn budget_cycles(&self) -> u32 {
        self.budget_cycles
    }

    /// Aggregate pass statistics.
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Cost of one node.
    pub fn node_stats(&self, id: super::NodeId) -> Option<&NodeStats> {
        self.node_stats[..self.graph.node_count()].get(id.index())
    }

    /// Clear all timing statistics and counters.
    pub fn reset_stats(&mut self) {
        self.stats = SchedulerStats::default();
        self.node_stats = [NodeStats::default(); MAX_NODES];
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access for rewiring. Connections added here are not safely
    /// ordered until [`Graph::topological_sort`] runs again.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn pool(&self) -> &'p BlockPool {
        self.pool
    }
}
