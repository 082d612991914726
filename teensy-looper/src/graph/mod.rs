//! Processing graph: node registry, static connections and execution order.
//!
//! Nodes are referenced by [`NodeId`], their registration index. The graph
//! only records each node's port capability and the connection list; the
//! node objects themselves are owned by the application and handed to
//! [`Scheduler::tick`] in registration order every block period.
//!
//! # Setup
//!
//! ```ignore
//! let mut graph = Graph::new();
//! let input = graph.add_node(&i2s_in)?;
//! let looper = graph.add_node(&looper)?;
//! let output = graph.add_node(&i2s_out)?;
//!
//! graph.connect(input, 0, looper, 0)?;
//! graph.connect(looper, 0, output, 0)?;
//! graph.topological_sort()?;
//!
//! let mut scheduler = Scheduler::new(graph, &POOL, NoCycleCounter);
//!
//! // Once per DMA completion:
//! scheduler.tick(&mut [&mut i2s_in, &mut looper, &mut i2s_out]);
//! ```
//!
//! # Ordering
//!
//! [`Graph::topological_sort`] places every producer before its consumers
//! and breaks ties by registration order, so an already-ordered registration
//! keeps its order. Connections added after a sort leave the graph unsorted
//! until the sort is run again; until then the previous order is used.

mod scheduler;
mod stats;

#[cfg(test)]
mod verification_tests;

pub use scheduler::Scheduler;
pub use stats::{CycleCounter, NoCycleCounter, NodeStats, SchedulerStats};

use heapless::Vec;

use crate::constants::{MAX_CONNECTIONS, MAX_FANOUT, MAX_NODES, MAX_PORTS};
use crate::error::GraphError;
use crate::node::AudioNode;

/// Registration index of a node in a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeId(pub(crate) u8);

impl NodeId {
    /// Position of the node in registration order.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A static routing edge from one node's output port to another's input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Connection {
    pub source: NodeId,
    pub source_port: u8,
    pub dest: NodeId,
    pub dest_port: u8,
}

/// Port capability plus the connections touching one node.
struct NodeEntry {
    inputs: u8,
    outputs: u8,
    /// Indices into `Graph::connections` ending at this node.
    incoming: Vec<u8, MAX_PORTS>,
    /// Indices into `Graph::connections` starting at this node.
    outgoing: Vec<u8, MAX_FANOUT>,
}

/// Set of registered nodes wired by immutable connections.
pub struct Graph {
    nodes: Vec<NodeEntry, MAX_NODES>,
    connections: Vec<Connection, MAX_CONNECTIONS>,
    order: Vec<NodeId, MAX_NODES>,
    sorted: bool,
}

impl Graph {
    /// Create an empty graph.
    pub const fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            connections: Vec::new(),
            order: Vec::new(),
            sorted: true,
        }
    }

    /// Register a node, reading its declared port counts.
    pub fn add_node(&mut self, node: &dyn AudioNode) -> Result<NodeId, GraphError> {
        self.add_ports(node.num_inputs(), node.num_outputs())
    }

    /// Register a node by explicit port counts.
    pub fn add_ports(&mut self, inputs: usize, outputs: usize) -> Result<NodeId, GraphError> {
        if inputs > MAX_PORTS {
            return Err(GraphError::PortLimit(inputs));
        }
        if outputs > MAX_PORTS {
            return Err(GraphError::PortLimit(outputs));
        }
        let id = NodeId(self.nodes.len() as u8);
        self.nodes
            .push(NodeEntry {
                inputs: inputs as u8,
                outputs: outputs as u8,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            })
            .map_err(|_| GraphError::NodeLimit)?;
        // Capacity matches `nodes`, so this cannot fail after the push above.
        let _ = self.order.push(id);
        self.sorted = false;
        log::debug!("graph: node {} registered ({} in, {} out)", id.0, inputs, outputs);
        Ok(id)
    }

    /// Connect `source`'s output `source_port` to `dest`'s input `dest_port`.
    ///
    /// Ports are checked against the declared capabilities and each input
    /// port accepts a single connection. An output port may fan out.
    pub fn connect(
        &mut self,
        source: NodeId,
        source_port: u8,
        dest: NodeId,
        dest_port: u8,
    ) -> Result<(), GraphError> {
        let src = self.nodes.get(source.index()).ok_or(GraphError::UnknownNode(source))?;
        if source_port >= src.outputs {
            return Err(GraphError::PortOutOfRange { node: source, port: source_port });
        }
        if src.outgoing.is_full() {
            return Err(GraphError::FanOutLimit(source));
        }
        let dst = self.nodes.get(dest.index()).ok_or(GraphError::UnknownNode(dest))?;
        if dest_port >= dst.inputs {
            return Err(GraphError::PortOutOfRange { node: dest, port: dest_port });
        }
        let taken = dst
            .incoming
            .iter()
            .any(|&c| self.connections[c as usize].dest_port == dest_port);
        if taken {
            return Err(GraphError::InputAlreadyConnected { node: dest, port: dest_port });
        }

        let index = self.connections.len() as u8;
        self.connections
            .push(Connection { source, source_port, dest, dest_port })
            .map_err(|_| GraphError::ConnectionLimit)?;
        // Both pushes are bounded by the checks above.
        let _ = self.nodes[source.index()].outgoing.push(index);
        let _ = self.nodes[dest.index()].incoming.push(index);
        self.sorted = false;
        log::debug!(
            "graph: connect {}:{} -> {}:{}",
            source.0,
            source_port,
            dest.0,
            dest_port
        );
        Ok(())
    }

    /// Order nodes so every producer runs before its consumers.
    ///
    /// Ties are broken by registration order. Re-runnable. If the graph has
    /// a cycle, the nodes on it are appended in registration order so that
    /// every node still executes, and [`GraphError::Cycle`] is returned.
    pub fn topological_sort(&mut self) -> Result<(), GraphError> {
        let count = self.nodes.len();
        let mut in_degree = [0u8; MAX_NODES];
        for conn in &self.connections {
            in_degree[conn.dest.index()] += 1;
        }

        let mut placed = [false; MAX_NODES];
        let mut order: Vec<NodeId, MAX_NODES> = Vec::new();
        while let Some(next) = (0..count).find(|&i| !placed[i] && in_degree[i] == 0) {
            placed[next] = true;
            let _ = order.push(NodeId(next as u8));
            for &c in &self.nodes[next].outgoing {
                in_degree[self.connections[c as usize].dest.index()] -= 1;
            }
        }

        let stuck = count - order.len();
        for i in (0..count).filter(|&i| !placed[i]) {
            let _ = order.push(NodeId(i as u8));
        }
        self.order = order;

        if stuck > 0 {
            log::warn!("graph: cycle through {} nodes, using registration order for them", stuck);
            self.sorted = false;
            return Err(GraphError::Cycle(stuck));
        }
        self.sorted = true;
        log::debug!("graph: sorted {} nodes", count);
        Ok(())
    }

    /// Current execution order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Whether the execution order reflects every connection.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// All connections in creation order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections ending at `node`.
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.nodes
            .get(node.index())
            .into_iter()
            .flat_map(|n| n.incoming.iter())
            .map(|&c| &self.connections[c as usize])
    }

    /// Connections starting at `node`.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.nodes
            .get(node.index())
            .into_iter()
            .flat_map(|n| n.outgoing.iter())
            .map(|&c| &self.connections[c as usize])
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declared `(inputs, outputs)` of a node.
    pub fn ports(&self, node: NodeId) -> Option<(usize, usize)> {
        self.nodes
            .get(node.index())
            .map(|n| (n.inputs as usize, n.outputs as usize))
    }

    /// Position of `node` in the execution order.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == node)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
