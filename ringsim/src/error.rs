//! Simulation error types.

use ringelect::NodeId;

/// Errors that terminate a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    /// A node failure split the network into disconnected components.
    #[error("network disconnected at round {round} after node {failed} failed")]
    Disconnected { round: u64, failed: NodeId },
    /// The router found no live path for a relay envelope.
    #[error("no route from {from} to {to} at round {round}")]
    Unreachable { round: u64, from: NodeId, to: NodeId },
}

/// Errors from removing a node from the topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairError {
    /// The node to remove is not (or is no longer) part of the network.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// Removing the node left the survivors disconnected.
    #[error("network disconnected after node {failed} failed")]
    Disconnected { failed: NodeId },
}
