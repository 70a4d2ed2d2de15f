//! Live network topology: ring membership, chordal edges, repair, routing.
//!
//! Nodes are loaded in declaration order and the ring follows that order:
//! each node's successor is the next declared node, wrapping around. On top
//! of the ring, specs may declare extra chordal edges; all edges are
//! symmetric.
//!
//! When a node fails the ring is stitched shut around it (the predecessor
//! adopts the failed node's successor and marks that link as severed) and
//! the failed node is pruned from every neighbour set. Routing for severed
//! links is a breadth-first search over the live neighbour graph.

use hashbrown::{HashMap, HashSet};
use ringelect::{Node, NodeId};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::actor::SimNode;
use crate::error::RepairError;

/// Declaration of one node: its id and its extra (non-ring) neighbours.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: NodeId,
    pub neighbours: Vec<NodeId>,
}

impl NodeSpec {
    pub fn new(id: NodeId, neighbours: impl Into<Vec<NodeId>>) -> Self {
        Self {
            id,
            neighbours: neighbours.into(),
        }
    }
}

/// The set of live nodes plus the declaration order they were loaded in.
#[derive(Debug)]
pub struct Topology {
    /// Live node ids in declaration order.
    order: Vec<NodeId>,
    nodes: HashMap<NodeId, SimNode>,
}

impl Topology {
    /// Build the topology and spawn one actor per node.
    ///
    /// Explicit neighbour edges are added first (symmetrized), then the
    /// ring overlay on top: successor edge, then predecessor edge. Must be
    /// called within a Tokio runtime.
    pub fn build(specs: &[NodeSpec], elected_tx: &mpsc::UnboundedSender<NodeId>) -> Self {
        let order: Vec<NodeId> = specs.iter().map(|s| s.id).collect();
        debug_assert_eq!(
            order.iter().collect::<HashSet<_>>().len(),
            order.len(),
            "duplicate node ids"
        );

        let mut states: HashMap<NodeId, Node> =
            order.iter().map(|&id| (id, Node::new(id))).collect();

        for spec in specs {
            for &nb in &spec.neighbours {
                if let Some(node) = states.get_mut(&spec.id) {
                    node.add_neighbour(nb);
                }
                if let Some(node) = states.get_mut(&nb) {
                    node.add_neighbour(spec.id);
                }
            }
        }

        let count = order.len();
        for (i, &id) in order.iter().enumerate() {
            let next = order[(i + 1) % count];
            let prev = order[(i + count - 1) % count];
            if let Some(node) = states.get_mut(&id) {
                node.set_next(next);
                node.set_prev(prev);
                node.add_neighbour(next);
                node.add_neighbour(prev);
            }
        }

        let nodes = order
            .iter()
            .filter_map(|&id| {
                let state = states.remove(&id)?;
                Some((id, SimNode::spawn(state, elected_tx.clone())))
            })
            .collect();

        Self { order, nodes }
    }

    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live nodes in declaration order.
    pub fn iter_in_order(&self) -> impl Iterator<Item = (NodeId, &SimNode)> {
        self.order.iter().map(move |&id| (id, &self.nodes[&id]))
    }

    /// First live node in declaration order.
    pub fn first_in_order(&self) -> Option<NodeId> {
        self.order.first().copied()
    }

    /// Remove a failed node: stitch the ring shut around it, prune it from
    /// every neighbour set, and stop its actor.
    ///
    /// Returns the first live node in declaration order, the designated
    /// initiator for a fresh election. Fails if the node is unknown, if no
    /// nodes survive, or if the survivors are no longer connected.
    pub fn remove_node(&mut self, failed: NodeId) -> Result<NodeId, RepairError> {
        let removed = self
            .nodes
            .remove(&failed)
            .ok_or(RepairError::UnknownNode(failed))?;
        self.order.retain(|&id| id != failed);

        let (failed_next, failed_prev) = {
            let state = removed.lock();
            (state.next(), state.prev())
        };
        removed.shutdown();

        info!(failed, next = failed_next, prev = failed_prev, "removing failed node");

        if let Some(prev) = self.nodes.get(&failed_prev) {
            let mut state = prev.lock();
            state.set_next(failed_next);
            state.set_next_is_dead(true);
        }
        if let Some(next) = self.nodes.get(&failed_next) {
            next.lock().set_prev(failed_prev);
        }
        for node in self.nodes.values() {
            node.lock().remove_neighbour(failed);
        }

        let initiator = self
            .first_in_order()
            .ok_or(RepairError::Disconnected { failed })?;
        if !self.is_connected() {
            return Err(RepairError::Disconnected { failed });
        }
        Ok(initiator)
    }

    /// True when every live node is reachable from the first one over the
    /// live neighbour graph.
    pub fn is_connected(&self) -> bool {
        let Some(start) = self.first_in_order() else {
            return true;
        };
        let mut visited = HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for &nb in self.nodes[&id].lock().neighbours() {
                if self.nodes.contains_key(&nb) && visited.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        visited.len() == self.nodes.len()
    }

    /// Next hop for a relay envelope travelling from `from` toward `to`.
    ///
    /// Breadth-first search outward from the target; the first explored
    /// node adjacent to `from` is the hop. Returns `None` when no live path
    /// exists.
    pub fn next_hop(&self, from: NodeId, to: NodeId) -> Option<NodeId> {
        if !self.nodes.contains_key(&to) {
            return None;
        }
        let from_neighbours: Vec<NodeId> = self
            .nodes
            .get(&from)
            .map(|n| n.lock().neighbours().to_vec())?;

        let mut visited = HashSet::new();
        visited.insert(to);
        let mut queue = VecDeque::from([to]);
        while let Some(id) = queue.pop_front() {
            if from_neighbours.contains(&id) {
                debug!(from, to, hop = id, "routed relay envelope");
                return Some(id);
            }
            for &nb in self.nodes[&id].lock().neighbours() {
                if self.nodes.contains_key(&nb) && visited.insert(nb) {
                    queue.push_back(nb);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_specs(n: u32) -> Vec<NodeSpec> {
        (1..=n).map(|id| NodeSpec::new(id, [])).collect()
    }

    fn build_ring(n: u32) -> Topology {
        let (tx, _rx) = mpsc::unbounded_channel();
        Topology::build(&ring_specs(n), &tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ring_overlay_pointers() {
        let topo = build_ring(3);
        let n1 = topo.node(1).unwrap().lock();
        assert_eq!(n1.next(), 2);
        assert_eq!(n1.prev(), 3);
        assert!(n1.has_neighbour(2));
        assert!(n1.has_neighbour(3));
        drop(n1);

        let n3 = topo.node(3).unwrap().lock();
        assert_eq!(n3.next(), 1);
        assert_eq!(n3.prev(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_edges_are_symmetric() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut specs = ring_specs(4);
        specs[0].neighbours = vec![3];
        let topo = Topology::build(&specs, &tx);

        assert!(topo.node(1).unwrap().lock().has_neighbour(3));
        assert!(topo.node(3).unwrap().lock().has_neighbour(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_node_stitches_ring() {
        let mut topo = build_ring(3);
        let initiator = topo.remove_node(2).unwrap();
        assert_eq!(initiator, 1);
        assert_eq!(topo.len(), 2);
        assert!(!topo.contains(2));

        let n1 = topo.node(1).unwrap().lock();
        assert_eq!(n1.next(), 3);
        assert!(n1.next_is_dead());
        assert!(!n1.has_neighbour(2));
        drop(n1);

        assert_eq!(topo.node(3).unwrap().lock().prev(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_unknown_node() {
        let mut topo = build_ring(3);
        assert_eq!(topo.remove_node(9), Err(RepairError::UnknownNode(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnection_detected() {
        // Ring of 4 with 2 already gone: removing 4 isolates 3 from 1.
        let mut topo = build_ring(4);
        topo.remove_node(2).unwrap();
        assert_eq!(
            topo.remove_node(4),
            Err(RepairError::Disconnected { failed: 4 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_hop_around_gap() {
        // Ring of 5, node 3 removed: traffic from 2 to 4 goes back via 1.
        let mut topo = build_ring(5);
        topo.remove_node(3).unwrap();
        assert_eq!(topo.next_hop(2, 4), Some(1));
        // One hop closer, 1 is adjacent to 5 which is adjacent to 4.
        assert_eq!(topo.next_hop(1, 4), Some(5));
        assert_eq!(topo.next_hop(5, 4), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_hop_prefers_chord() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut specs = ring_specs(5);
        specs[1].neighbours = vec![4]; // chord 2-4
        let mut topo = Topology::build(&specs, &tx);
        topo.remove_node(3).unwrap();
        assert_eq!(topo.next_hop(2, 4), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_hop_missing_target() {
        let topo = build_ring(3);
        assert_eq!(topo.next_hop(1, 9), None);
    }
}
