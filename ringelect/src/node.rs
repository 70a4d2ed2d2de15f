//! The per-node election state machine.
//!
//! A `Node` owns its protocol flags, its neighbour set, its ring pointers
//! and both message queues. It is driven from outside: the network delivers
//! inbound messages with [`Node::deliver`], the node drains them with
//! [`Node::process_inbound`], and the network moves the resulting outbound
//! envelopes with [`Node::take_outbound`].
//!
//! Ring traffic always goes to the successor. When the successor has failed
//! (`next_is_dead`), outgoing ring traffic is wrapped in a `FORWARDTO` relay
//! envelope instead, and the network routes it hop by hop.

use std::cmp::Ordering;
use std::collections::VecDeque;

use tracing::{debug, info};

use crate::message::{Envelope, ProtocolMessage};
use crate::NodeId;

/// Protocol state machine for one ring member.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    /// Direct neighbours, insertion-ordered, never containing `id` itself.
    neighbours: Vec<NodeId>,
    /// Ring successor.
    next: NodeId,
    /// Ring predecessor.
    prev: NodeId,
    /// True once the ring successor has failed: ring traffic must be
    /// wrapped as relay envelopes from then on.
    next_is_dead: bool,
    /// True while an election message forwarded by this node is unresolved.
    participant: bool,
    is_leader: bool,
    /// True while the node has processing scheduled. Cleared at protocol
    /// quiescence; delivery or an election trigger sets it again.
    active: bool,
    current_leader: Option<NodeId>,
    inbound: VecDeque<ProtocolMessage>,
    outbound: VecDeque<Envelope>,
}

impl Node {
    /// Create a node with no neighbours and self-referential ring pointers.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            neighbours: Vec::new(),
            next: id,
            prev: id,
            next_is_dead: false,
            participant: false,
            is_leader: false,
            active: false,
            current_leader: None,
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn next(&self) -> NodeId {
        self.next
    }

    pub fn set_next(&mut self, next: NodeId) {
        self.next = next;
    }

    pub fn prev(&self) -> NodeId {
        self.prev
    }

    pub fn set_prev(&mut self, prev: NodeId) {
        self.prev = prev;
    }

    pub fn next_is_dead(&self) -> bool {
        self.next_is_dead
    }

    pub fn set_next_is_dead(&mut self, dead: bool) {
        self.next_is_dead = dead;
    }

    pub fn is_participant(&self) -> bool {
        self.participant
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_leader(&self) -> Option<NodeId> {
        self.current_leader
    }

    pub fn neighbours(&self) -> &[NodeId] {
        &self.neighbours
    }

    pub fn has_neighbour(&self, id: NodeId) -> bool {
        self.neighbours.contains(&id)
    }

    /// Add a neighbour. Self-edges and duplicates are ignored.
    pub fn add_neighbour(&mut self, id: NodeId) {
        if id != self.id && !self.neighbours.contains(&id) {
            self.neighbours.push(id);
        }
    }

    pub fn remove_neighbour(&mut self, id: NodeId) {
        self.neighbours.retain(|&n| n != id);
    }

    /// Queued outbound envelopes, oldest first.
    pub fn outbound(&self) -> &VecDeque<Envelope> {
        &self.outbound
    }

    /// True when the node has nothing left to do: not flagged active, not
    /// awaiting election resolution, and both queues empty.
    pub fn is_quiescent(&self) -> bool {
        !self.active && !self.participant && self.inbound.is_empty() && self.outbound.is_empty()
    }

    /// Start an election from this node.
    ///
    /// Returns `Some(id)` when the node elects itself on the spot, which
    /// happens only when it is the sole ring member. Triggering a node that
    /// is already a participant re-emits its candidacy without changing
    /// state.
    pub fn trigger_election(&mut self) -> Option<NodeId> {
        if self.next == self.id {
            info!(node = self.id, "sole ring member marks itself as leader");
            self.is_leader = true;
            self.current_leader = Some(self.id);
            self.participant = false;
            self.active = false;
            return Some(self.id);
        }
        info!(node = self.id, "starting election");
        self.participant = true;
        self.active = true;
        self.forward(ProtocolMessage::Elect(self.id));
        None
    }

    /// Queue an inbound message and mark the node as having work.
    pub fn deliver(&mut self, msg: ProtocolMessage) {
        self.inbound.push_back(msg);
        self.active = true;
    }

    /// Drain and dispatch the inbound queue.
    ///
    /// Returns the ids of any elections won while processing (at most one
    /// in practice). A node that is no longer a participant afterwards goes
    /// quiescent until the next delivery or trigger.
    pub fn process_inbound(&mut self) -> Vec<NodeId> {
        let mut elected = Vec::new();
        while let Some(msg) = self.inbound.pop_front() {
            if let Some(winner) = self.handle(msg) {
                elected.push(winner);
            }
        }
        if !self.participant {
            self.active = false;
        }
        elected
    }

    /// Move all queued outbound envelopes out of the node.
    pub fn take_outbound(&mut self) -> VecDeque<Envelope> {
        std::mem::take(&mut self.outbound)
    }

    /// Put back envelopes the network withheld this round, preserving their
    /// original order. Only valid right after [`Node::take_outbound`].
    pub fn restore_outbound(&mut self, pending: VecDeque<Envelope>) {
        debug_assert!(self.outbound.is_empty());
        self.outbound = pending;
    }

    fn handle(&mut self, msg: ProtocolMessage) -> Option<NodeId> {
        debug!(node = self.id, msg = %msg, "received message");
        match msg {
            ProtocolMessage::Elect(candidate) => self.handle_elect(candidate),
            ProtocolMessage::Leader(leader) => {
                self.handle_leader(leader);
                None
            }
            ProtocolMessage::Forward { target, inner } => {
                // Relay envelopes are not processed here, only re-emitted
                // toward their final target for the router to resolve.
                self.outbound.push_back(Envelope {
                    sender: self.id,
                    recipient: target,
                    forward: true,
                    msg: ProtocolMessage::Forward { target, inner },
                });
                None
            }
        }
    }

    fn handle_elect(&mut self, candidate: NodeId) -> Option<NodeId> {
        match candidate.cmp(&self.id) {
            Ordering::Greater => {
                self.participant = true;
                self.forward(ProtocolMessage::Elect(candidate));
                None
            }
            Ordering::Less => {
                if self.participant {
                    debug!(node = self.id, candidate, "discarding election message");
                } else {
                    self.participant = true;
                    self.forward(ProtocolMessage::Elect(self.id));
                }
                None
            }
            Ordering::Equal => {
                // Our own id survived a full traversal: we win.
                info!(node = self.id, "marks itself as leader");
                self.is_leader = true;
                self.current_leader = Some(self.id);
                self.forward(ProtocolMessage::Leader(self.id));
                self.participant = false;
                self.active = false;
                Some(self.id)
            }
        }
    }

    fn handle_leader(&mut self, leader: NodeId) {
        debug!(node = self.id, leader, "recorded leader");
        self.current_leader = Some(leader);
        // Stop propagating once the successor is the leader itself: the
        // announcement has then completed its loop.
        if self.next != leader {
            self.forward(ProtocolMessage::Leader(leader));
        }
        self.participant = false;
        self.active = false;
    }

    /// The single outbound path for ring traffic. Wraps the message in a
    /// relay envelope when the ring successor has failed.
    fn forward(&mut self, msg: ProtocolMessage) {
        if self.next_is_dead {
            let wrapped = ProtocolMessage::Forward {
                target: self.next,
                inner: Box::new(msg),
            };
            debug!(node = self.id, msg = %wrapped, "sending relay envelope");
            self.outbound.push_back(Envelope {
                sender: self.id,
                recipient: self.next,
                forward: true,
                msg: wrapped,
            });
        } else {
            debug!(node = self.id, msg = %msg, to = self.next, "sending message");
            self.outbound.push_back(Envelope {
                sender: self.id,
                recipient: self.next,
                forward: false,
                msg,
            });
        }
    }
}
