#![forbid(unsafe_code)]
//! ringelect - Chang-Roberts ring leader election, sans-io.
//!
//! Every ring member runs the same state machine: an election message
//! carries a candidate id around the ring, each node forwards it while the
//! id beats its own, replaces it with its own id when it does not, and the
//! node whose id survives the full traversal declares itself leader and
//! circulates the announcement once more around.
//!
//! This crate holds only the protocol: the typed message set, the textual
//! wire format, and the per-node state machine. There are no clocks,
//! threads, or sockets here. A driver (see the `ringsim` crate) delivers
//! inbound messages, asks the node to process them, and moves outbound
//! envelopes onto whatever network it models.
//!
//! # Example
//!
//! ```
//! use ringelect::{Node, ProtocolMessage};
//!
//! // One member of a two-node ring: 1 <-> 2.
//! let mut node = Node::new(2);
//! node.add_neighbour(1);
//! node.set_next(1);
//! node.set_prev(1);
//!
//! // A smaller candidate id is replaced with our own.
//! node.deliver(ProtocolMessage::Elect(1));
//! node.process_inbound();
//! assert!(node.is_participant());
//!
//! let sent = node.take_outbound();
//! assert_eq!(sent[0].msg, ProtocolMessage::Elect(2));
//! ```
//!
//! # Module Structure
//!
//! - [`message`] - Protocol messages, envelopes, textual wire format
//! - [`node`] - The per-node state machine

pub mod message;
pub mod node;

pub use message::{Envelope, ParseError, ProtocolMessage};
pub use node::Node;

/// Unique node identifier.
pub type NodeId = u32;
