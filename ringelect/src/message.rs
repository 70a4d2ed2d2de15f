//! Protocol messages, envelopes, and the textual wire format.
//!
//! Messages are tagged variants inside the simulation; the delimited text
//! form exists for the external boundary and for log lines.
//!
//! ## Text format
//!
//! ```text
//! ELECT <candidate>
//! LEADER <leader>
//! FORWARDTO <target> <message>
//! ```
//!
//! `FORWARDTO` nests: the tail is itself a message in the same format, so a
//! relay envelope renders as e.g. `FORWARDTO 4 ELECT 5`.

use std::fmt;
use std::str::FromStr;

use crate::NodeId;

/// Errors when parsing the textual message format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Message type tag is not `ELECT`, `LEADER` or `FORWARDTO`.
    #[error("unknown message type in `{0}`")]
    UnknownType(String),
    /// The message ends before all fields are present.
    #[error("truncated message `{0}`")]
    Truncated(String),
    /// A field that should be a node id is not a valid integer.
    #[error("invalid node id `{0}`")]
    InvalidNodeId(String),
}

/// A protocol message circulating on the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// Election message carrying the strongest candidate id seen so far.
    Elect(NodeId),
    /// Leader announcement carrying the elected id.
    Leader(NodeId),
    /// Relay envelope for traffic that must cross a severed ring link.
    /// Carried hop by hop and unwrapped when it reaches `target`.
    Forward {
        target: NodeId,
        inner: Box<ProtocolMessage>,
    },
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elect(id) => write!(f, "ELECT {id}"),
            Self::Leader(id) => write!(f, "LEADER {id}"),
            Self::Forward { target, inner } => write!(f, "FORWARDTO {target} {inner}"),
        }
    }
}

impl FromStr for ProtocolMessage {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        let mut parts = s.splitn(2, ' ');
        let tag = parts.next().unwrap_or_default();
        let rest = parts
            .next()
            .ok_or_else(|| ParseError::Truncated(s.to_owned()))?;
        match tag {
            "ELECT" => Ok(Self::Elect(parse_id(rest)?)),
            "LEADER" => Ok(Self::Leader(parse_id(rest)?)),
            "FORWARDTO" => {
                let mut fields = rest.splitn(2, ' ');
                let target = parse_id(fields.next().unwrap_or_default())?;
                let inner = fields
                    .next()
                    .ok_or_else(|| ParseError::Truncated(s.to_owned()))?;
                Ok(Self::Forward {
                    target,
                    inner: Box::new(inner.parse()?),
                })
            }
            _ => Err(ParseError::UnknownType(s.to_owned())),
        }
    }
}

fn parse_id(s: &str) -> Result<NodeId, ParseError> {
    s.parse().map_err(|_| ParseError::InvalidNodeId(s.to_owned()))
}

/// An immutable message envelope queued for network transfer.
///
/// `forward == false` means the recipient must currently be a direct
/// neighbour of the sender; `forward == true` means the recipient is
/// reached hop by hop via the router, regardless of adjacency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: NodeId,
    pub recipient: NodeId,
    pub forward: bool,
    pub msg: ProtocolMessage,
}
