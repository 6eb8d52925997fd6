//! Peer-to-peer messages.

use serde::{Deserialize, Serialize};
use snapline_types::{Balance, NodeId};

/// A message travelling along the line between two nodes.
///
/// Every message carries its original sender and its final destination;
/// intermediate nodes relay it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    /// The sender has already debited itself; the destination adds `amount`.
    Credit {
        src_node_id: NodeId,
        dst_node_id: NodeId,
        amount: Balance,
    },

    /// The sender asks the destination to send it `amount`.
    Debit {
        src_node_id: NodeId,
        dst_node_id: NodeId,
        amount: Balance,
    },

    /// Chandy-Lamport marker for the session started by `snapshot_id`.
    Marker {
        src_node_id: NodeId,
        dst_node_id: NodeId,
        snapshot_id: NodeId,
    },

    /// A node's recorded balance, sent to the snapshot initiator.
    State {
        src_node_id: NodeId,
        dst_node_id: NodeId,
        account_balance: Balance,
    },
}

impl PeerMessage {
    /// Original sender of the message.
    pub fn src(&self) -> NodeId {
        match self {
            PeerMessage::Credit { src_node_id, .. }
            | PeerMessage::Debit { src_node_id, .. }
            | PeerMessage::Marker { src_node_id, .. }
            | PeerMessage::State { src_node_id, .. } => *src_node_id,
        }
    }

    /// Final destination of the message.
    pub fn dst(&self) -> NodeId {
        match self {
            PeerMessage::Credit { dst_node_id, .. }
            | PeerMessage::Debit { dst_node_id, .. }
            | PeerMessage::Marker { dst_node_id, .. }
            | PeerMessage::State { dst_node_id, .. } => *dst_node_id,
        }
    }

    /// Get the message type name for logging and metrics.
    pub fn type_name(&self) -> &'static str {
        match self {
            PeerMessage::Credit { .. } => "CREDIT",
            PeerMessage::Debit { .. } => "DEBIT",
            PeerMessage::Marker { .. } => "MARKER",
            PeerMessage::State { .. } => "STATE",
        }
    }

    /// Whether this message moves money (as opposed to snapshot bookkeeping).
    pub fn is_transfer(&self) -> bool {
        matches!(self, PeerMessage::Credit { .. } | PeerMessage::Debit { .. })
    }
}
