//! Event types for the node state machine.

use snapline_messages::PeerMessage;

/// Priority levels for event ordering within the same timestamp.
///
/// Lower values = higher priority (processed first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: messages from other nodes.
    Network = 2,

    /// Client events: control requests.
    Client = 3,
}

/// All possible events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Time to generate a random transfer.
    TransferTimer,

    /// A message arrived on one of the node's links.
    ///
    /// The message may be addressed to another node, in which case it is
    /// relayed.
    PeerMessageReceived { message: PeerMessage },

    /// A client asked this node to initiate a snapshot.
    SnapshotRequested,
}

impl Event {
    /// Get the priority of this event for ordering.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::TransferTimer => EventPriority::Timer,
            Event::PeerMessageReceived { .. } => EventPriority::Network,
            Event::SnapshotRequested => EventPriority::Client,
        }
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::TransferTimer => "TransferTimer",
            Event::PeerMessageReceived { .. } => "PeerMessageReceived",
            Event::SnapshotRequested => "SnapshotRequested",
        }
    }
}
