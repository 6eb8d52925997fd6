//! Action types for the node state machine.

use crate::TimerId;
use snapline_messages::{PeerMessage, SnapshotReport};
use snapline_types::Direction;
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write a message to the physical link in `direction`.
    ///
    /// The message keeps its original source and destination; the link only
    /// decides the next hop.
    SendToPeer {
        direction: Direction,
        message: PeerMessage,
    },

    /// Set a timer to fire after a duration.
    SetTimer { id: TimerId, duration: Duration },

    /// A snapshot initiated by this node has converged.
    ///
    /// Production answers the pending control request with the report.
    SnapshotCompleted { report: SnapshotReport },
}

impl Action {
    /// Check if this action requires network I/O.
    pub fn is_network(&self) -> bool {
        matches!(self, Action::SendToPeer { .. })
    }

    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SendToPeer { .. } => "SendToPeer",
            Action::SetTimer { .. } => "SetTimer",
            Action::SnapshotCompleted { .. } => "SnapshotCompleted",
        }
    }
}
