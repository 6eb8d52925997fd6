//! Hop-by-hop message routing along the line.

use snapline_core::Action;
use snapline_messages::PeerMessage;
use snapline_types::{Direction, LineTopology, NodeId};
use tracing::warn;

/// Picks the physical link a message leaves on.
///
/// Nodes only talk to their immediate neighbors; a message for a farther
/// node is sent towards it and relayed by every node in between. Each link
/// is FIFO and relays are handled one at a time, so messages from one source
/// to one destination stay in order.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    topology: LineTopology,
}

impl Router {
    pub fn new(topology: LineTopology) -> Self {
        Self { topology }
    }

    /// Link towards `dst`, or `None` for this node or a node outside the line.
    pub fn direction_for(&self, dst: NodeId) -> Option<Direction> {
        let local = self.topology.local();
        if !self.topology.contains(dst) || dst == local {
            return None;
        }
        if dst > local {
            Some(Direction::Next)
        } else {
            Some(Direction::Prev)
        }
    }

    /// Wrap `message` in a send action towards its destination.
    ///
    /// Messages addressed outside the line are dropped with a warning.
    pub fn route(&self, message: PeerMessage) -> Option<Action> {
        match self.direction_for(message.dst()) {
            Some(direction) => Some(Action::SendToPeer { direction, message }),
            None => {
                warn!(
                    msg_type = message.type_name(),
                    src = %message.src(),
                    dst = %message.dst(),
                    "Dropping unroutable message"
                );
                None
            }
        }
    }
}
