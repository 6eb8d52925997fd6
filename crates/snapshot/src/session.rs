//! Per-initiator snapshot session.

use snapline_messages::SnapshotReport;
use snapline_types::{Balance, LineTopology, NodeId, NodeMap};
use std::time::Duration;

/// State of one snapshot, as seen by one node.
///
/// `channel_empty[x]` becomes true when the MARKER from `x` arrives; after
/// that, effects from `x` are no longer part of this snapshot.
/// `node_complete` and the remote entries of `recorded` are only used by
/// the initiator, which collects every node's STATE.
#[derive(Debug, Clone)]
pub struct SnapshotSession {
    initiator: NodeId,
    local: NodeId,
    channel_empty: NodeMap<bool>,
    node_complete: NodeMap<bool>,
    recorded: NodeMap<Balance>,
    started_at: Duration,
}

impl SnapshotSession {
    /// Open a session, recording `balance` as this node's state.
    pub fn new(
        topology: &LineTopology,
        initiator: NodeId,
        balance: Balance,
        started_at: Duration,
    ) -> Self {
        let local = topology.local();
        let count = topology.node_count();

        let mut channel_empty = NodeMap::filled(count, false);
        let mut node_complete = NodeMap::filled(count, false);
        let mut recorded = NodeMap::filled(count, 0);
        channel_empty.set(local, true);
        node_complete.set(local, true);
        recorded.set(local, balance);

        Self {
            initiator,
            local,
            channel_empty,
            node_complete,
            recorded,
            started_at,
        }
    }

    pub fn initiator(&self) -> NodeId {
        self.initiator
    }

    /// Whether this node started the session.
    pub fn is_initiator(&self) -> bool {
        self.initiator == self.local
    }

    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    /// This node's recorded balance.
    pub fn local_balance(&self) -> Balance {
        self.recorded.get(self.local).copied().unwrap_or_default()
    }

    pub fn is_channel_empty(&self, channel: NodeId) -> bool {
        self.channel_empty.get(channel).copied().unwrap_or(false)
    }

    /// Close the channel from `channel`.
    pub fn mark_channel_empty(&mut self, channel: NodeId) {
        self.channel_empty.set(channel, true);
    }

    pub fn all_channels_empty(&self) -> bool {
        self.channel_empty.all(|empty| *empty)
    }

    /// Adjust this node's recorded balance for an effect on `channel`.
    ///
    /// Returns `false` (and changes nothing) once the channel is closed.
    /// The adjustment saturates at the bounds of [`Balance`].
    pub fn record_effect(&mut self, channel: NodeId, delta: Balance) -> bool {
        if self.is_channel_empty(channel) {
            return false;
        }
        match self.recorded.get_mut(self.local) {
            Some(balance) => {
                *balance = balance.saturating_add(delta);
                true
            }
            None => false,
        }
    }

    /// Store the balance reported by `node` and mark it complete.
    pub fn record_state(&mut self, node: NodeId, balance: Balance) {
        self.recorded.set(node, balance);
        self.node_complete.set(node, true);
    }

    pub fn is_node_complete(&self, node: NodeId) -> bool {
        self.node_complete.get(node).copied().unwrap_or(false)
    }

    pub fn all_nodes_complete(&self) -> bool {
        self.node_complete.all(|complete| *complete)
    }

    /// The per-node recorded balances.
    pub fn report(&self) -> SnapshotReport {
        SnapshotReport {
            nodes: self.recorded.to_btree(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(local: u32, initiator: u32) -> SnapshotSession {
        let topology = LineTopology::new(NodeId(local), 3).unwrap();
        SnapshotSession::new(&topology, NodeId(initiator), 1000, Duration::ZERO)
    }

    #[test]
    fn test_new_session_marks_own_entries() {
        let session = session(2, 1);

        assert!(!session.is_initiator());
        assert!(session.is_channel_empty(NodeId(2)));
        assert!(!session.is_channel_empty(NodeId(1)));
        assert!(session.is_node_complete(NodeId(2)));
        assert!(!session.all_nodes_complete());
        assert_eq!(session.local_balance(), 1000);
    }

    #[test]
    fn test_effects_stop_after_marker() {
        let mut session = session(2, 2);

        assert!(session.record_effect(NodeId(1), 50));
        assert_eq!(session.local_balance(), 1050);

        session.mark_channel_empty(NodeId(1));
        assert!(!session.record_effect(NodeId(1), 50));
        assert_eq!(session.local_balance(), 1050);

        assert!(session.record_effect(NodeId(3), -20));
        assert_eq!(session.local_balance(), 1030);

        session.mark_channel_empty(NodeId(3));
        assert!(session.all_channels_empty());
    }

    #[test]
    fn test_effect_saturates() {
        let mut session = session(2, 1);

        assert!(session.record_effect(NodeId(1), Balance::MAX));
        assert_eq!(session.local_balance(), Balance::MAX);
        assert!(session.record_effect(NodeId(3), Balance::MIN));
        assert_eq!(session.local_balance(), -1);
    }

    #[test]
    fn test_report_collects_states() {
        let mut session = session(1, 1);
        session.record_state(NodeId(2), 2000);
        assert!(!session.all_nodes_complete());
        session.record_state(NodeId(3), 3000);
        assert!(session.all_nodes_complete());

        let report = session.report();
        assert_eq!(report.nodes.len(), 3);
        assert_eq!(report.total(), 6000);
    }
}
