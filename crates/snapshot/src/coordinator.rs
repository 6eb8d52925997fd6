//! Snapshot coordinator.

use crate::{DebitRecording, SnapshotConfig, SnapshotSession};
use snapline_ledger::{BalanceEffect, EffectKind};
use snapline_messages::{PeerMessage, SnapshotReport};
use snapline_types::{Balance, LineTopology, NodeId, NodeMap};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Something the coordinator wants done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutput {
    /// Send a MARKER or STATE towards its destination.
    Send(PeerMessage),
    /// The locally initiated snapshot has converged.
    Completed(SnapshotReport),
}

/// Cumulative coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub sessions_started: u64,
    pub markers_sent: u64,
    pub markers_received: u64,
    pub states_sent: u64,
    pub states_received: u64,
    pub snapshots_completed: u64,
}

/// Runs one snapshot session per initiator.
///
/// Sessions are addressed only by initiator id. There is no generation
/// counter: a MARKER for an initiator whose session already finished here
/// opens a new session.
#[derive(Debug)]
pub struct SnapshotCoordinator {
    topology: LineTopology,
    config: SnapshotConfig,
    sessions: NodeMap<Option<SnapshotSession>>,
    stats: SnapshotStats,
    now: Duration,
}

impl SnapshotCoordinator {
    pub fn new(topology: LineTopology, config: SnapshotConfig) -> Self {
        Self {
            sessions: NodeMap::from_fn(topology.node_count(), |_| None),
            topology,
            config,
            stats: SnapshotStats::default(),
            now: Duration::ZERO,
        }
    }

    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }

    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    /// The active session started by `initiator`, if any.
    pub fn session(&self, initiator: NodeId) -> Option<&SnapshotSession> {
        self.sessions.get(initiator).and_then(Option::as_ref)
    }

    /// Number of sessions currently active on this node.
    pub fn active_sessions(&self) -> usize {
        self.sessions.iter().filter(|(_, s)| s.is_some()).count()
    }

    /// Whether this node's own snapshot is in progress.
    pub fn is_local_active(&self) -> bool {
        self.session(self.topology.local()).is_some()
    }

    /// Start a snapshot initiated by this node.
    ///
    /// Does nothing while a locally initiated snapshot is already running.
    pub fn begin_local(&mut self, balance: Balance) -> Vec<SnapshotOutput> {
        let local = self.topology.local();
        if self.is_local_active() {
            debug!(node = %local, "Snapshot already in progress");
            return vec![];
        }

        info!(node = %local, balance, "Starting snapshot");
        let mut outputs = self.open_session(local, balance);
        if let Some(output) = self.try_finalize() {
            outputs.push(output);
        }
        outputs
    }

    /// Handle a MARKER from `src` for the session started by `snapshot_id`.
    pub fn on_marker(
        &mut self,
        src: NodeId,
        snapshot_id: NodeId,
        balance: Balance,
    ) -> Vec<SnapshotOutput> {
        if !self.topology.is_remote(src) || !self.topology.contains(snapshot_id) {
            debug!(src = %src, snapshot_id = %snapshot_id, "Ignoring invalid MARKER");
            return vec![];
        }
        self.stats.markers_received += 1;

        let mut outputs = vec![];
        if self.session(snapshot_id).is_none() {
            outputs = self.open_session(snapshot_id, balance);
        }

        let local = self.topology.local();
        let Some(session) = self.sessions.get_mut(snapshot_id).and_then(Option::as_mut) else {
            return outputs;
        };
        session.mark_channel_empty(src);
        trace!(src = %src, snapshot_id = %snapshot_id, "Channel closed");

        if session.is_initiator() || !session.all_channels_empty() {
            return outputs;
        }

        let account_balance = session.local_balance();
        self.sessions.set(snapshot_id, None);
        self.stats.states_sent += 1;
        info!(
            snapshot_id = %snapshot_id,
            account_balance,
            "Snapshot recorded, sending STATE"
        );
        outputs.push(SnapshotOutput::Send(PeerMessage::State {
            src_node_id: local,
            dst_node_id: snapshot_id,
            account_balance,
        }));
        outputs
    }

    /// Handle a STATE reported by `src` to this node's own session.
    pub fn on_state(&mut self, src: NodeId, account_balance: Balance) -> Vec<SnapshotOutput> {
        let local = self.topology.local();
        if !self.topology.is_remote(src) {
            debug!(src = %src, "Ignoring STATE from invalid node");
            return vec![];
        }
        let Some(session) = self.sessions.get_mut(local).and_then(Option::as_mut) else {
            debug!(src = %src, "Ignoring STATE without local snapshot");
            return vec![];
        };

        session.record_state(src, account_balance);
        self.stats.states_received += 1;
        debug!(src = %src, account_balance, "STATE collected");

        self.try_finalize().into_iter().collect()
    }

    /// Attribute a ledger effect to every session still listening on its channel.
    pub fn record_effect(&mut self, effect: &BalanceEffect) {
        if effect.kind == EffectKind::Debit
            && self.config.debit_recording == DebitRecording::Skip
        {
            return;
        }
        for (initiator, slot) in self.sessions.iter_mut() {
            if let Some(session) = slot {
                if session.record_effect(effect.channel, effect.delta) {
                    trace!(
                        snapshot_id = %initiator,
                        channel = %effect.channel,
                        delta = effect.delta,
                        "Recorded in-flight effect"
                    );
                }
            }
        }
    }

    fn open_session(&mut self, initiator: NodeId, balance: Balance) -> Vec<SnapshotOutput> {
        let local = self.topology.local();
        let session = SnapshotSession::new(&self.topology, initiator, balance, self.now);
        self.sessions.set(initiator, Some(session));
        self.stats.sessions_started += 1;

        let markers: Vec<SnapshotOutput> = self
            .topology
            .other_nodes()
            .map(|dst| {
                SnapshotOutput::Send(PeerMessage::Marker {
                    src_node_id: local,
                    dst_node_id: dst,
                    snapshot_id: initiator,
                })
            })
            .collect();
        self.stats.markers_sent += markers.len() as u64;
        debug!(snapshot_id = %initiator, balance, markers = markers.len(), "Session opened");
        markers
    }

    fn try_finalize(&mut self) -> Option<SnapshotOutput> {
        let local = self.topology.local();
        let session = self.session(local)?;
        if !session.all_nodes_complete() {
            return None;
        }

        let report = session.report();
        let elapsed = self.now.saturating_sub(session.started_at());
        self.sessions.set(local, None);
        self.stats.snapshots_completed += 1;
        info!(
            total = report.total(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Snapshot completed"
        );
        Some(SnapshotOutput::Completed(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(local: u32, count: u32) -> SnapshotCoordinator {
        let topology = LineTopology::new(NodeId(local), count).unwrap();
        SnapshotCoordinator::new(topology, SnapshotConfig::default())
    }

    fn sent(outputs: &[SnapshotOutput]) -> Vec<PeerMessage> {
        outputs
            .iter()
            .filter_map(|o| match o {
                SnapshotOutput::Send(m) => Some(m.clone()),
                SnapshotOutput::Completed(_) => None,
            })
            .collect()
    }

    fn credit(channel: u32, delta: Balance) -> BalanceEffect {
        BalanceEffect {
            channel: NodeId(channel),
            delta,
            kind: EffectKind::Credit,
        }
    }

    #[test]
    fn test_begin_local_sends_markers_to_all_others() {
        let mut c = coordinator(2, 4);
        let outputs = c.begin_local(100);

        let dsts: Vec<_> = sent(&outputs).iter().map(|m| m.dst()).collect();
        assert_eq!(dsts, vec![NodeId(1), NodeId(3), NodeId(4)]);
        assert!(sent(&outputs)
            .iter()
            .all(|m| matches!(m, PeerMessage::Marker { snapshot_id, .. } if *snapshot_id == NodeId(2))));
        assert!(c.is_local_active());

        // A second request while running is ignored.
        assert!(c.begin_local(100).is_empty());
        assert_eq!(c.stats().sessions_started, 1);
    }

    #[test]
    fn test_single_node_completes_immediately() {
        let mut c = coordinator(1, 1);
        let outputs = c.begin_local(5_000_000);

        assert_eq!(outputs.len(), 1);
        let SnapshotOutput::Completed(report) = &outputs[0] else {
            panic!("expected completion, got {:?}", outputs);
        };
        assert_eq!(report.nodes.get(&NodeId(1)), Some(&5_000_000));
        assert!(!c.is_local_active());
    }

    #[test]
    fn test_participant_sends_state_after_all_markers() {
        let mut c = coordinator(2, 3);

        let outputs = c.on_marker(NodeId(1), NodeId(1), 700);
        let msgs = sent(&outputs);
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| matches!(m, PeerMessage::Marker { .. })));

        // Channel 3 is still open: its credits belong to the snapshot.
        c.record_effect(&credit(3, 40));
        // Channel 1 is closed: its credits do not.
        c.record_effect(&credit(1, 1000));

        let outputs = c.on_marker(NodeId(3), NodeId(1), 9999);
        assert_eq!(
            sent(&outputs),
            vec![PeerMessage::State {
                src_node_id: NodeId(2),
                dst_node_id: NodeId(1),
                account_balance: 740,
            }]
        );
        assert!(c.session(NodeId(1)).is_none());
        assert_eq!(c.stats().states_sent, 1);
    }

    #[test]
    fn test_two_node_participant_replies_on_first_marker() {
        let mut c = coordinator(2, 2);
        let outputs = c.on_marker(NodeId(1), NodeId(1), 500);
        let msgs = sent(&outputs);

        assert_eq!(msgs.len(), 2);
        assert!(matches!(msgs[0], PeerMessage::Marker { .. }));
        assert!(matches!(
            msgs[1],
            PeerMessage::State { account_balance: 500, .. }
        ));
        assert_eq!(c.active_sessions(), 0);
    }

    #[test]
    fn test_initiator_collects_states() {
        let mut c = coordinator(1, 3);
        c.begin_local(100);

        c.on_marker(NodeId(2), NodeId(1), 0);
        c.record_effect(&credit(3, 5));
        assert!(c.on_state(NodeId(2), 200).is_empty());

        c.on_marker(NodeId(3), NodeId(1), 0);
        let outputs = c.on_state(NodeId(3), 300);

        let [SnapshotOutput::Completed(report)] = outputs.as_slice() else {
            panic!("expected completion, got {:?}", outputs);
        };
        assert_eq!(report.nodes.get(&NodeId(1)), Some(&105));
        assert_eq!(report.total(), 605);
        assert_eq!(c.stats().snapshots_completed, 1);
        assert!(!c.is_local_active());
    }

    #[test]
    fn test_invalid_inputs_are_ignored() {
        let mut c = coordinator(2, 3);

        assert!(c.on_marker(NodeId(0), NodeId(1), 1).is_empty());
        assert!(c.on_marker(NodeId(4), NodeId(1), 1).is_empty());
        assert!(c.on_marker(NodeId(2), NodeId(1), 1).is_empty());
        assert!(c.on_marker(NodeId(1), NodeId(7), 1).is_empty());
        assert_eq!(c.active_sessions(), 0);

        // No local session yet.
        assert!(c.on_state(NodeId(1), 10).is_empty());

        c.begin_local(10);
        assert!(c.on_state(NodeId(2), 10).is_empty());
        assert!(c.on_state(NodeId(9), 10).is_empty());
        assert_eq!(c.stats().states_received, 0);
    }

    #[test]
    fn test_concurrent_sessions_are_independent() {
        let mut c = coordinator(2, 3);
        c.begin_local(100);
        c.on_marker(NodeId(1), NodeId(3), 100);

        c.record_effect(&credit(1, 10));

        // Closed for initiator 3, still open for the local session.
        assert_eq!(c.session(NodeId(3)).map(|s| s.local_balance()), Some(100));
        assert_eq!(c.session(NodeId(2)).map(|s| s.local_balance()), Some(110));
        assert_eq!(c.active_sessions(), 2);
    }

    #[test]
    fn test_debit_recording_policy() {
        let debit = BalanceEffect {
            channel: NodeId(1),
            delta: -30,
            kind: EffectKind::Debit,
        };

        let mut skip = coordinator(2, 2);
        skip.begin_local(100);
        skip.record_effect(&debit);
        assert_eq!(skip.session(NodeId(2)).map(|s| s.local_balance()), Some(100));

        let topology = LineTopology::new(NodeId(2), 2).unwrap();
        let mut record = SnapshotCoordinator::new(
            topology,
            SnapshotConfig::default().with_debit_recording(DebitRecording::Record),
        );
        record.begin_local(100);
        record.record_effect(&debit);
        assert_eq!(record.session(NodeId(2)).map(|s| s.local_balance()), Some(70));
    }
}
