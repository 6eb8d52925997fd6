//! Node state machine.

use crate::Router;
use snapline_core::{Action, Event, StateMachine, TimerId};
use snapline_ledger::{AccountLedger, LedgerConfig, LedgerStats};
use snapline_messages::PeerMessage;
use snapline_snapshot::{SnapshotConfig, SnapshotCoordinator, SnapshotOutput, SnapshotStats};
use snapline_types::{Balance, LineTopology, NodeId};
use std::time::Duration;
use tracing::{debug, trace};

/// Configuration for one node's state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub snapshot: SnapshotConfig,
    /// Seed for the ledger's random transfers.
    pub seed: u64,
}

impl NodeConfig {
    pub fn with_ledger(mut self, ledger: LedgerConfig) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Cumulative counters across the node's components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub ledger: LedgerStats,
    pub snapshot: SnapshotStats,
    /// Messages forwarded on behalf of other nodes.
    pub messages_relayed: u64,
    /// Messages dropped because their destination is outside the line.
    pub messages_dropped: u64,
}

/// Combined node state machine.
///
/// Owns the balance and every snapshot session. Ledger mutations caused by
/// an inbound message are handed to the coordinator within the same
/// `handle` call, so no event can observe one without the other.
pub struct NodeStateMachine {
    topology: LineTopology,
    router: Router,
    ledger: AccountLedger,
    coordinator: SnapshotCoordinator,
    messages_relayed: u64,
    messages_dropped: u64,
    now: Duration,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("node", &self.topology.local())
            .field("balance", &self.ledger.balance())
            .field("active_sessions", &self.coordinator.active_sessions())
            .field("now", &self.now)
            .finish()
    }
}

impl NodeStateMachine {
    pub fn new(topology: LineTopology, config: NodeConfig) -> Self {
        Self {
            topology,
            router: Router::new(topology),
            ledger: AccountLedger::new(topology, config.ledger, config.seed),
            coordinator: SnapshotCoordinator::new(topology, config.snapshot),
            messages_relayed: 0,
            messages_dropped: 0,
            now: Duration::ZERO,
        }
    }

    /// Actions to run once when the node starts: arm the transfer timer.
    pub fn initialize(&mut self) -> Vec<Action> {
        vec![self.transfer_timer()]
    }

    pub fn node_id(&self) -> NodeId {
        self.topology.local()
    }

    pub fn topology(&self) -> &LineTopology {
        &self.topology
    }

    pub fn balance(&self) -> Balance {
        self.ledger.balance()
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn coordinator(&self) -> &SnapshotCoordinator {
        &self.coordinator
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            ledger: self.ledger.stats(),
            snapshot: self.coordinator.stats(),
            messages_relayed: self.messages_relayed,
            messages_dropped: self.messages_dropped,
        }
    }

    /// Send `amount` to `dst` outside the random transfer schedule.
    ///
    /// Returns no actions if the transfer is not possible.
    pub fn send_credit(&mut self, dst: NodeId, amount: Balance) -> Vec<Action> {
        let mut actions = vec![];
        if let Some(message) = self.ledger.send_credit(dst, amount) {
            self.send(message, &mut actions);
        }
        actions
    }

    fn transfer_timer(&mut self) -> Action {
        Action::SetTimer {
            id: TimerId::Transfer,
            duration: self.ledger.next_transfer_delay(),
        }
    }

    fn send(&mut self, message: PeerMessage, actions: &mut Vec<Action>) {
        match self.router.route(message) {
            Some(action) => actions.push(action),
            None => self.messages_dropped += 1,
        }
    }

    fn apply_outputs(&mut self, outputs: Vec<SnapshotOutput>) -> Vec<Action> {
        let mut actions = Vec::with_capacity(outputs.len());
        for output in outputs {
            match output {
                SnapshotOutput::Send(message) => self.send(message, &mut actions),
                SnapshotOutput::Completed(report) => {
                    actions.push(Action::SnapshotCompleted { report })
                }
            }
        }
        actions
    }

    fn on_transfer_timer(&mut self) -> Vec<Action> {
        let mut actions = vec![];
        if let Some(message) = self.ledger.generate_random_transfer() {
            self.send(message, &mut actions);
        }
        actions.push(self.transfer_timer());
        actions
    }

    fn on_peer_message(&mut self, message: PeerMessage) -> Vec<Action> {
        if message.dst() != self.topology.local() {
            trace!(
                msg_type = message.type_name(),
                src = %message.src(),
                dst = %message.dst(),
                "Relaying"
            );
            let mut actions = vec![];
            self.send(message, &mut actions);
            if !actions.is_empty() {
                self.messages_relayed += 1;
            }
            return actions;
        }

        match message {
            PeerMessage::Credit {
                src_node_id,
                amount,
                ..
            } => {
                if let Some(effect) = self.ledger.apply_credit(src_node_id, amount) {
                    self.coordinator.record_effect(&effect);
                }
                vec![]
            }
            PeerMessage::Debit {
                src_node_id,
                amount,
                ..
            } => {
                let mut actions = vec![];
                if let Some(outcome) = self.ledger.apply_debit_request(src_node_id, amount) {
                    self.coordinator.record_effect(&outcome.effect);
                    self.send(outcome.reply, &mut actions);
                }
                actions
            }
            PeerMessage::Marker {
                src_node_id,
                snapshot_id,
                ..
            } => {
                let outputs =
                    self.coordinator
                        .on_marker(src_node_id, snapshot_id, self.ledger.balance());
                self.apply_outputs(outputs)
            }
            PeerMessage::State {
                src_node_id,
                account_balance,
                ..
            } => {
                let outputs = self.coordinator.on_state(src_node_id, account_balance);
                self.apply_outputs(outputs)
            }
        }
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        debug!(event = event.type_name(), node = %self.topology.local(), "Handling event");
        match event {
            Event::TransferTimer => self.on_transfer_timer(),
            Event::PeerMessageReceived { message } => self.on_peer_message(message),
            Event::SnapshotRequested => {
                let outputs = self.coordinator.begin_local(self.ledger.balance());
                self.apply_outputs(outputs)
            }
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.coordinator.set_time(now);
    }

    fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_types::Direction;
    use tracing_test::traced_test;

    fn node(local: u32, count: u32) -> NodeStateMachine {
        let topology = LineTopology::new(NodeId(local), count).unwrap();
        NodeStateMachine::new(topology, NodeConfig::default().with_seed(local as u64))
    }

    fn received(message: PeerMessage) -> Event {
        Event::PeerMessageReceived { message }
    }

    #[test]
    fn test_initialize_arms_transfer_timer() {
        let mut node = node(1, 3);
        let actions = node.initialize();
        assert!(matches!(
            actions.as_slice(),
            [Action::SetTimer {
                id: TimerId::Transfer,
                ..
            }]
        ));
    }

    #[test]
    fn test_transfer_timer_sends_and_rearms() {
        let mut node = node(1, 3);
        let actions = node.handle(Event::TransferTimer);

        assert_eq!(actions.len(), 2);
        assert!(matches!(
            actions[0],
            Action::SendToPeer {
                direction: Direction::Next,
                ..
            }
        ));
        assert!(matches!(actions[1], Action::SetTimer { .. }));
    }

    #[test]
    fn test_relays_foreign_messages() {
        let mut node = node(2, 3);
        let message = PeerMessage::Credit {
            src_node_id: NodeId(1),
            dst_node_id: NodeId(3),
            amount: 30_000,
        };

        let actions = node.handle(received(message.clone()));
        assert_eq!(
            actions,
            vec![Action::SendToPeer {
                direction: Direction::Next,
                message,
            }]
        );
        assert_eq!(node.balance(), 5_000_000);
        assert_eq!(node.stats().messages_relayed, 1);
    }

    #[test]
    #[traced_test]
    fn test_overflowing_credit_is_ignored() {
        let mut node = node(2, 3);
        node.handle(Event::SnapshotRequested);

        let actions = node.handle(received(PeerMessage::Credit {
            src_node_id: NodeId(1),
            dst_node_id: NodeId(2),
            amount: Balance::MAX,
        }));

        assert!(actions.is_empty());
        assert_eq!(node.balance(), 5_000_000);
        assert_eq!(node.stats().ledger.credits_applied, 0);
        assert!(logs_contain("Ignoring CREDIT that would overflow the balance"));
    }

    #[test]
    fn test_invalid_debit_sends_nothing() {
        let mut node = node(2, 3);
        for (src, amount) in [(NodeId(2), 100), (NodeId(1), 0), (NodeId(3), -100)] {
            let actions = node.handle(received(PeerMessage::Debit {
                src_node_id: src,
                dst_node_id: NodeId(2),
                amount,
            }));
            assert!(actions.is_empty());
        }
        assert_eq!(node.balance(), 5_000_000);
        assert_eq!(node.stats().ledger.debits_applied, 0);
    }

    #[test]
    #[traced_test]
    fn test_drops_messages_beyond_the_line() {
        let mut node = node(3, 3);
        let actions = node.handle(received(PeerMessage::Debit {
            src_node_id: NodeId(1),
            dst_node_id: NodeId(4),
            amount: 10,
        }));

        assert!(actions.is_empty());
        assert_eq!(node.stats().messages_dropped, 1);
        assert!(logs_contain("Dropping unroutable message"));
    }

    #[test]
    fn test_debit_replies_with_credit() {
        let mut node = node(3, 3);
        let actions = node.handle(received(PeerMessage::Debit {
            src_node_id: NodeId(1),
            dst_node_id: NodeId(3),
            amount: 20_000,
        }));

        assert_eq!(
            actions,
            vec![Action::SendToPeer {
                direction: Direction::Prev,
                message: PeerMessage::Credit {
                    src_node_id: NodeId(3),
                    dst_node_id: NodeId(1),
                    amount: 20_000,
                },
            }]
        );
        assert_eq!(node.balance(), 4_980_000);
    }

    #[test]
    fn test_credit_during_snapshot_is_recorded() {
        let mut node = node(1, 2);
        node.handle(Event::SnapshotRequested);

        node.handle(received(PeerMessage::Credit {
            src_node_id: NodeId(2),
            dst_node_id: NodeId(1),
            amount: 100,
        }));
        node.handle(received(PeerMessage::Marker {
            src_node_id: NodeId(2),
            dst_node_id: NodeId(1),
            snapshot_id: NodeId(1),
        }));
        let actions = node.handle(received(PeerMessage::State {
            src_node_id: NodeId(2),
            dst_node_id: NodeId(1),
            account_balance: 4_999_900,
        }));

        let [Action::SnapshotCompleted { report }] = actions.as_slice() else {
            panic!("expected completion, got {:?}", actions);
        };
        assert_eq!(report.nodes.get(&NodeId(1)), Some(&5_000_100));
        assert_eq!(report.total(), 10_000_000);
    }

    #[test]
    fn test_single_node_snapshot() {
        let mut node = node(1, 1);
        let actions = node.handle(Event::SnapshotRequested);

        let [Action::SnapshotCompleted { report }] = actions.as_slice() else {
            panic!("expected completion, got {:?}", actions);
        };
        assert_eq!(report.total(), 5_000_000);
    }

    #[test]
    fn test_participant_markers_are_routed_both_ways() {
        let mut node = node(2, 3);
        let actions = node.handle(received(PeerMessage::Marker {
            src_node_id: NodeId(3),
            dst_node_id: NodeId(2),
            snapshot_id: NodeId(3),
        }));

        let directions: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                Action::SendToPeer { direction, .. } => Some(*direction),
                _ => None,
            })
            .collect();
        assert_eq!(directions, vec![Direction::Prev, Direction::Next]);
    }
}
