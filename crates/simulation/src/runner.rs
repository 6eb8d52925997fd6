//! Deterministic simulation runner.

use crate::event_queue::EventKey;
use crate::network::{NetworkConfig, SimulatedNetwork};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use snapline_core::{Action, Event, StateMachine, TimerId};
use snapline_messages::SnapshotReport;
use snapline_node::{NodeConfig, NodeStateMachine};
use snapline_types::{Balance, Direction, LineTopology, NodeId, NodeMap};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A snapshot that converged at its initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedSnapshot {
    pub initiator: NodeId,
    pub completed_at: Duration,
    pub report: SnapshotReport,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 4],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages scheduled for delivery.
    pub messages_sent: u64,
    /// Messages dropped due to packet loss.
    pub messages_dropped_loss: u64,
    /// Messages sent on a link that does not exist.
    pub messages_dropped_no_link: u64,
    /// Timers set.
    pub timers_set: u64,
}

impl SimulationStats {
    /// Total messages dropped.
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_loss + self.messages_dropped_no_link
    }
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order and executes actions.
/// Given the same seed, produces identical results every run.
pub struct SimulationRunner {
    /// All nodes in the simulation, indexed by node id.
    nodes: NodeMap<NodeStateMachine>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    network: SimulatedNetwork,

    /// RNG for network conditions (seeded for determinism).
    rng: ChaCha8Rng,

    /// Pending timer per (node, timer); re-arming replaces it.
    timers: HashMap<(NodeId, TimerId), EventKey>,

    completed: Vec<CompletedSnapshot>,

    stats: SimulationStats,
}

impl SimulationRunner {
    /// Create a runner with `network_config.node_count` nodes.
    ///
    /// Each node's ledger gets its own seed derived from `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `network_config.node_count` is zero.
    pub fn new(network_config: NetworkConfig, node_config: NodeConfig, seed: u64) -> Self {
        let count = network_config.node_count;
        assert!(count > 0, "simulation needs at least one node");

        let nodes = NodeMap::from_fn(count, |id| {
            let topology = LineTopology::new(id, count).expect("id drawn from 1..=count");
            let node_seed = seed
                .wrapping_add(id.0 as u64)
                .wrapping_mul(0x517cc1b727220a95);
            NodeStateMachine::new(topology, node_config.clone().with_seed(node_seed))
        });

        Self {
            nodes,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(network_config),
            rng: ChaCha8Rng::seed_from_u64(seed),
            timers: HashMap::new(),
            completed: vec![],
            stats: SimulationStats::default(),
        }
    }

    /// Arm every node's transfer timer.
    pub fn initialize(&mut self) {
        for index in 1..=self.node_count() {
            let id = NodeId(index);
            let actions = match self.nodes.get_mut(id) {
                Some(node) => node.initialize(),
                None => continue,
            };
            for action in actions {
                self.process_action(id, action);
            }
        }
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeStateMachine> {
        self.nodes.get(id)
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    /// Snapshots completed so far, in completion order.
    pub fn completed_snapshots(&self) -> &[CompletedSnapshot] {
        &self.completed
    }

    /// Sum of every node's live balance.
    pub fn total_balance(&self) -> Balance {
        self.nodes.iter().map(|(_, node)| node.balance()).sum()
    }

    /// Whether any message is still travelling between nodes.
    pub fn has_messages_in_flight(&self) -> bool {
        self.event_queue
            .values()
            .any(|event| matches!(event, Event::PeerMessageReceived { .. }))
    }

    /// Schedule an event for a node at an absolute time.
    pub fn schedule_initial_event(&mut self, node: NodeId, time: Duration, event: Event) {
        self.schedule_event(node, time, event);
    }

    /// Have `from` send `amount` to `to` right now, outside its random schedule.
    pub fn send_credit(&mut self, from: NodeId, to: NodeId, amount: Balance) {
        let actions = match self.nodes.get_mut(from) {
            Some(node) => {
                node.set_time(self.now);
                node.send_credit(to, amount)
            }
            None => return,
        };
        for action in actions {
            self.process_action(from, action);
        }
    }

    /// Process events until the queue is empty or the next event is after `end_time`.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(end_time_secs = end_time.as_secs_f64(), "Running simulation");

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(remaining_events = self.event_queue.len(), "Time limit reached");
                break;
            }
            let Some((key, event)) = self.event_queue.pop_first() else {
                break;
            };
            self.now = key.time;
            if matches!(event, Event::TransferTimer) {
                self.timers.remove(&(key.node, TimerId::Transfer));
            }

            trace!(time = ?self.now, node = %key.node, event = event.type_name(), "Processing event");

            self.stats.events_processed += 1;
            self.stats.events_by_priority[event.priority() as usize] += 1;

            let Some(node) = self.nodes.get_mut(key.node) else {
                warn!(node = %key.node, "Event for unknown node");
                continue;
            };
            node.set_time(self.now);
            let actions = node.handle(event);
            self.stats.actions_generated += actions.len() as u64;

            for action in actions {
                self.process_action(key.node, action);
            }
        }

        if self.now < end_time {
            self.now = end_time;
        }
    }

    fn process_action(&mut self, from: NodeId, action: Action) {
        match action {
            Action::SendToPeer { direction, message } => {
                self.deliver(from, direction, Event::PeerMessageReceived { message });
            }

            Action::SetTimer { id, duration } => {
                if let Some(old) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&old);
                }
                let event = match id {
                    TimerId::Transfer => Event::TransferTimer,
                };
                let key = self.schedule_event(from, self.now + duration, event);
                self.timers.insert((from, id), key);
                self.stats.timers_set += 1;
            }

            Action::SnapshotCompleted { report } => {
                info!(
                    initiator = %from,
                    total = report.total(),
                    time = ?self.now,
                    "Snapshot completed"
                );
                self.completed.push(CompletedSnapshot {
                    initiator: from,
                    completed_at: self.now,
                    report,
                });
            }
        }
    }

    fn deliver(&mut self, from: NodeId, direction: Direction, event: Event) {
        let neighbor = self
            .nodes
            .get(from)
            .and_then(|node| node.topology().neighbor(direction));
        let Some(to) = neighbor else {
            self.stats.messages_dropped_no_link += 1;
            warn!(from = %from, direction = %direction, "No link in direction");
            return;
        };

        if self.network.should_drop_packet(&mut self.rng) {
            self.stats.messages_dropped_loss += 1;
            trace!(from = %from, to = %to, "Message dropped due to packet loss");
            return;
        }

        let time = self
            .network
            .delivery_time(from, direction, self.now, &mut self.rng);
        self.schedule_event(to, time, event);
        self.stats.messages_sent += 1;
    }

    fn schedule_event(&mut self, node: NodeId, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }
}
