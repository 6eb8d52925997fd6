//! Production metrics using native Prometheus client.
//!
//! Counters mirror the node's cumulative stats. The runner samples
//! [`NodeStats`] around every event and records the difference, so several
//! runners in one process add up instead of overwriting each other.

use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge_vec, IntCounter,
    IntCounterVec, IntGaugeVec,
};
use snapline_node::NodeStats;
use snapline_types::{Balance, NodeId};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain-specific metrics for production monitoring.
pub struct Metrics {
    // === Ledger ===
    pub transfers_generated: IntCounter,
    pub credits_applied: IntCounter,
    pub debits_applied: IntCounter,
    pub debits_rejected: IntCounter,
    pub account_balance: IntGaugeVec,

    // === Routing ===
    pub messages_relayed: IntCounter,
    pub messages_dropped: IntCounter,

    // === Snapshots ===
    pub snapshot_sessions_started: IntCounter,
    pub markers_sent: IntCounter,
    pub markers_received: IntCounter,
    pub states_sent: IntCounter,
    pub states_received: IntCounter,
    pub snapshots_completed: IntCounter,

    // === Network ===
    pub network_messages_sent: IntCounterVec,
    pub network_messages_received: IntCounterVec,

    // === Errors ===
    pub invalid_messages_received: IntCounter,
}

impl Metrics {
    fn new() -> Self {
        Self {
            // Ledger
            transfers_generated: register_int_counter!(
                "snapline_transfers_generated_total",
                "Random transfers started by this process"
            )
            .unwrap(),

            credits_applied: register_int_counter!(
                "snapline_credits_applied_total",
                "Inbound CREDITs applied to the balance"
            )
            .unwrap(),

            debits_applied: register_int_counter!(
                "snapline_debits_applied_total",
                "Inbound DEBIT requests honored"
            )
            .unwrap(),

            debits_rejected: register_int_counter!(
                "snapline_debits_rejected_total",
                "Inbound DEBIT requests dropped for insufficient balance"
            )
            .unwrap(),

            account_balance: register_int_gauge_vec!(
                "snapline_account_balance",
                "Current account balance",
                &["node"]
            )
            .unwrap(),

            // Routing
            messages_relayed: register_int_counter!(
                "snapline_messages_relayed_total",
                "Messages forwarded on behalf of other nodes"
            )
            .unwrap(),

            messages_dropped: register_int_counter!(
                "snapline_messages_dropped_total",
                "Messages dropped because their destination is outside the line"
            )
            .unwrap(),

            // Snapshots
            snapshot_sessions_started: register_int_counter!(
                "snapline_snapshot_sessions_started_total",
                "Snapshot sessions opened, local or on behalf of another initiator"
            )
            .unwrap(),

            markers_sent: register_int_counter!(
                "snapline_markers_sent_total",
                "MARKER messages sent"
            )
            .unwrap(),

            markers_received: register_int_counter!(
                "snapline_markers_received_total",
                "MARKER messages received"
            )
            .unwrap(),

            states_sent: register_int_counter!(
                "snapline_states_sent_total",
                "STATE messages sent"
            )
            .unwrap(),

            states_received: register_int_counter!(
                "snapline_states_received_total",
                "STATE messages received"
            )
            .unwrap(),

            snapshots_completed: register_int_counter!(
                "snapline_snapshots_completed_total",
                "Snapshots converged at their initiator"
            )
            .unwrap(),

            // Network
            network_messages_sent: register_int_counter_vec!(
                "snapline_network_messages_sent_total",
                "Peer frames written, by message type",
                &["type"]
            )
            .unwrap(),

            network_messages_received: register_int_counter_vec!(
                "snapline_network_messages_received_total",
                "Peer frames decoded, by message type",
                &["type"]
            )
            .unwrap(),

            // Errors
            invalid_messages_received: register_int_counter!(
                "snapline_invalid_messages_received_total",
                "Peer frames that could not be decoded"
            )
            .unwrap(),
        }
    }
}

/// Get or initialize the global metrics instance.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

fn add(counter: &IntCounter, before: u64, after: u64) {
    let delta = after.saturating_sub(before);
    if delta > 0 {
        counter.inc_by(delta);
    }
}

/// Record the counters that moved between two samples of a node's stats.
pub fn record_stats(before: &NodeStats, after: &NodeStats) {
    let m = metrics();

    add(
        &m.transfers_generated,
        before.ledger.transfers_generated,
        after.ledger.transfers_generated,
    );
    add(
        &m.credits_applied,
        before.ledger.credits_applied,
        after.ledger.credits_applied,
    );
    add(
        &m.debits_applied,
        before.ledger.debits_applied,
        after.ledger.debits_applied,
    );
    add(
        &m.debits_rejected,
        before.ledger.debits_rejected,
        after.ledger.debits_rejected,
    );

    add(&m.messages_relayed, before.messages_relayed, after.messages_relayed);
    add(&m.messages_dropped, before.messages_dropped, after.messages_dropped);

    let (b, a) = (&before.snapshot, &after.snapshot);
    add(&m.snapshot_sessions_started, b.sessions_started, a.sessions_started);
    add(&m.markers_sent, b.markers_sent, a.markers_sent);
    add(&m.markers_received, b.markers_received, a.markers_received);
    add(&m.states_sent, b.states_sent, a.states_sent);
    add(&m.states_received, b.states_received, a.states_received);
    add(&m.snapshots_completed, b.snapshots_completed, a.snapshots_completed);
}

/// Update a node's balance gauge.
pub fn set_balance(node: NodeId, balance: Balance) {
    let label = node.to_string();
    metrics()
        .account_balance
        .with_label_values(&[label.as_str()])
        .set(balance);
}

/// Record a peer frame written to a neighbor.
///
/// `msg_type` must be one of the wire type tags (`"CREDIT"`, `"DEBIT"`,
/// `"MARKER"`, `"STATE"`).
pub fn record_message_sent(msg_type: &str) {
    metrics()
        .network_messages_sent
        .with_label_values(&[msg_type])
        .inc();
}

/// Record a peer frame decoded from a neighbor.
pub fn record_message_received(msg_type: &str) {
    metrics()
        .network_messages_received
        .with_label_values(&[msg_type])
        .inc();
}

/// Record an invalid message received.
pub fn record_invalid_message() {
    metrics().invalid_messages_received.inc();
}
