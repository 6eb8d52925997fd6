//! Snapshot correctness over the simulated line network.
//!
//! Every completed snapshot must account for exactly N × initial balance,
//! whatever transfers were in flight when it was taken.

use snapline_core::Event;
use snapline_ledger::LedgerConfig;
use snapline_messages::PeerMessage;
use snapline_node::NodeConfig;
use snapline_simulation::{NetworkConfig, SimulationRunner};
use snapline_snapshot::{DebitRecording, SnapshotConfig};
use snapline_types::NodeId;
use std::time::Duration;
use tracing_test::traced_test;

const INITIAL: i64 = 5_000_000;

fn network(node_count: u32) -> NetworkConfig {
    NetworkConfig {
        node_count,
        link_latency: Duration::from_millis(5),
        jitter_fraction: 0.8,
        ..Default::default()
    }
}

/// Fast random transfers so that snapshots race with plenty of traffic.
fn busy_node_config() -> NodeConfig {
    NodeConfig::default().with_ledger(
        LedgerConfig::default()
            .with_transfer_delay(Duration::from_millis(1), Duration::from_millis(15)),
    )
}

fn request_snapshot(runner: &mut SimulationRunner, node: u32, at: Duration) {
    runner.schedule_initial_event(NodeId(node), at, Event::SnapshotRequested);
}

#[test]
fn test_conservation_across_seeds() {
    for node_count in [2u32, 3, 5] {
        for seed in 0..20u64 {
            let mut runner = SimulationRunner::new(network(node_count), busy_node_config(), seed);
            runner.initialize();

            // One request per node, spread out enough that each completes
            // before its initiator is asked again.
            let mut requested = 0;
            for round in 0..3u64 {
                for node in 1..=node_count {
                    let at = Duration::from_millis(100 + round * 1000 + node as u64 * 37);
                    request_snapshot(&mut runner, node, at);
                    requested += 1;
                }
            }
            runner.run_until(Duration::from_secs(5));

            let completed = runner.completed_snapshots();
            assert_eq!(
                completed.len(),
                requested,
                "n={} seed={}: not every snapshot completed",
                node_count,
                seed
            );
            for snapshot in completed {
                assert_eq!(snapshot.report.nodes.len(), node_count as usize);
                assert_eq!(
                    snapshot.report.total(),
                    INITIAL * node_count as i64,
                    "n={} seed={} initiator={}: {:?}",
                    node_count,
                    seed,
                    snapshot.initiator,
                    snapshot.report
                );
            }
        }
    }
}

#[test]
fn test_concurrent_initiators() {
    for seed in 0..10u64 {
        let mut runner = SimulationRunner::new(network(4), busy_node_config(), seed);
        runner.initialize();

        for node in 1..=4 {
            request_snapshot(&mut runner, node, Duration::from_millis(250));
        }
        runner.run_until(Duration::from_secs(2));

        let mut initiators: Vec<u32> = runner
            .completed_snapshots()
            .iter()
            .map(|s| s.initiator.0)
            .collect();
        initiators.sort_unstable();
        assert_eq!(initiators, vec![1, 2, 3, 4], "seed={}", seed);

        for snapshot in runner.completed_snapshots() {
            assert_eq!(snapshot.report.total(), 4 * INITIAL, "seed={}", seed);
        }
    }
}

#[test]
fn test_single_node_completes_immediately() {
    let mut runner = SimulationRunner::new(network(1), NodeConfig::default(), 1);
    runner.initialize();
    request_snapshot(&mut runner, 1, Duration::from_millis(10));
    runner.run_until(Duration::from_millis(10));

    let completed = runner.completed_snapshots();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].completed_at, Duration::from_millis(10));
    assert_eq!(completed[0].report.nodes.get(&NodeId(1)), Some(&INITIAL));
    assert_eq!(runner.stats().messages_sent, 0);
}

#[test]
#[traced_test]
fn test_credit_in_flight_across_relay() {
    // No random transfers: only the scripted credit moves money.
    let mut runner = SimulationRunner::new(network(3), NodeConfig::default(), 7);

    runner.send_credit(NodeId(1), NodeId(3), 30_000);
    // The sender is debited as soon as the credit leaves.
    assert_eq!(runner.node(NodeId(1)).map(|n| n.balance()), Some(4_970_000));
    assert_eq!(runner.total_balance(), 15_000_000 - 30_000);
    request_snapshot(&mut runner, 3, Duration::from_millis(1));
    runner.run_until(Duration::from_secs(1));

    let completed = runner.completed_snapshots();
    assert_eq!(completed.len(), 1);
    let report = &completed[0].report;
    assert_eq!(report.total(), 15_000_000);
    // Node 3 recorded before the credit arrived but the credit was still on
    // the channel from node 1, so it belongs to node 3's share.
    assert_eq!(report.nodes.get(&NodeId(1)), Some(&4_970_000));
    assert_eq!(report.nodes.get(&NodeId(2)), Some(&5_000_000));
    assert_eq!(report.nodes.get(&NodeId(3)), Some(&5_030_000));

    assert!(!runner.has_messages_in_flight());
    assert_eq!(runner.node(NodeId(3)).map(|n| n.balance()), Some(5_030_000));
    // Credit, both markers between 1 and 3, and node 1's STATE.
    assert_eq!(runner.node(NodeId(2)).map(|n| n.stats().messages_relayed), Some(4));
}

#[test]
fn test_credit_sent_after_initiator_cut() {
    let mut runner = SimulationRunner::new(network(3), NodeConfig::default(), 11);

    // Node 1 cuts at t=0, then sends. Its markers precede the credit on
    // every link, so the credit is outside the snapshot everywhere.
    request_snapshot(&mut runner, 1, Duration::ZERO);
    runner.run_until(Duration::ZERO);
    runner.send_credit(NodeId(1), NodeId(3), 30_000);
    assert_eq!(runner.node(NodeId(1)).map(|n| n.balance()), Some(4_970_000));
    runner.run_until(Duration::from_secs(1));

    let completed = runner.completed_snapshots();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].initiator, NodeId(1));
    let report = &completed[0].report;
    assert_eq!(report.total(), 15_000_000);
    for id in 1..=3 {
        assert_eq!(report.nodes.get(&NodeId(id)), Some(&INITIAL), "node {}", id);
    }

    assert_eq!(runner.node(NodeId(3)).map(|n| n.balance()), Some(5_030_000));
    assert_eq!(runner.total_balance(), 15_000_000);
}

#[test]
fn test_credit_in_flight_at_initiator_cut() {
    let mut runner = SimulationRunner::new(network(3), NodeConfig::default(), 13);

    // The credit leaves before node 1 cuts, so node 1 records the reduced
    // balance and the credit must show up at node 3.
    runner.send_credit(NodeId(1), NodeId(3), 30_000);
    request_snapshot(&mut runner, 1, Duration::ZERO);
    runner.run_until(Duration::from_secs(1));

    let completed = runner.completed_snapshots();
    assert_eq!(completed.len(), 1);
    let report = &completed[0].report;
    assert_eq!(report.total(), 15_000_000);
    assert_eq!(report.nodes.get(&NodeId(1)), Some(&4_970_000));
    assert_eq!(report.nodes.get(&NodeId(2)), Some(&5_000_000));
    assert_eq!(report.nodes.get(&NodeId(3)), Some(&5_030_000));
}

#[test]
fn test_marker_and_state_counts() {
    let node_count = 4u32;
    let mut runner = SimulationRunner::new(network(node_count), NodeConfig::default(), 3);
    request_snapshot(&mut runner, 2, Duration::ZERO);
    runner.run_until(Duration::from_secs(1));

    assert_eq!(runner.completed_snapshots().len(), 1);
    let expected = (node_count - 1) as u64;

    for id in 1..=node_count {
        let stats = runner.node(NodeId(id)).map(|n| n.stats().snapshot).unwrap();
        assert_eq!(stats.sessions_started, 1, "node {}", id);
        assert_eq!(stats.markers_sent, expected, "node {}", id);
        assert_eq!(stats.markers_received, expected, "node {}", id);
        if id == 2 {
            assert_eq!(stats.states_received, expected);
            assert_eq!(stats.snapshots_completed, 1);
        } else {
            assert_eq!(stats.states_sent, 1, "node {}", id);
        }
    }

    // Every session was torn down.
    for id in 1..=node_count {
        let active = runner.node(NodeId(id)).map(|n| n.coordinator().active_sessions());
        assert_eq!(active, Some(0));
    }
}

/// Node 2 snapshots, then honors a DEBIT node 1 sent before its cut. The
/// CREDIT sent back reaches node 1 after node 2's marker, so node 1 leaves it
/// out. Recording the DEBIT at node 2 as well loses the amount.
fn run_pre_cut_debit(policy: DebitRecording) -> i64 {
    let config =
        NodeConfig::default().with_snapshot(SnapshotConfig::default().with_debit_recording(policy));
    let mut runner = SimulationRunner::new(network(2), config, 11);

    request_snapshot(&mut runner, 2, Duration::ZERO);
    runner.schedule_initial_event(
        NodeId(2),
        Duration::from_micros(500),
        Event::PeerMessageReceived {
            message: PeerMessage::Debit {
                src_node_id: NodeId(1),
                dst_node_id: NodeId(2),
                amount: 40_000,
            },
        },
    );
    runner.run_until(Duration::from_secs(1));

    assert_eq!(runner.total_balance(), 2 * INITIAL);
    let completed = runner.completed_snapshots();
    assert_eq!(completed.len(), 1);
    completed[0].report.total()
}

#[test]
fn test_pre_cut_debit_is_conserved_when_skipped() {
    assert_eq!(run_pre_cut_debit(DebitRecording::Skip), 2 * INITIAL);
}

#[test]
fn test_pre_cut_debit_is_lost_when_recorded() {
    assert_eq!(run_pre_cut_debit(DebitRecording::Record), 2 * INITIAL - 40_000);
}

#[test]
fn test_lost_marker_stalls_snapshot() {
    let mut runner = SimulationRunner::new(network(3), NodeConfig::default(), 5);
    runner.network_mut().set_packet_loss_rate(1.0);
    request_snapshot(&mut runner, 1, Duration::ZERO);
    runner.run_until(Duration::from_secs(1));

    assert!(runner.completed_snapshots().is_empty());
    assert!(runner.stats().messages_dropped_loss > 0);
    assert_eq!(
        runner.node(NodeId(1)).map(|n| n.coordinator().is_local_active()),
        Some(true)
    );
}
