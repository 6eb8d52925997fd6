//! Control-plane messages between a node and a snapshot client.

use serde::{Deserialize, Serialize};
use snapline_types::{Balance, NodeId};
use std::collections::BTreeMap;

/// Commands a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    /// Start a snapshot initiated by the receiving node.
    Snapshot,
}

/// A control request, e.g. `{"cmd":"snapshot"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub cmd: ControlCommand,
}

impl ControlRequest {
    /// Request a snapshot.
    pub fn snapshot() -> Self {
        Self {
            cmd: ControlCommand::Snapshot,
        }
    }
}

/// The per-node recorded balances of one completed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub nodes: BTreeMap<NodeId, Balance>,
}

impl SnapshotReport {
    /// Sum of all recorded balances, saturating at the bounds of [`Balance`].
    pub fn total(&self) -> Balance {
        self.nodes
            .values()
            .fold(0, |total: Balance, balance| total.saturating_add(*balance))
    }
}

/// Reply to a control request: `{"snapshot":{"nodes":{"1":b1,...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub snapshot: SnapshotReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let json = serde_json::to_string(&ControlRequest::snapshot()).unwrap();
        assert_eq!(json, r#"{"cmd":"snapshot"}"#);

        assert!(serde_json::from_str::<ControlRequest>(r#"{"cmd":"restart"}"#).is_err());
    }

    #[test]
    fn test_reply_keys_are_stringified_ids() {
        let mut nodes = BTreeMap::new();
        nodes.insert(NodeId(1), 4_970_000);
        nodes.insert(NodeId(2), 5_000_000);
        nodes.insert(NodeId(3), 5_030_000);
        let reply = ControlReply {
            snapshot: SnapshotReport { nodes },
        };

        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(
            json,
            r#"{"snapshot":{"nodes":{"1":4970000,"2":5000000,"3":5030000}}}"#
        );

        let decoded: ControlReply = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.snapshot.total(), 15_000_000);
    }

    #[test]
    fn test_total_saturates() {
        let report = SnapshotReport {
            nodes: BTreeMap::from([(NodeId(1), Balance::MAX), (NodeId(2), 1)]),
        };
        assert_eq!(report.total(), Balance::MAX);
    }
}
