//! Deterministic event ordering.

use snapline_core::{Event, EventPriority};
use snapline_types::NodeId;
use std::time::Duration;

/// Ordering key for the global event queue.
///
/// Events are ordered by time, then priority, then insertion sequence. The
/// sequence number makes every key unique and keeps same-time messages on a
/// link in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub sequence: u64,
    pub node: NodeId,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node: NodeId, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            sequence,
            node,
        }
    }
}
