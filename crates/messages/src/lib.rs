//! Messages for the snapline protocol.
//!
//! Two families of messages:
//!
//! - [`PeerMessage`]: exchanged between nodes over the line (transfers,
//!   snapshot markers, recorded states)
//! - [`ControlRequest`] / [`ControlReply`]: exchanged between a node and a
//!   client asking it to run a snapshot

pub mod control;
pub mod peer;

pub use control::{ControlCommand, ControlReply, ControlRequest, SnapshotReport};
pub use peer::PeerMessage;
