//! Chandy-Lamport snapshots over a line of nodes.
//!
//! Any node may initiate a snapshot; each initiator gets its own session, so
//! snapshots started by different nodes run concurrently. A node records
//! its own balance when it first sees a session (locally or through a
//! MARKER), keeps adjusting that record for effects arriving on channels
//! whose marker has not been seen yet, and reports the result to the
//! initiator with a STATE message once every channel is closed.
//!
//! # Session lifecycle
//!
//! ```text
//! ABSENT ──begin_local / first MARKER──▶ ACTIVE ──all channels empty──▶ (STATE sent, removed)
//!                                          │
//!                                          └──(initiator) all STATEs──▶ (completed, removed)
//! ```

mod config;
mod coordinator;
mod session;

pub use config::{DebitRecording, SnapshotConfig};
pub use coordinator::{SnapshotCoordinator, SnapshotOutput, SnapshotStats};
pub use session::SnapshotSession;
