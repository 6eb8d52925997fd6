//! Node state machine.
//!
//! Composes the account ledger, the snapshot coordinator and the hop-by-hop
//! router into a single [`StateMachine`](snapline_core::StateMachine) that
//! both the production and simulation runners drive.

mod router;
mod state;

pub use router::Router;
pub use state::{NodeConfig, NodeStateMachine, NodeStats};
