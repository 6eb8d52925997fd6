//! Deterministic simulation of a snapline line network.
//!
//! Drives N [`NodeStateMachine`](snapline_node::NodeStateMachine)s from a
//! single seeded event queue. Links are FIFO with configurable latency and
//! jitter, so every interleaving a real deployment could produce can be
//! replayed from its seed.

mod event_queue;
mod network;
mod runner;

pub use event_queue::EventKey;
pub use network::{NetworkConfig, SimulatedNetwork};
pub use runner::{CompletedSnapshot, SimulationRunner, SimulationStats};
