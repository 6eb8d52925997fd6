//! Production runner with async I/O.
//!
//! Wraps the deterministic node state machine with real I/O:
//!
//! - Peer messages as newline-delimited JSON over TCP to the line neighbors
//! - The transfer timer as a tokio deadline polled by the runner
//! - Snapshot requests over an HTTP control interface
//!
//! # Architecture
//!
//! A single task owns the state machine and receives events via mpsc
//! channels. Nothing else touches the balance or the snapshot sessions, so
//! no locks are needed around them.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Production Node                       │
//! │                                                              │
//! │  ProductionRunner                                            │
//! │    └─ loop { event = select(shutdown, timer, control, peer); │
//! │              actions = state.handle(event); execute(actions) }│
//! │                    ▲                │                        │
//! │   ┌────────────────┼────────────────┼──────────────┐         │
//! │   │                │                ▼              │         │
//! │  ControlServer   TransferTimer  LineAdapter (prev / next)    │
//! │  (axum)          (tokio Sleep)  (TCP reader/writer tasks)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod control;
pub mod metrics;
pub mod network;
mod runner;
pub mod telemetry;
mod timers;

pub use config::{ConfigError, NodeFileConfig, ValidatedConfig};
pub use runner::{
    ControlHandle, ControlMessage, ProductionRunner, ProductionRunnerBuilder, RunnerError,
    ShutdownHandle,
};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
pub use timers::TransferTimer;
