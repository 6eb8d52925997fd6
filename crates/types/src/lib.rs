//! Core types for snapline nodes.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Identifiers**: [`NodeId`], [`Direction`]
//! - **Topology**: [`LineTopology`], the fixed line of N nodes known at startup
//! - **Per-node storage**: [`NodeMap`], a dense map indexed by node id
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod node_map;
mod topology;

pub use identifiers::{Direction, NodeId};
pub use node_map::NodeMap;
pub use topology::{LineTopology, TopologyError};

/// Account balance (and transfer amount) unit.
///
/// Signed so that negative amounts arriving off the wire can be represented
/// and rejected by validation instead of failing to decode.
pub type Balance = i64;
