//! Node configuration file.
//!
//! Example TOML:
//!
//! ```toml
//! [node]
//! id = 1
//! count = 3
//! initial_balance = 5000000   # optional
//! seed = 42                   # optional; random when absent
//!
//! [network]
//! listen_addr = "0.0.0.0:5555"
//! next_addr = "node2:5555"    # prev_addr is required iff id > 1, next_addr iff id < count
//!
//! [control]
//! listen_addr = "127.0.0.1:55512"
//!
//! [transfers]
//! min_amount = 10000
//! max_amount = 50000
//! min_delay_ms = 20
//! max_delay_ms = 2000
//!
//! [snapshot]
//! debit_recording = "skip"    # or "record"
//! ```
//!
//! Everything is checked by [`NodeFileConfig::validate`] before the runner
//! is built.

use crate::control::ControlServerConfig;
use crate::network::{NetworkConfig, DEFAULT_MAX_FRAME_SIZE};
use serde::Deserialize;
use snapline_ledger::{LedgerConfig, LedgerConfigError};
use snapline_node::NodeConfig;
use snapline_snapshot::{DebitRecording, SnapshotConfig};
use snapline_types::{Balance, Direction, LineTopology, NodeId, TopologyError};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("Invalid transfer settings: {0}")]
    Ledger(#[from] LedgerConfigError),

    #[error("Invalid {field} {value:?}: expected host:port")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Node {node} has a {direction} neighbor but no {direction}_addr")]
    MissingNeighbor { node: NodeId, direction: Direction },

    #[error("Node {node} has no {direction} neighbor but {direction}_addr is set")]
    UnexpectedNeighbor { node: NodeId, direction: Direction },

    #[error("max_frame_size must be positive")]
    InvalidFrameSize,
}

/// Top-level node configuration as read from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeFileConfig {
    pub node: NodeSection,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub control: ControlSection,

    #[serde(default)]
    pub transfers: TransfersSection,

    #[serde(default)]
    pub snapshot: SnapshotSection,
}

/// Node identity and position in the line.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// This node's id (`1..=count`).
    pub id: u32,

    /// Number of nodes in the line.
    pub count: u32,

    #[serde(default = "default_initial_balance")]
    pub initial_balance: Balance,

    /// Seed for random transfers. Drawn at startup when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_initial_balance() -> Balance {
    LedgerConfig::default().initial_balance
}

/// Peer network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub prev_addr: Option<String>,

    #[serde(default)]
    pub next_addr: Option<String>,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            prev_addr: None,
            next_addr: None,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:5555".to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    500
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

/// Control server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlSection {
    #[serde(default = "default_control_addr")]
    pub listen_addr: String,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            listen_addr: default_control_addr(),
        }
    }
}

fn default_control_addr() -> String {
    "127.0.0.1:55512".to_string()
}

/// Random transfer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TransfersSection {
    #[serde(default = "default_min_amount")]
    pub min_amount: Balance,

    #[serde(default = "default_max_amount")]
    pub max_amount: Balance,

    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for TransfersSection {
    fn default() -> Self {
        Self {
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_min_amount() -> Balance {
    10_000
}

fn default_max_amount() -> Balance {
    50_000
}

fn default_min_delay_ms() -> u64 {
    20
}

fn default_max_delay_ms() -> u64 {
    2000
}

/// Snapshot settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotSection {
    /// `"skip"` or `"record"`; see [`DebitRecording`].
    #[serde(default)]
    pub debit_recording: DebitRecording,
}

/// A configuration that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub topology: LineTopology,
    pub node: NodeConfig,
    pub network: NetworkConfig,
    pub control: ControlServerConfig,
}

impl NodeFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Check every setting and build the typed configuration.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let topology = LineTopology::new(NodeId(self.node.id), self.node.count)?;

        let ledger = LedgerConfig::default()
            .with_initial_balance(self.node.initial_balance)
            .with_amount_range(self.transfers.min_amount, self.transfers.max_amount)
            .with_transfer_delay(
                Duration::from_millis(self.transfers.min_delay_ms),
                Duration::from_millis(self.transfers.max_delay_ms),
            );
        ledger.validate()?;

        let node = NodeConfig::default()
            .with_ledger(ledger)
            .with_snapshot(
                SnapshotConfig::default().with_debit_recording(self.snapshot.debit_recording),
            )
            .with_seed(self.node.seed.unwrap_or_else(rand::random));

        if self.network.max_frame_size == 0 {
            return Err(ConfigError::InvalidFrameSize);
        }
        let mut network = NetworkConfig::default()
            .with_listen_addr(parse_addr("network.listen_addr", &self.network.listen_addr)?)
            .with_reconnect_interval(Duration::from_millis(self.network.reconnect_interval_ms))
            .with_max_frame_size(self.network.max_frame_size);
        for direction in [Direction::Prev, Direction::Next] {
            let addr = match direction {
                Direction::Prev => &self.network.prev_addr,
                Direction::Next => &self.network.next_addr,
            };
            match (topology.has_link(direction), addr) {
                (true, Some(addr)) => {
                    check_host_port(direction, addr)?;
                    network = match direction {
                        Direction::Prev => network.with_prev_addr(addr.clone()),
                        Direction::Next => network.with_next_addr(addr.clone()),
                    };
                }
                (true, None) => {
                    return Err(ConfigError::MissingNeighbor {
                        node: topology.local(),
                        direction,
                    })
                }
                (false, Some(_)) => {
                    return Err(ConfigError::UnexpectedNeighbor {
                        node: topology.local(),
                        direction,
                    })
                }
                (false, None) => {}
            }
        }

        let control = ControlServerConfig {
            listen_addr: parse_addr("control.listen_addr", &self.control.listen_addr)?,
        };

        Ok(ValidatedConfig {
            topology,
            node,
            network,
            control,
        })
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// Neighbor addresses may be host names, so only the `host:port` shape is
/// checked here; resolution happens when dialing.
fn check_host_port(direction: Direction, value: &str) -> Result<(), ConfigError> {
    let field = match direction {
        Direction::Prev => "network.prev_addr",
        Direction::Next => "network.next_addr",
    };
    let valid = match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        })
    }
}
