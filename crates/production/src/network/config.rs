//! Network configuration types.

use crate::network::codec::DEFAULT_MAX_FRAME_SIZE;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the TCP line transport.
///
/// # Example
///
/// ```
/// use snapline_production::network::NetworkConfig;
/// use std::time::Duration;
///
/// let config = NetworkConfig::default()
///     .with_next_addr("127.0.0.1:5556".to_string())
///     .with_reconnect_interval(Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address the node accepts neighbor connections on.
    ///
    /// Default: `0.0.0.0:5555`
    pub listen_addr: SocketAddr,

    /// Address of the node with the next lower id (`host:port`).
    pub prev_addr: Option<String>,

    /// Address of the node with the next higher id (`host:port`).
    pub next_addr: Option<String>,

    /// Wait between dial attempts to a neighbor.
    ///
    /// Default: 500ms
    pub reconnect_interval: Duration,

    /// Maximum frame size in bytes.
    ///
    /// Default: 64KiB
    pub max_frame_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5555)),
            prev_addr: None,
            next_addr: None,
            reconnect_interval: Duration::from_millis(500),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl NetworkConfig {
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_prev_addr(mut self, addr: String) -> Self {
        self.prev_addr = Some(addr);
        self
    }

    pub fn with_next_addr(mut self, addr: String) -> Self {
        self.next_addr = Some(addr);
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Create config for local testing on the given port.
    pub fn for_testing(port: u16) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            prev_addr: None,
            next_addr: None,
            reconnect_interval: Duration::from_millis(50),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
