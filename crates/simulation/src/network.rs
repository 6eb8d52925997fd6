//! Simulated line network with deterministic latency and packet loss.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use snapline_types::{Direction, NodeId};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of nodes in the line.
    pub node_count: u32,
    /// Base one-hop latency.
    pub link_latency: Duration,
    /// Jitter as a fraction of base latency (0.0 - 1.0).
    pub jitter_fraction: f64,
    /// Packet loss rate (0.0 - 1.0). Messages are dropped with this probability.
    ///
    /// Nothing retransmits, so a lost MARKER or STATE stalls that snapshot.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_count: 3,
            link_latency: Duration::from_millis(5),
            jitter_fraction: 0.5,
            packet_loss_rate: 0.0,
        }
    }
}

/// Simulated physical links between adjacent nodes.
///
/// Latency is sampled per message, but a message never overtakes an earlier
/// one on the same link: each link remembers its last delivery time.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    last_delivery: HashMap<(NodeId, Direction), Duration>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            last_delivery: HashMap::new(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Check if a packet should be dropped based on the configured loss rate.
    pub fn should_drop_packet(&self, rng: &mut ChaCha8Rng) -> bool {
        self.config.packet_loss_rate > 0.0 && rng.gen::<f64>() < self.config.packet_loss_rate
    }

    /// Set the packet loss rate (0.0 - 1.0).
    pub fn set_packet_loss_rate(&mut self, rate: f64) {
        self.config.packet_loss_rate = rate.clamp(0.0, 1.0);
    }

    /// Sample one-hop latency.
    pub fn sample_latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.link_latency.as_secs_f64();
        let jitter_range = base * self.config.jitter_fraction;
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };
        Duration::from_secs_f64((base + jitter).max(0.0001))
    }

    /// Delivery time for a message leaving `from` on `direction` at `now`.
    pub fn delivery_time(
        &mut self,
        from: NodeId,
        direction: Direction,
        now: Duration,
        rng: &mut ChaCha8Rng,
    ) -> Duration {
        let sampled = now + self.sample_latency(rng);
        let last = self.last_delivery.entry((from, direction)).or_default();
        let time = sampled.max(*last);
        *last = time;
        time
    }
}
