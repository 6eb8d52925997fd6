//! Production runner implementation.

use crate::metrics;
use crate::network::{LineAdapter, NetworkConfig, NetworkError};
use crate::timers::TransferTimer;
use snapline_core::{Action, Event, StateMachine, TimerId};
use snapline_messages::{ControlCommand, ControlReply, SnapshotReport};
use snapline_node::{NodeConfig, NodeStateMachine};
use snapline_types::{LineTopology, NodeId};
use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, span, warn, Level};

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Control channel closed")]
    ChannelClosed,
    #[error("Request dropped")]
    RequestDropped,
    #[error("Network error: {0}")]
    NetworkError(#[from] NetworkError),
}

/// Handle for shutting down a running ProductionRunner.
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A control command together with the channel its reply goes to.
#[derive(Debug)]
pub struct ControlMessage {
    pub command: ControlCommand,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Cloneable handle for sending control commands to a runner.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlMessage>,
}

impl ControlHandle {
    pub(crate) fn from_sender(tx: mpsc::Sender<ControlMessage>) -> Self {
        Self { tx }
    }

    /// Start a snapshot at this node and wait until it converges.
    ///
    /// There is no timeout: a lost MARKER or STATE leaves this pending until
    /// the runner shuts down.
    pub async fn snapshot(&self) -> Result<SnapshotReport, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlMessage {
                command: ControlCommand::Snapshot,
                reply,
            })
            .await
            .map_err(|_| RunnerError::ChannelClosed)?;
        let reply = rx.await.map_err(|_| RunnerError::RequestDropped)?;
        Ok(reply.snapshot)
    }
}

/// Builder for constructing a [`ProductionRunner`].
///
/// Required fields:
/// - `topology` - this node's position in the line
/// - `network` - listen and neighbor addresses
///
/// Optional fields:
/// - `node_config` - ledger, snapshot and seed settings (defaults)
/// - `channel_capacity` - peer and control channel capacity (defaults to 10,000)
///
/// # Example
///
/// ```no_run
/// use snapline_production::ProductionRunner;
/// use snapline_production::network::NetworkConfig;
/// use snapline_node::NodeConfig;
/// use snapline_types::{LineTopology, NodeId};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let topology = LineTopology::new(NodeId(1), 3)?;
/// let network = NetworkConfig::default().with_next_addr("node2:5555".to_string());
///
/// let runner = ProductionRunner::builder()
///     .topology(topology)
///     .network(network)
///     .node_config(NodeConfig::default().with_seed(42))
///     .build()
///     .await?;
/// let control = runner.control_handle();
/// tokio::spawn(runner.run());
///
/// let report = control.snapshot().await?;
/// println!("total = {}", report.total());
/// # Ok(())
/// # }
/// ```
pub struct ProductionRunnerBuilder {
    topology: Option<LineTopology>,
    network_config: Option<NetworkConfig>,
    node_config: NodeConfig,
    channel_capacity: usize,
}

impl Default for ProductionRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionRunnerBuilder {
    /// Create a new builder with default channel capacity.
    pub fn new() -> Self {
        Self {
            topology: None,
            network_config: None,
            node_config: NodeConfig::default(),
            channel_capacity: 10_000,
        }
    }

    pub fn topology(mut self, topology: LineTopology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn network(mut self, config: NetworkConfig) -> Self {
        self.network_config = Some(config);
        self
    }

    pub fn node_config(mut self, config: NodeConfig) -> Self {
        self.node_config = config;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Bind the peer listener and assemble the runner.
    pub async fn build(self) -> Result<ProductionRunner, RunnerError> {
        let topology = self.topology.ok_or(RunnerError::MissingField("topology"))?;
        let network_config = self
            .network_config
            .ok_or(RunnerError::MissingField("network"))?;

        let (peer_tx, peer_rx) = mpsc::channel(self.channel_capacity);
        let (control_tx, control_rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let adapter = LineAdapter::start(network_config, topology, peer_tx).await?;

        Ok(ProductionRunner {
            peer_rx,
            control_rx,
            control_tx,
            state: NodeStateMachine::new(topology, self.node_config),
            start_time: Instant::now(),
            transfer_timer: TransferTimer::new(),
            adapter,
            pending_replies: Vec::new(),
            shutdown_rx,
            shutdown_tx: Some(shutdown_tx),
        })
    }
}

/// Production runner with async I/O.
///
/// A single task owns the node state machine and multiplexes the transfer
/// timer, control and peer channels into it. Network tasks only move bytes.
pub struct ProductionRunner {
    /// Receives decoded peer messages from the network adapter.
    peer_rx: mpsc::Receiver<Event>,
    control_rx: mpsc::Receiver<ControlMessage>,
    control_tx: mpsc::Sender<ControlMessage>,
    /// The state machine (owned, not shared).
    state: NodeStateMachine,
    /// Start time for calculating elapsed duration.
    start_time: Instant,
    transfer_timer: TransferTimer,
    adapter: LineAdapter,
    /// Control requests waiting for the local snapshot to converge.
    pending_replies: Vec<oneshot::Sender<ControlReply>>,
    shutdown_rx: oneshot::Receiver<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ProductionRunner {
    /// Create a new builder for constructing a production runner.
    pub fn builder() -> ProductionRunnerBuilder {
        ProductionRunnerBuilder::new()
    }

    pub fn node_id(&self) -> NodeId {
        self.state.node_id()
    }

    /// Address the peer listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.adapter.local_addr()
    }

    /// Get a handle for sending control commands.
    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle::from_sender(self.control_tx.clone())
    }

    /// Take the shutdown handle.
    ///
    /// Returns a handle that when dropped triggers graceful shutdown.
    /// Can only be called once; subsequent calls return None.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    /// Run the main event loop until shutdown.
    ///
    /// Every event runs to completion before the next one is taken. The
    /// select is biased: shutdown first, then timers, control, and peers.
    /// Control requests still waiting at shutdown are dropped, which their
    /// callers see as [`RunnerError::RequestDropped`].
    pub async fn run(mut self) -> Result<(), RunnerError> {
        let topology = *self.state.topology();
        info!(
            node = %topology.local(),
            node_count = topology.node_count(),
            listen_addr = %self.adapter.local_addr(),
            balance = self.state.balance(),
            "Starting production runner"
        );
        metrics::set_balance(topology.local(), self.state.balance());

        let actions = self.state.initialize();
        self.process_actions(actions);

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                () = self.transfer_timer.fired() => {
                    let event = Event::TransferTimer;
                    let event_span = span!(
                        Level::DEBUG,
                        "handle_timer",
                        event.type = event.type_name(),
                        node = %topology.local(),
                    );
                    let _guard = event_span.enter();
                    self.dispatch_event(event);
                }

                Some(message) = self.control_rx.recv() => {
                    let event_span = span!(
                        Level::INFO,
                        "handle_control",
                        node = %topology.local(),
                    );
                    let _guard = event_span.enter();
                    self.dispatch_control(message);
                }

                event = self.peer_rx.recv() => {
                    let Some(event) = event else {
                        warn!("Peer channel closed");
                        break;
                    };
                    let event_span = span!(
                        Level::DEBUG,
                        "handle_event",
                        event.type = event.type_name(),
                        node = %topology.local(),
                    );
                    let _guard = event_span.enter();
                    self.dispatch_event(event);
                }
            }
        }

        self.transfer_timer.disarm();
        self.adapter.shutdown();
        if !self.pending_replies.is_empty() {
            warn!(
                pending = self.pending_replies.len(),
                "Dropping unanswered snapshot requests"
            );
        }
        info!(balance = self.state.balance(), "Production runner stopped");
        Ok(())
    }

    fn dispatch_control(&mut self, message: ControlMessage) {
        match message.command {
            ControlCommand::Snapshot => {
                self.pending_replies.push(message.reply);
                self.dispatch_event(Event::SnapshotRequested);
            }
        }
    }

    fn dispatch_event(&mut self, event: Event) {
        let before = self.state.stats();
        self.state.set_time(self.start_time.elapsed());

        let actions = self.state.handle(event);

        metrics::record_stats(&before, &self.state.stats());
        metrics::set_balance(self.state.node_id(), self.state.balance());
        self.process_actions(actions);
    }

    fn process_actions(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.process_action(action);
        }
    }

    fn process_action(&mut self, action: Action) {
        match action {
            Action::SendToPeer { direction, message } => {
                if let Err(e) = self.adapter.send(direction, &message) {
                    warn!(
                        error = %e,
                        %direction,
                        msg_type = message.type_name(),
                        "Failed to send message"
                    );
                }
            }

            Action::SetTimer {
                id: TimerId::Transfer,
                duration,
            } => {
                self.transfer_timer.arm(duration);
            }

            Action::SnapshotCompleted { report } => {
                info!(total = report.total(), nodes = report.nodes.len(), "Snapshot completed");
                if self.pending_replies.is_empty() {
                    debug!("No control request waiting for this snapshot");
                }
                for reply in self.pending_replies.drain(..) {
                    // The requester may have gone away; nothing to do then.
                    let _ = reply.send(ControlReply {
                        snapshot: report.clone(),
                    });
                }
            }
        }
    }
}
