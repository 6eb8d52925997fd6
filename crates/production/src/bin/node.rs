//! Snapline Node
//!
//! Runs one accounting node of a snapline line.
//!
//! # Usage
//!
//! ```bash
//! # Start with configuration file
//! snapline-node --config node1.toml
//!
//! # Override position and addresses
//! snapline-node --config node.toml --id 2 --count 3 \
//!     --prev-addr node1:5555 --next-addr node3:5555
//! ```
//!
//! See `snapline_production::config` for the file format.

use anyhow::{Context, Result};
use clap::Parser;
use snapline_production::control::ControlServer;
use snapline_production::{init_telemetry, NodeFileConfig, ProductionRunner, TelemetryConfig};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Snapline Node
///
/// Moves money between line neighbors and answers snapshot requests.
#[derive(Parser, Debug)]
#[command(name = "snapline-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Node id (overrides config)
    #[arg(long)]
    id: Option<u32>,

    /// Number of nodes in the line (overrides config)
    #[arg(long)]
    count: Option<u32>,

    /// Peer listen address (overrides config)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Address of the previous node (overrides config)
    #[arg(long)]
    prev_addr: Option<String>,

    /// Address of the next node (overrides config)
    #[arg(long)]
    next_addr: Option<String>,

    /// Control server listen address (overrides config)
    #[arg(long)]
    control_addr: Option<String>,

    /// Seed for random transfers (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Log level filter (overrides RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Apply CLI overrides to the configuration.
fn apply_overrides(config: &mut NodeFileConfig, cli: &Cli) {
    if let Some(id) = cli.id {
        config.node.id = id;
    }
    if let Some(count) = cli.count {
        config.node.count = count;
    }
    if let Some(seed) = cli.seed {
        config.node.seed = Some(seed);
    }
    if let Some(ref addr) = cli.listen_addr {
        config.network.listen_addr = addr.clone();
    }
    if let Some(ref addr) = cli.prev_addr {
        config.network.prev_addr = Some(addr.clone());
    }
    if let Some(ref addr) = cli.next_addr {
        config.network.next_addr = Some(addr.clone());
    }
    if let Some(ref addr) = cli.control_addr {
        config.control.listen_addr = addr.clone();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig::default().with_log_level(&cli.log_level))
        .context("Failed to initialize logging")?;

    info!("Snapline node starting...");

    // Load configuration
    let mut config = NodeFileConfig::load(&cli.config)?;
    apply_overrides(&mut config, &cli);
    let config = config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;

    info!(
        node = %config.topology.local(),
        node_count = config.topology.node_count(),
        initial_balance = config.node.ledger.initial_balance,
        seed = config.node.seed,
        debit_recording = ?config.node.snapshot.debit_recording,
        "Node configuration loaded"
    );

    let mut runner = ProductionRunner::builder()
        .topology(config.topology)
        .network(config.network)
        .node_config(config.node)
        .build()
        .await
        .context("Failed to start production runner")?;

    let control_server = ControlServer::new(
        config.control,
        config.topology.local(),
        runner.control_handle(),
    )
    .start()
    .await
    .context("Failed to start control server")?;

    let shutdown = runner
        .shutdown_handle()
        .context("Shutdown handle already taken")?;
    let mut runner_task = tokio::spawn(runner.run());

    info!(
        control_addr = %control_server.local_addr(),
        "Node running. Press Ctrl+C to stop."
    );

    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = sigterm.recv();
    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        result = &mut runner_task => {
            control_server.abort();
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(anyhow::Error::from(e).context("Production runner failed")),
                Err(e) => Err(anyhow::Error::from(e).context("Production runner task panicked")),
            };
        }
    }

    shutdown.shutdown();
    match runner_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Runner exited with error"),
        Err(e) => error!(error = %e, "Runner task failed"),
    }
    control_server.abort();

    info!("Node stopped");
    Ok(())
}
