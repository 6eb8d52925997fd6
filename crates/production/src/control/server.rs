//! Control server implementation.

use super::routes::create_router;
use super::state::ControlState;
use crate::runner::ControlHandle;
use snapline_types::NodeId;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors from the control server.
#[derive(Debug, Error)]
pub enum ControlServerError {
    #[error("Failed to bind to address {addr}: {source}")]
    BindError {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Configuration for the control server.
#[derive(Debug, Clone)]
pub struct ControlServerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 55512)),
        }
    }
}

/// Handle for controlling a running control server.
pub struct ControlServerHandle {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ControlServerHandle {
    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Abort the server.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the server to finish.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// HTTP server in front of a runner's control channel.
pub struct ControlServer {
    config: ControlServerConfig,
    state: ControlState,
}

impl ControlServer {
    pub fn new(config: ControlServerConfig, node: NodeId, control: ControlHandle) -> Self {
        Self {
            config,
            state: ControlState::new(node, control),
        }
    }

    /// Start the server and return a handle for control.
    pub async fn start(self) -> Result<ControlServerHandle, ControlServerError> {
        let addr = self.config.listen_addr;
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ControlServerError::BindError { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ControlServerError::BindError { addr, source })?;
        info!(addr = %local_addr, "Control server listening");

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = ?e, "Control server error");
            }
        });

        Ok(ControlServerHandle { task, local_addr })
    }
}
