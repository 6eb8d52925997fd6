//! HTTP control interface for a node.
//!
//! # Endpoints
//!
//! - `POST /control` - run a command; `{"cmd":"snapshot"}` starts a snapshot
//!   at this node and answers with every node's balance once it converges
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus metrics in text format
//!
//! Control requests are served one at a time. A second request waits until
//! the first one has been answered.
//!
//! # Example
//!
//! ```no_run
//! use snapline_production::control::{ControlServer, ControlServerConfig};
//! use snapline_production::ControlHandle;
//! use snapline_types::NodeId;
//!
//! # async fn example(control: ControlHandle) -> anyhow::Result<()> {
//! let config = ControlServerConfig {
//!     listen_addr: "127.0.0.1:55512".parse()?,
//! };
//! let handle = ControlServer::new(config, NodeId(1), control).start().await?;
//! # handle.abort();
//! # Ok(())
//! # }
//! ```

mod handlers;
mod routes;
mod server;
mod state;
mod types;

pub use routes::create_router;
pub use server::{ControlServer, ControlServerConfig, ControlServerError, ControlServerHandle};
pub use state::ControlState;
pub use types::*;
