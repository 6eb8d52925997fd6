//! Shared state for control handlers.

use crate::runner::ControlHandle;
use snapline_types::NodeId;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state for control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub node: NodeId,
    /// Channel into the runner.
    pub control: ControlHandle,
    /// Held for the whole of a control request, so the runner sees at most
    /// one outstanding request from this server.
    pub request_lock: Arc<Mutex<()>>,
}

impl ControlState {
    pub fn new(node: NodeId, control: ControlHandle) -> Self {
        Self {
            node,
            control,
            request_lock: Arc::new(Mutex::new(())),
        }
    }
}
