//! HTTP API layer

mod handlers;
mod routes;
mod sse;

pub use routes::build_router;

use std::sync::Arc;

use crate::stream::FanOutBridge;
use crate::workflow::WorkflowService;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<WorkflowService>,
    pub bridge: Arc<FanOutBridge>,
    pub prometheus_enabled: bool,
}

impl AppState {
    pub fn new(
        workflow: Arc<WorkflowService>,
        bridge: Arc<FanOutBridge>,
        prometheus_enabled: bool,
    ) -> Self {
        Self {
            workflow,
            bridge,
            prometheus_enabled,
        }
    }
}
