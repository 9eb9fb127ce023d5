use std::sync::Arc;

use webapk_db::store::ConversionStore;
use webapk_pipeline::Orchestrator;
use webapk_worker::DispatchHandle;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Submission, deletion and the store every handler reads from.
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<ServerConfig>,
    /// Present when a dispatcher runs in this process.
    pub dispatcher: Option<DispatchHandle>,
}

impl AppState {
    pub fn store(&self) -> &dyn ConversionStore {
        self.orchestrator.store().as_ref()
    }

    /// Tell the dispatcher new work is queued. A standalone worker picks it
    /// up on its next poll instead.
    pub fn notify_queued(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.nudge();
        }
    }
}
