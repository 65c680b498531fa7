// Application state for HTTP handlers
use crate::application::orchestrator::{DashboardView, OrchestratorHandle};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<OrchestratorHandle>,
    pub view: DashboardView,
}
