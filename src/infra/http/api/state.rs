use std::sync::Arc;

use crate::application::render::RenderOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RenderOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<RenderOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
