//! Shared application state.

use std::sync::Arc;

use crate::domain::ExecutionGateway;
use crate::infrastructure::SessionHub;

/// Shared application state, handed to every handler by axum.
pub struct AppState {
    /// Single authority for room state and broadcast fan-out
    pub hub: Arc<SessionHub>,
    /// Gateway to the external execution provider
    pub execution: Arc<dyn ExecutionGateway>,
}
