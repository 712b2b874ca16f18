//! Server execution logic.

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use super::{
    handler::{get_room_detail, get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Collaborative code room server.
///
/// Wraps the shared state and an optional static-asset directory (the
/// prebuilt editor bundle) and exposes the router both for `run` and for
/// in-process integration tests.
pub struct Server {
    state: Arc<AppState>,
    static_dir: Option<PathBuf>,
}

impl Server {
    pub fn new(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Self {
        Self { state, static_dir }
    }

    /// Build the axum router.
    ///
    /// When a static directory is configured, every non-API path falls back
    /// to it, with `index.html` served for unmatched routes (single-page app
    /// catch-all).
    pub fn router(&self) -> Router {
        let mut app = Router::new()
            // WebSocket endpoint
            .route("/ws", get(websocket_handler))
            // HTTP endpoints
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .with_state(self.state.clone());

        if let Some(dir) = &self.static_dir {
            let assets = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
            app = app.fallback_service(assets);
        }

        app.layer(TraceLayer::new_for_http())
    }

    /// Run the server until a shutdown signal arrives.
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address
    /// or if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "Collaborative code room server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
