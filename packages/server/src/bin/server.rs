//! Collaborative code room server.
//!
//! Hosts rooms in which participants edit a shared code buffer over
//! WebSocket and run it against a remote execution provider.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kobeya-server
//! cargo run --bin kobeya-server -- --host 0.0.0.0 --port 3000
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;

use kobeya_server::{
    infrastructure::{SessionHub, execution::piston},
    ui::{AppState, Server},
};
use kobeya_shared::{logger::setup_logger, time::get_jst_timestamp};

#[derive(Parser, Debug)]
#[command(name = "kobeya-server")]
#[command(about = "Collaborative code editing room server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Directory with the prebuilt editor assets; omit to run API-only
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Remote code execution endpoint
    #[arg(long, default_value = piston::DEFAULT_ENDPOINT)]
    execution_endpoint: String,

    /// Timeout for execution requests, in seconds
    #[arg(long, default_value = "30")]
    execution_timeout_secs: u64,

    /// Evict rooms that stayed empty this long, in seconds (0 disables)
    #[arg(long, default_value = "3600")]
    room_ttl_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. SessionHub (room state + broadcast routing)
    // 2. ExecutionGateway
    // 3. AppState
    // 4. Server

    let hub = Arc::new(SessionHub::new());

    let execution = match piston::PistonExecutionGateway::new(
        args.execution_endpoint.clone(),
        Duration::from_secs(args.execution_timeout_secs),
    ) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            tracing::error!("Failed to build execution client: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Execution endpoint: {}", args.execution_endpoint);

    let state = Arc::new(AppState {
        hub: hub.clone(),
        execution,
    });

    if args.room_ttl_secs > 0 {
        spawn_eviction_sweep(hub, args.room_ttl_secs);
    }

    let server = Server::new(state, args.static_dir);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Periodically drop rooms that have been empty longer than the TTL.
fn spawn_eviction_sweep(hub: Arc<SessionHub>, ttl_secs: u64) {
    let ttl_millis = (ttl_secs as i64) * 1000;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let evicted = hub.evict_idle(get_jst_timestamp(), ttl_millis).await;
            if evicted > 0 {
                tracing::info!("Evicted {} idle room(s)", evicted);
            }
        }
    });
}
