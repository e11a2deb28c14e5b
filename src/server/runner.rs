//! Server construction and execution.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::relay::Relay;

use super::{
    handler::{debug_rooms, health_check, websocket_handler},
    pusher::WebSocketMessagePusher,
    signal::shutdown_signal,
    state::AppState,
};

/// Build the router. The `/ws` path is reserved for the relay; the HTTP
/// routes never intercept it.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/debug/rooms", get(debug_rooms))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay server.
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8080)
///
/// # Errors
///
/// Returns an error if the listener cannot bind; there is no degraded
/// mode without a transport, so callers should abort on it.
pub async fn run_server(host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState {
        relay: Mutex::new(Relay::new()),
        pusher: Arc::new(WebSocketMessagePusher::new()),
    });

    let app = app(state);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("chat relay listening on {}", listener.local_addr()?);
    tracing::info!("Connect to: ws://{}/ws", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
