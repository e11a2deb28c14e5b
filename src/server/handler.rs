//! WebSocket connection handlers and HTTP endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    protocol::ClientEvent,
    relay::{ConnectionId, RelaySnapshot},
};

use super::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // The connection id is server-assigned; clients never pick it.
    let connection_id = ConnectionId::new();
    ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, connection_id: ConnectionId) {
    let (mut sender, mut receiver) = socket.split();

    // Channel for frames addressed to this client.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.pusher.register(connection_id, tx).await;
    {
        let mut relay = state.relay.lock().await;
        relay.connect(connection_id);
    }
    tracing::info!("connection '{}' accepted", connection_id);

    let state_for_recv = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!("websocket error on '{}': {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let event = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            // Unknown event names and malformed frames
                            // are ignored, never errored back.
                            tracing::debug!(
                                "ignoring unrecognized frame from '{}': {}",
                                connection_id,
                                e
                            );
                            continue;
                        }
                    };
                    dispatch_event(&state_for_recv, connection_id, event).await;
                }
                Message::Close(_) => {
                    tracing::info!("connection '{}' requested close", connection_id);
                    break;
                }
                Message::Ping(_) => {
                    // Ping/pong is handled by the WebSocket protocol layer.
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // If either side finishes, tear down the other.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Single cleanup path: whatever combination of close, error, and
    // timeout ended the tasks, the relay sees exactly one disconnect.
    {
        let mut relay = state.relay.lock().await;
        relay.disconnect(connection_id);
    }
    state.pusher.unregister(connection_id).await;
    tracing::info!("connection '{}' disconnected and cleaned up", connection_id);
}

/// Process one inbound event: mutate relay state and resolve audiences
/// inside a single lock acquisition, then deliver after release.
async fn dispatch_event(state: &Arc<AppState>, connection_id: ConnectionId, event: ClientEvent) {
    let deliveries: Vec<(Vec<ConnectionId>, String)> = {
        let mut relay = state.relay.lock().await;
        let outbounds = relay.handle(connection_id, event);
        outbounds
            .into_iter()
            .filter_map(|outbound| {
                let targets = relay.resolve(&outbound.audience);
                if targets.is_empty() {
                    return None;
                }
                match serde_json::to_string(&outbound.event) {
                    Ok(json) => Some((targets, json)),
                    Err(e) => {
                        tracing::error!("failed to serialize outbound event: {}", e);
                        None
                    }
                }
            })
            .collect()
    };

    for (targets, json) in deliveries {
        if let Err(e) = state.pusher.broadcast(targets, &json).await {
            tracing::warn!("broadcast failed: {}", e);
        }
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Debug endpoint: current rooms, members, and typing sets.
pub async fn debug_rooms(State(state): State<Arc<AppState>>) -> Json<RelaySnapshot> {
    let relay = state.relay.lock().await;
    Json(relay.snapshot())
}
