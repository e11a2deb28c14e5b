//! Transport binding: axum WebSocket server for the relay.

mod handler;
mod pusher;
mod runner;
mod signal;
mod state;

pub use pusher::{MessagePushError, MessagePusher, PusherChannel, WebSocketMessagePusher};
pub use runner::{app, run_server};
pub use state::AppState;
