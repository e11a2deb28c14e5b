//! Wire protocol: tagged JSON event envelopes.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`.
//! Event names are snake_case; message payload fields are camelCase to
//! match the browser clients this relay grew up with.

use serde::{Deserialize, Serialize};

/// Channels shown by client UIs. Advisory only: the relay accepts
/// arbitrary room names, but these are the ones surfaced anywhere.
pub const CHANNELS: [&str; 5] = ["global", "frontend", "backend", "ai-ml", "rust"];

/// Room clients land in when they connect without picking one.
pub const DEFAULT_ROOM: &str = "global";

/// A chat message as it travels on the wire.
///
/// `id` and `timestamp` are client-generated; the server backfills them
/// when blank or zero. `room` is overwritten server-side with the
/// sender's actual room before fan-out, so a client cannot redirect a
/// message into a room it never joined. `role` is a display-only tag
/// carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Inbound events, client to server. Unknown event names fail to parse
/// and are ignored by the transport binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a room, implicitly leaving the previous one.
    JoinRoom(String),
    /// Leave a room, if it is the current one.
    LeaveRoom(String),
    /// Broadcast a message to the sender's current room.
    SendMessage(MessagePayload),
    /// Typing indicator for a room.
    Typing(String),
    /// Clear the typing indicator for a room.
    StopTyping(String),
}

/// Outbound events, server to client. Typing events carry only the
/// sender's connection id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage(MessagePayload),
    Typing(String),
    StopTyping(String),
}
