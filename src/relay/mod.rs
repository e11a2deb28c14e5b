//! Relay core: the protocol state machine and its state stores.
//!
//! Everything in this module is pure in-memory state with no I/O. The
//! transport binding owns a single instance behind a mutex and feeds it
//! one inbound event at a time, so each event is processed as one
//! uninterrupted critical section.

mod core;
mod event;
mod presence;
mod registry;
mod rooms;

pub use self::core::{Relay, RelaySnapshot, RoomSnapshot};
pub use event::{Audience, Outbound};
pub use presence::PresenceTracker;
pub use registry::{Connection, ConnectionRegistry, Identity};
pub use rooms::RoomDirectory;

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Process-unique identifier for one live transport connection.
///
/// Assigned by the server at accept time; clients never choose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named channel key. Arbitrary names are accepted; rooms are created
/// implicitly on first join and never reclaimed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
