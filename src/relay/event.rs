//! Outbound instructions emitted by the relay core.

use crate::protocol::ServerEvent;

use super::{ConnectionId, RoomId};

/// Who an outbound event is addressed to. The transport binding resolves
/// these against the live member sets at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// One specific connection.
    Connection(ConnectionId),
    /// Every current member of a room, sender included.
    Room(RoomId),
    /// Every current member of a room except one connection.
    RoomExcept(RoomId, ConnectionId),
}

/// One outbound event plus its target audience. The relay core emits
/// zero or more of these per inbound event; it never talks to the
/// network itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub event: ServerEvent,
    pub audience: Audience,
}
