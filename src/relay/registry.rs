//! Connection registry: tracks each live connection and its current room.

use std::collections::HashMap;

use super::{ConnectionId, RoomId};

/// Advisory identity bound to a connection. Supplied by the client on its
/// first send and never verified by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub display_name: String,
}

/// One live transport-level session.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// `None` until the first `send_message` from this connection.
    pub identity: Option<Identity>,
    /// The single room this connection currently occupies, if any.
    pub room: Option<RoomId>,
}

/// Map of connection id to connection record. Leaf store with no
/// dependencies; the relay core keeps it consistent with the room
/// directory and presence tracker.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record for a new transport connection with no room.
    /// Duplicate ids are a programming error; the transport layer
    /// guarantees uniqueness.
    pub fn register(&mut self, id: ConnectionId) -> &mut Connection {
        self.connections.entry(id).or_insert(Connection {
            id,
            identity: None,
            room: None,
        })
    }

    /// Remove a connection record, returning it so the caller can clean
    /// up room and presence state. Unregistering an unknown id is a
    /// no-op, guarding against duplicate disconnect signals.
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Lookup. "Not found" is a normal outcome: an event can arrive after
    /// its connection's disconnect raced ahead of it.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
