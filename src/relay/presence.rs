//! Presence tracker: per-room sets of connections currently typing.

use std::collections::{BTreeMap, HashSet};

use super::{ConnectionId, RoomId};

/// Short-lived, derived state. A connection's typing flag exists only
/// within its current room's set; leaving or switching rooms clears it.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    typing: BTreeMap<RoomId, HashSet<ConnectionId>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection as typing in a room. Returns `false` if the flag
    /// was already set.
    pub fn set_typing(&mut self, room: &RoomId, id: ConnectionId) -> bool {
        self.typing.entry(room.clone()).or_default().insert(id)
    }

    /// Clear a connection's typing flag in a room. Returns `true` if the
    /// flag was actually set.
    pub fn clear_typing(&mut self, room: &RoomId, id: ConnectionId) -> bool {
        self.typing
            .get_mut(room)
            .map(|members| members.remove(&id))
            .unwrap_or(false)
    }

    /// Clear whatever typing flag the connection holds. A connection is
    /// only ever typing in its current room, so only that room needs
    /// checking.
    pub fn clear_all_for(&mut self, id: ConnectionId, current_room: Option<&RoomId>) {
        if let Some(room) = current_room {
            self.clear_typing(room, id);
        }
    }

    pub fn is_typing(&self, room: &RoomId, id: ConnectionId) -> bool {
        self.typing
            .get(room)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }

    /// Snapshot of who is typing in a room.
    pub fn typing_in(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.typing
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}
