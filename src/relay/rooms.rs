//! Room directory: maps room ids to the connections currently joined.

use std::collections::{BTreeMap, HashSet};

use super::{ConnectionId, RoomId};

/// Member sets per room. Rooms are created implicitly on first insert
/// and never reclaimed; an empty room is simply an empty set. The relay
/// core keeps these sets consistent with `Connection.room`.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: BTreeMap<RoomId, HashSet<ConnectionId>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room's member set. Returns `false` if it was
    /// already a member.
    pub fn insert(&mut self, room: &RoomId, id: ConnectionId) -> bool {
        self.rooms.entry(room.clone()).or_default().insert(id)
    }

    /// Remove a connection from a room's member set. Returns `false` if
    /// it was not a member.
    pub fn remove(&mut self, room: &RoomId, id: ConnectionId) -> bool {
        self.rooms
            .get_mut(room)
            .map(|members| members.remove(&id))
            .unwrap_or(false)
    }

    pub fn contains(&self, room: &RoomId, id: ConnectionId) -> bool {
        self.rooms
            .get(room)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }

    /// Snapshot of the current member set. Membership can change on every
    /// incoming event, so callers must not hold onto this past the
    /// current processing step.
    pub fn members_of(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the member set minus one connection, for
    /// broadcast-to-room-but-not-self fan-out.
    pub fn members_excluding(&self, room: &RoomId, exclude: ConnectionId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().filter(|id| *id != exclude).collect())
            .unwrap_or_default()
    }

    /// All known rooms with their member sets, in room-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &HashSet<ConnectionId>)> {
        self.rooms.iter()
    }
}
