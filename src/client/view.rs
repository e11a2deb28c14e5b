//! Client-side view state: pure logic, no I/O.
//!
//! Tracks which message ids have already been rendered (the server
//! echoes a sender's own message back to it, and a user may run several
//! tabs or terminals with the same identity) and who is currently
//! typing in the active room.

use std::collections::{BTreeSet, HashSet};

/// Transient per-session display state.
#[derive(Debug, Default)]
pub struct ChatView {
    seen_ids: HashSet<String>,
    typing: BTreeSet<String>,
}

impl ChatView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message id. Returns `true` if the message is fresh and
    /// should be rendered, `false` for a duplicate.
    pub fn record_message(&mut self, id: &str) -> bool {
        self.seen_ids.insert(id.to_string())
    }

    /// A peer started typing. Returns `true` if this changes the typing
    /// line.
    pub fn typing_started(&mut self, who: &str) -> bool {
        self.typing.insert(who.to_string())
    }

    /// A peer stopped typing. Returns `true` if this changes the typing
    /// line.
    pub fn typing_stopped(&mut self, who: &str) -> bool {
        self.typing.remove(who)
    }

    /// Switching rooms clears everything room-scoped. The dedupe set
    /// stays: a message id is unique across rooms, and the echo of a
    /// message sent just before the switch can still arrive after it.
    pub fn reset_room(&mut self) {
        self.typing.clear();
    }
}
