//! The protocol state machine.
//!
//! Per-connection lifecycle: `DISCONNECTED -> CONNECTED_NO_ROOM ->
//! IN_ROOM`, modeled as registry presence plus `Connection.room`. All
//! mutation goes through [`Relay`]; the transport binding only
//! translates frames and delivers fan-out.
//!
//! The relay never errors back at a client. Malformed, stale, or
//! out-of-order events degrade to silent no-ops: over an async transport
//! "message arrived before the join finished" is a normal occurrence,
//! not a bug.

use serde::Serialize;
use uuid::Uuid;

use crate::common::time::{Clock, SystemClock};
use crate::protocol::{ClientEvent, MessagePayload, ServerEvent};

use super::{
    Audience, ConnectionId, ConnectionRegistry, Identity, Outbound, PresenceTracker,
    RoomDirectory, RoomId,
};

/// The relay core: owns the three state stores exclusively and turns
/// inbound events into outbound instructions. Construct one per process
/// (or per test) and serialize access to it.
pub struct Relay {
    registry: ConnectionRegistry,
    rooms: RoomDirectory,
    presence: PresenceTracker,
    clock: Box<dyn Clock>,
}

impl Relay {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomDirectory::new(),
            presence: PresenceTracker::new(),
            clock: Box::new(clock),
        }
    }

    /// Transport-level connect: register the connection with no room.
    pub fn connect(&mut self, id: ConnectionId) {
        self.registry.register(id);
        tracing::debug!("connection '{}' registered", id);
    }

    /// Transport-level disconnect, from any state. Unconditional full
    /// cleanup: typing flag, room membership, registry entry. Skipping
    /// this leaks dead connections into member sets for the lifetime of
    /// the process.
    pub fn disconnect(&mut self, id: ConnectionId) {
        let Some(connection) = self.registry.unregister(id) else {
            // Duplicate disconnect signal; already cleaned up.
            return;
        };
        self.presence.clear_all_for(id, connection.room.as_ref());
        if let Some(room) = connection.room {
            self.rooms.remove(&room, id);
            tracing::debug!("connection '{}' implicitly left room '{}'", id, room);
        }
        tracing::debug!("connection '{}' unregistered", id);
    }

    /// Process one inbound event to completion. Callers must not
    /// interleave this with other mutations on the same instance.
    pub fn handle(&mut self, sender: ConnectionId, event: ClientEvent) -> Vec<Outbound> {
        match event {
            ClientEvent::JoinRoom(room) => self.join(sender, RoomId::new(room)),
            ClientEvent::LeaveRoom(room) => self.leave(sender, RoomId::new(room)),
            ClientEvent::SendMessage(payload) => self.send_message(sender, payload),
            ClientEvent::Typing(room) => self.typing(sender, RoomId::new(room), true),
            ClientEvent::StopTyping(room) => self.typing(sender, RoomId::new(room), false),
        }
    }

    /// Join a room, leaving the previous one first. Ordering matters: a
    /// connection must never appear present or typing in two rooms at
    /// once. Membership changes are silent; peers discover new members
    /// only when those members send something.
    fn join(&mut self, sender: ConnectionId, room: RoomId) -> Vec<Outbound> {
        let Some(connection) = self.registry.get_mut(sender) else {
            // Disconnect raced ahead of this event.
            return Vec::new();
        };
        if connection.room.as_ref() == Some(&room) {
            return Vec::new();
        }
        let old_room = connection.room.replace(room.clone());
        if let Some(old_room) = old_room {
            self.presence.clear_typing(&old_room, sender);
            self.rooms.remove(&old_room, sender);
        }
        self.rooms.insert(&room, sender);
        tracing::debug!("connection '{}' joined room '{}'", sender, room);
        Vec::new()
    }

    /// Leave a room, only if it is actually the current one. A stale
    /// leave from a flaky client is a no-op.
    fn leave(&mut self, sender: ConnectionId, room: RoomId) -> Vec<Outbound> {
        let Some(connection) = self.registry.get_mut(sender) else {
            return Vec::new();
        };
        if connection.room.as_ref() != Some(&room) {
            return Vec::new();
        }
        connection.room = None;
        self.presence.clear_typing(&room, sender);
        self.rooms.remove(&room, sender);
        tracing::debug!("connection '{}' left room '{}'", sender, room);
        Vec::new()
    }

    /// Broadcast a message to the sender's current room, sender
    /// included, so every client shares one source of truth and dedupes
    /// by message id. The room is derived from live join state; the
    /// payload's `room` field is untrusted and overwritten.
    fn send_message(&mut self, sender: ConnectionId, mut payload: MessagePayload) -> Vec<Outbound> {
        if payload.text.trim().is_empty() {
            return Vec::new();
        }
        let Some(connection) = self.registry.get_mut(sender) else {
            return Vec::new();
        };
        let Some(room) = connection.room.clone() else {
            // Sent before any join finished; drop.
            return Vec::new();
        };
        connection.identity = Some(Identity {
            user_id: payload.sender_id.clone(),
            display_name: payload.sender_name.clone(),
        });

        payload.room = room.as_str().to_string();
        if payload.id.trim().is_empty() {
            payload.id = Uuid::new_v4().to_string();
        }
        if payload.timestamp == 0 {
            payload.timestamp = self.clock.now_millis();
        }

        let mut out = Vec::new();
        // Implicit stop-typing on send: peers see the indicator clear
        // before (or together with) the message itself.
        if self.presence.clear_typing(&room, sender) {
            out.push(Outbound {
                event: ServerEvent::StopTyping(sender.to_string()),
                audience: Audience::RoomExcept(room.clone(), sender),
            });
        }
        out.push(Outbound {
            event: ServerEvent::ReceiveMessage(payload),
            audience: Audience::Room(room),
        });
        out
    }

    /// Typing indicator set/clear. Only valid for the sender's current
    /// room; anything else is a stale event and drops.
    fn typing(&mut self, sender: ConnectionId, room: RoomId, started: bool) -> Vec<Outbound> {
        let Some(connection) = self.registry.get(sender) else {
            return Vec::new();
        };
        if connection.room.as_ref() != Some(&room) {
            return Vec::new();
        }
        let event = if started {
            self.presence.set_typing(&room, sender);
            ServerEvent::Typing(sender.to_string())
        } else {
            self.presence.clear_typing(&room, sender);
            ServerEvent::StopTyping(sender.to_string())
        };
        vec![Outbound {
            event,
            audience: Audience::RoomExcept(room, sender),
        }]
    }

    /// Resolve an audience to the concrete connection-id list at this
    /// instant. Must be called inside the same critical section as the
    /// `handle` call that produced the instruction.
    pub fn resolve(&self, audience: &Audience) -> Vec<ConnectionId> {
        match audience {
            Audience::Connection(id) => {
                if self.registry.get(*id).is_some() {
                    vec![*id]
                } else {
                    Vec::new()
                }
            }
            Audience::Room(room) => self.rooms.members_of(room),
            Audience::RoomExcept(room, exclude) => self.rooms.members_excluding(room, *exclude),
        }
    }

    /// The room a connection currently occupies, if any.
    pub fn current_room(&self, id: ConnectionId) -> Option<&RoomId> {
        self.registry.get(id).and_then(|c| c.room.as_ref())
    }

    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.registry.get(id).is_some()
    }

    pub fn is_typing(&self, room: &RoomId, id: ConnectionId) -> bool {
        self.presence.is_typing(room, id)
    }

    /// Point-in-time view of connections, rooms, and typing sets.
    pub fn snapshot(&self) -> RelaySnapshot {
        let rooms = self
            .rooms
            .iter()
            .map(|(room, members)| {
                let mut members: Vec<String> = members.iter().map(|id| id.to_string()).collect();
                members.sort();
                let mut typing: Vec<String> = self
                    .presence
                    .typing_in(room)
                    .iter()
                    .map(|id| id.to_string())
                    .collect();
                typing.sort();
                RoomSnapshot {
                    room: room.as_str().to_string(),
                    members,
                    typing,
                }
            })
            .collect();
        RelaySnapshot {
            connections: self.registry.len(),
            rooms,
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of the relay state, served by the debug endpoint.
#[derive(Debug, Serialize)]
pub struct RelaySnapshot {
    pub connections: usize,
    pub rooms: Vec<RoomSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct RoomSnapshot {
    pub room: String,
    pub members: Vec<String>,
    pub typing: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::time::FixedClock;

    fn payload(text: &str) -> MessagePayload {
        MessagePayload {
            id: "msg-1".to_string(),
            text: text.to_string(),
            sender_id: "user-1".to_string(),
            sender_name: "Alice".to_string(),
            timestamp: 1700000000000,
            room: "general".to_string(),
            role: None,
        }
    }

    fn connect_and_join(relay: &mut Relay, room: &str) -> ConnectionId {
        let id = ConnectionId::new();
        relay.connect(id);
        relay.handle(id, ClientEvent::JoinRoom(room.to_string()));
        id
    }

    #[test]
    fn test_message_reaches_whole_room_including_sender() {
        // given: A and B in "general"
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let b = connect_and_join(&mut relay, "general");

        // when: A sends "hi"
        let out = relay.handle(a, ClientEvent::SendMessage(payload("hi")));

        // then: one receive_message addressed to the whole room
        assert_eq!(out.len(), 1);
        let ServerEvent::ReceiveMessage(msg) = &out[0].event else {
            panic!("expected receive_message");
        };
        assert_eq!(msg.text, "hi");
        assert_eq!(out[0].audience, Audience::Room(RoomId::from("general")));

        let targets = relay.resolve(&out[0].audience);
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&a));
        assert!(targets.contains(&b));
    }

    #[test]
    fn test_room_switch_is_leave_then_join() {
        // given: A joins "general"
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");

        // when: A joins "rust" without leaving first
        let out = relay.handle(a, ClientEvent::JoinRoom("rust".to_string()));

        // then: membership moved, silently
        assert!(out.is_empty());
        assert_eq!(relay.current_room(a), Some(&RoomId::from("rust")));
        assert!(relay.resolve(&Audience::Room(RoomId::from("general"))).is_empty());
        assert_eq!(relay.resolve(&Audience::Room(RoomId::from("rust"))), vec![a]);
    }

    #[test]
    fn test_send_implies_stop_typing_before_message() {
        // given: A and B in "general", A typing
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let b = connect_and_join(&mut relay, "general");

        let typing_out = relay.handle(a, ClientEvent::Typing("general".to_string()));
        assert_eq!(typing_out.len(), 1);
        assert_eq!(typing_out[0].event, ServerEvent::Typing(a.to_string()));
        let typing_targets = relay.resolve(&typing_out[0].audience);
        assert_eq!(typing_targets, vec![b]);

        // when: A sends a message
        let out = relay.handle(a, ClientEvent::SendMessage(payload("done typing")));

        // then: stop_typing for A's id precedes the message, and goes to
        // the room minus A
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].event, ServerEvent::StopTyping(a.to_string()));
        assert_eq!(
            out[0].audience,
            Audience::RoomExcept(RoomId::from("general"), a)
        );
        assert!(matches!(out[1].event, ServerEvent::ReceiveMessage(_)));
        assert!(!relay.is_typing(&RoomId::from("general"), a));
    }

    #[test]
    fn test_disconnect_cleans_up_everything() {
        // given: A joins "general" and starts typing
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let b = connect_and_join(&mut relay, "general");
        relay.handle(a, ClientEvent::Typing("general".to_string()));

        // when: A disconnects
        relay.disconnect(a);

        // then: no trace of A anywhere
        assert!(!relay.is_connected(a));
        assert!(!relay.is_typing(&RoomId::from("general"), a));
        assert_eq!(relay.resolve(&Audience::Room(RoomId::from("general"))), vec![b]);

        // and B's next message fans out only to B
        let out = relay.handle(b, ClientEvent::SendMessage(payload("anyone here?")));
        assert_eq!(relay.resolve(&out[0].audience), vec![b]);
    }

    #[test]
    fn test_duplicate_disconnect_is_noop() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        relay.disconnect(a);

        // when: the transport reports disconnect twice
        relay.disconnect(a);

        // then:
        assert!(!relay.is_connected(a));
        assert_eq!(relay.snapshot().connections, 0);
    }

    #[test]
    fn test_join_same_room_is_idempotent() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        relay.handle(a, ClientEvent::Typing("general".to_string()));

        // when: A joins "general" again
        let out = relay.handle(a, ClientEvent::JoinRoom("general".to_string()));

        // then: no observable change; even the typing flag survives
        assert!(out.is_empty());
        assert_eq!(relay.current_room(a), Some(&RoomId::from("general")));
        assert!(relay.is_typing(&RoomId::from("general"), a));
    }

    #[test]
    fn test_leave_room_not_current_is_noop() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");

        // when: stale leave for a room A is not in
        let out = relay.handle(a, ClientEvent::LeaveRoom("rust".to_string()));

        // then:
        assert!(out.is_empty());
        assert_eq!(relay.current_room(a), Some(&RoomId::from("general")));
    }

    #[test]
    fn test_leave_current_room_returns_to_no_room() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        relay.handle(a, ClientEvent::Typing("general".to_string()));

        // when:
        let out = relay.handle(a, ClientEvent::LeaveRoom("general".to_string()));

        // then: no fan-out, membership and typing cleared, still connected
        assert!(out.is_empty());
        assert!(relay.is_connected(a));
        assert!(relay.current_room(a).is_none());
        assert!(!relay.is_typing(&RoomId::from("general"), a));
        assert!(relay.resolve(&Audience::Room(RoomId::from("general"))).is_empty());
    }

    #[test]
    fn test_send_before_join_is_dropped() {
        // given: connected but no room yet
        let mut relay = Relay::new();
        let a = ConnectionId::new();
        relay.connect(a);

        // when:
        let out = relay.handle(a, ClientEvent::SendMessage(payload("too early")));

        // then:
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_message_is_dropped() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");

        // when: whitespace-only text
        let out = relay.handle(a, ClientEvent::SendMessage(payload("   \t  ")));

        // then:
        assert!(out.is_empty());
    }

    #[test]
    fn test_event_from_unknown_connection_is_dropped() {
        // given: an id the registry has never seen (disconnect race)
        let mut relay = Relay::new();
        let ghost = ConnectionId::new();

        // when:
        let join = relay.handle(ghost, ClientEvent::JoinRoom("general".to_string()));
        let send = relay.handle(ghost, ClientEvent::SendMessage(payload("boo")));
        let typing = relay.handle(ghost, ClientEvent::Typing("general".to_string()));

        // then: all silently dropped, nothing joined
        assert!(join.is_empty());
        assert!(send.is_empty());
        assert!(typing.is_empty());
        assert!(relay.resolve(&Audience::Room(RoomId::from("general"))).is_empty());
    }

    #[test]
    fn test_room_is_derived_from_server_state_not_payload() {
        // given: A is in "general" but the payload claims "rust"
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let _lurker = connect_and_join(&mut relay, "rust");
        let mut lying = payload("redirect me");
        lying.room = "rust".to_string();

        // when:
        let out = relay.handle(a, ClientEvent::SendMessage(lying));

        // then: the message goes to "general" and is stamped as such
        assert_eq!(out.len(), 1);
        let ServerEvent::ReceiveMessage(msg) = &out[0].event else {
            panic!("expected receive_message");
        };
        assert_eq!(msg.room, "general");
        assert_eq!(out[0].audience, Audience::Room(RoomId::from("general")));
    }

    #[test]
    fn test_blank_id_and_timestamp_are_backfilled() {
        // given:
        let mut relay = Relay::with_clock(FixedClock::new(1234567890123));
        let a = connect_and_join(&mut relay, "general");
        let mut sparse = payload("hello");
        sparse.id = "".to_string();
        sparse.timestamp = 0;

        // when:
        let out = relay.handle(a, ClientEvent::SendMessage(sparse));

        // then:
        let ServerEvent::ReceiveMessage(msg) = &out[0].event else {
            panic!("expected receive_message");
        };
        assert!(!msg.id.is_empty());
        assert_eq!(msg.timestamp, 1234567890123);
    }

    #[test]
    fn test_send_records_advisory_identity() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");

        // when:
        relay.handle(a, ClientEvent::SendMessage(payload("hi")));

        // then: identity captured from the first send
        let out = relay.handle(a, ClientEvent::SendMessage(payload("again")));
        let ServerEvent::ReceiveMessage(msg) = &out[0].event else {
            panic!("expected receive_message");
        };
        assert_eq!(msg.sender_id, "user-1");
        assert_eq!(msg.sender_name, "Alice");
    }

    #[test]
    fn test_typing_for_wrong_room_is_dropped() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");

        // when: typing event for a room A is not in
        let out = relay.handle(a, ClientEvent::Typing("rust".to_string()));

        // then:
        assert!(out.is_empty());
        assert!(!relay.is_typing(&RoomId::from("rust"), a));
    }

    #[test]
    fn test_stop_typing_fans_out_to_room_minus_sender() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let b = connect_and_join(&mut relay, "general");
        relay.handle(a, ClientEvent::Typing("general".to_string()));

        // when:
        let out = relay.handle(a, ClientEvent::StopTyping("general".to_string()));

        // then:
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event, ServerEvent::StopTyping(a.to_string()));
        assert_eq!(relay.resolve(&out[0].audience), vec![b]);
    }

    #[test]
    fn test_room_switch_clears_typing_in_old_room() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        relay.handle(a, ClientEvent::Typing("general".to_string()));

        // when:
        relay.handle(a, ClientEvent::JoinRoom("rust".to_string()));

        // then: never present or typing in two rooms at once
        assert!(!relay.is_typing(&RoomId::from("general"), a));
        assert!(!relay.is_typing(&RoomId::from("rust"), a));
        assert!(relay.resolve(&Audience::Room(RoomId::from("general"))).is_empty());
    }

    #[test]
    fn test_audience_connection_resolves_only_live_connections() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let ghost = ConnectionId::new();

        // when / then:
        assert_eq!(relay.resolve(&Audience::Connection(a)), vec![a]);
        assert!(relay.resolve(&Audience::Connection(ghost)).is_empty());
    }

    #[test]
    fn test_snapshot_reflects_rooms_and_typing() {
        // given:
        let mut relay = Relay::new();
        let a = connect_and_join(&mut relay, "general");
        let _b = connect_and_join(&mut relay, "rust");
        relay.handle(a, ClientEvent::Typing("general".to_string()));

        // when:
        let snapshot = relay.snapshot();

        // then: rooms come out in name order
        assert_eq!(snapshot.connections, 2);
        assert_eq!(snapshot.rooms.len(), 2);
        assert_eq!(snapshot.rooms[0].room, "general");
        assert_eq!(snapshot.rooms[0].members.len(), 1);
        assert_eq!(snapshot.rooms[0].typing, vec![a.to_string()]);
        assert_eq!(snapshot.rooms[1].room, "rust");
        assert!(snapshot.rooms[1].typing.is_empty());
    }
}
