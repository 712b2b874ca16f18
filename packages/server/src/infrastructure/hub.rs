//! Session hub: room state and broadcast fan-out.
//!
//! The hub is the single authority for per-room state (participants, buffer,
//! language) and for delivery to the connections currently joined to a room.
//! Both live behind one `Mutex` on purpose: every operation mutates and fans
//! out under a single lock acquisition, so a concurrent join and code change
//! on the same room can never interleave between a mutation and its
//! broadcast. A joiner therefore always receives the room's current buffer
//! before any later edit it also receives.
//!
//! Delivery is best-effort, at-most-once per connected member, over the
//! per-connection unbounded sender channels. Sends never block, so holding
//! the lock across fan-out does not suspend.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::domain::{ConnectionId, Room, RoomId, UserName};
use crate::infrastructure::dto::websocket::{
    CodeResponseMessage, CodeUpdateMessage, LanguageUpdateMessage, MessageType, UserJoinedMessage,
    UserTypingMessage,
};

/// Outbound channel for one connection. The WebSocket pump task on the other
/// end forwards each payload to the client in order.
pub type EventSink = mpsc::UnboundedSender<String>;

/// One room plus the connections currently joined to it.
struct RoomEntry {
    room: Room,
    members: HashMap<ConnectionId, EventSink>,
}

impl RoomEntry {
    fn new(room: Room) -> Self {
        Self {
            room,
            members: HashMap::new(),
        }
    }

    /// Send to a single member. A closed channel means the connection is
    /// tearing down; the payload is dropped.
    fn send_to(&self, connection_id: &ConnectionId, payload: &str) {
        if let Some(sink) = self.members.get(connection_id) {
            if sink.send(payload.to_string()).is_err() {
                tracing::warn!(
                    "Failed to push message to connection '{}', skipping",
                    connection_id
                );
            }
        }
    }

    /// Fan out to every member, optionally excluding the originating
    /// connection. Partial failure is tolerated: a member that disconnected
    /// mid-broadcast simply does not receive it.
    fn broadcast(&self, payload: &str, exclude: Option<&ConnectionId>) {
        for (connection_id, sink) in &self.members {
            if Some(connection_id) == exclude {
                continue;
            }
            if sink.send(payload.to_string()).is_err() {
                tracing::warn!(
                    "Failed to push message to connection '{}' during broadcast, skipping",
                    connection_id
                );
            }
        }
    }
}

struct HubState {
    rooms: HashMap<RoomId, RoomEntry>,
}

/// Session registry and broadcast router for all rooms.
///
/// One instance is created at startup and shared by every connection handler
/// via the application state.
pub struct SessionHub {
    state: Mutex<HubState>,
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                rooms: HashMap::new(),
            }),
        }
    }

    /// Join a connection to a room, creating the room with default buffer and
    /// language if it does not exist yet.
    ///
    /// The joiner receives the room's current buffer first, then everyone in
    /// the room (joiner included) receives the updated membership snapshot.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        sink: EventSink,
        room_id: RoomId,
        name: UserName,
        now: i64,
    ) {
        let mut state = self.state.lock().await;
        let entry = state.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::info!("Room '{}' created", room_id);
            RoomEntry::new(Room::new(room_id.clone(), now))
        });

        entry.members.insert(connection_id, sink);
        entry.room.emptied_at = None;
        entry.room.add_participant(name);

        // Current buffer goes to the joiner before any membership fan-out so
        // it precedes every subsequent incremental update on its channel.
        let code_msg = encode(&CodeUpdateMessage {
            r#type: MessageType::CodeUpdate,
            code: entry.room.code.clone(),
        });
        entry.send_to(&connection_id, &code_msg);

        let joined_msg = encode(&UserJoinedMessage {
            r#type: MessageType::UserJoined,
            users: entry.room.participant_names(),
        });
        entry.broadcast(&joined_msg, None);
    }

    /// Remove a connection from a room and broadcast the updated membership
    /// to the remaining members. No-op if the room is unknown.
    ///
    /// The room record itself persists after the last leave; only the idle
    /// sweep removes it.
    pub async fn leave(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        name: &UserName,
        now: i64,
    ) {
        let mut state = self.state.lock().await;
        let Some(entry) = state.rooms.get_mut(room_id) else {
            return;
        };

        entry.members.remove(&connection_id);
        entry.room.remove_participant(name);
        if entry.members.is_empty() {
            entry.room.emptied_at = Some(now);
        }

        let joined_msg = encode(&UserJoinedMessage {
            r#type: MessageType::UserJoined,
            users: entry.room.participant_names(),
        });
        entry.broadcast(&joined_msg, None);
    }

    /// Store a new buffer (last write wins) and broadcast it to every member
    /// except the sender, who already has it locally. No-op if the room is
    /// unknown.
    pub async fn set_code(&self, connection_id: ConnectionId, room_id: &RoomId, code: String) {
        let mut state = self.state.lock().await;
        let Some(entry) = state.rooms.get_mut(room_id) else {
            return;
        };

        entry.room.code = code.clone();
        let msg = encode(&CodeUpdateMessage {
            r#type: MessageType::CodeUpdate,
            code,
        });
        entry.broadcast(&msg, Some(&connection_id));
    }

    /// Fire-and-forget typing indicator to every member except the sender.
    /// Nothing is persisted.
    pub async fn notify_typing(
        &self,
        connection_id: ConnectionId,
        room_id: &RoomId,
        name: &UserName,
    ) {
        let state = self.state.lock().await;
        let Some(entry) = state.rooms.get(room_id) else {
            return;
        };

        let msg = encode(&UserTypingMessage {
            r#type: MessageType::UserTyping,
            user_name: name.as_str().to_string(),
        });
        entry.broadcast(&msg, Some(&connection_id));
    }

    /// Store a new language tag and broadcast it to every member, sender
    /// included (the sender's own UI reflects it too). No-op if the room is
    /// unknown.
    pub async fn set_language(&self, room_id: &RoomId, language: String) {
        let mut state = self.state.lock().await;
        let Some(entry) = state.rooms.get_mut(room_id) else {
            return;
        };

        entry.room.language = language.clone();
        let msg = encode(&LanguageUpdateMessage {
            r#type: MessageType::LanguageUpdate,
            language,
        });
        entry.broadcast(&msg, None);
    }

    /// Broadcast an execution result to every member of the room, requester
    /// included, so all participants see the same output.
    pub async fn publish_execution_result(&self, room_id: &RoomId, response: serde_json::Value) {
        let state = self.state.lock().await;
        let Some(entry) = state.rooms.get(room_id) else {
            return;
        };

        let msg = encode(&CodeResponseMessage {
            r#type: MessageType::CodeResponse,
            response,
        });
        entry.broadcast(&msg, None);
    }

    /// Snapshot of a single room, if it exists.
    pub async fn room(&self, room_id: &RoomId) -> Option<Room> {
        let state = self.state.lock().await;
        state.rooms.get(room_id).map(|entry| entry.room.clone())
    }

    /// Snapshot of all rooms, sorted by id for stable listing.
    pub async fn rooms(&self) -> Vec<Room> {
        let state = self.state.lock().await;
        let mut rooms: Vec<Room> = state.rooms.values().map(|e| e.room.clone()).collect();
        rooms.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        rooms
    }

    /// Remove rooms that have been empty for at least `ttl_millis`.
    /// Returns the number of rooms evicted.
    ///
    /// Runs off the request path as a background sweep; rooms with members
    /// are never candidates.
    pub async fn evict_idle(&self, now: i64, ttl_millis: i64) -> usize {
        let mut state = self.state.lock().await;
        let before = state.rooms.len();
        state.rooms.retain(|room_id, entry| {
            let expired = entry.members.is_empty()
                && entry
                    .room
                    .emptied_at
                    .is_some_and(|emptied_at| now - emptied_at >= ttl_millis);
            if expired {
                tracing::info!("Room '{}' evicted after idle TTL", room_id);
            }
            !expired
        });
        before - state.rooms.len()
    }
}

fn encode<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).unwrap()
}
