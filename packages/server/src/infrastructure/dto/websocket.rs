//! WebSocket event DTOs.
//!
//! All wire messages are JSON objects tagged by a `type` field. Inbound
//! events form a closed enumeration so malformed payloads fail at parse time
//! instead of at point of use.

use serde::{Deserialize, Serialize};

/// Events a client may send to the server.
///
/// `roomId`/`userName` fields on post-join events are carried for wire
/// compatibility with the original protocol; the connection's binding is
/// authoritative for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Join {
        room_id: String,
        user_name: String,
        #[serde(default)]
        language: String,
    },
    #[serde(rename_all = "camelCase")]
    CodeChange { room_id: String, code: String },
    LeaveRoom,
    #[serde(rename_all = "camelCase")]
    Typing { room_id: String, user_name: String },
    #[serde(rename_all = "camelCase")]
    LanguageChange { room_id: String, language: String },
    #[serde(rename_all = "camelCase")]
    CompileCode {
        code: String,
        room_id: String,
        language: String,
        version: String,
        #[serde(default)]
        input: String,
    },
}

/// Discriminant for server-to-client messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    UserJoined,
    CodeUpdate,
    UserTyping,
    LanguageUpdate,
    CodeResponse,
}

/// Full membership snapshot, sent to a room on every join/leave/disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserJoinedMessage {
    pub r#type: MessageType,
    pub users: Vec<String>,
}

/// Current buffer, unicast to a joiner and broadcast to others on edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUpdateMessage {
    pub r#type: MessageType,
    pub code: String,
}

/// Ephemeral typing indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingMessage {
    pub r#type: MessageType,
    pub user_name: String,
}

/// New language tag for the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageUpdateMessage {
    pub r#type: MessageType,
    pub language: String,
}

/// Execution result, relayed provider payload included. The payload always
/// carries a string at `run.output` (an error-shaped payload is substituted
/// when the provider call fails).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeResponseMessage {
    pub r#type: MessageType,
    pub response: serde_json::Value,
}
