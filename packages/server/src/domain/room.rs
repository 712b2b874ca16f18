//! Room entity and its value objects.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Buffer contents a freshly created room starts with.
pub const DEFAULT_CODE: &str = "// start code here";

/// Language tag a freshly created room starts with.
pub const DEFAULT_LANGUAGE: &str = "javascript";

const MAX_ROOM_ID_LEN: usize = 128;
const MAX_USER_NAME_LEN: usize = 64;

/// Validation errors for domain value objects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("room id must be at most {MAX_ROOM_ID_LEN} characters")]
    RoomIdTooLong,
    #[error("user name must not be empty")]
    EmptyUserName,
    #[error("user name must be at most {MAX_USER_NAME_LEN} characters")]
    UserNameTooLong,
}

/// Opaque key identifying a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyRoomId);
        }
        if value.chars().count() > MAX_ROOM_ID_LEN {
            return Err(DomainError::RoomIdTooLong);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display name a participant supplies at join time.
///
/// Uniqueness is by value only: two connections sharing a name collapse into
/// one visible membership entry (inherited behavior, kept deliberately).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UserName(String);

impl UserName {
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::EmptyUserName);
        }
        if value.chars().count() > MAX_USER_NAME_LEN {
            return Err(DomainError::UserNameTooLong);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one transport connection.
///
/// Broadcast exclusion is keyed by this, never by display name, so name
/// collisions cannot leak events to the wrong connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A named collaborative session: one shared buffer, one language tag, and
/// the set of present participant names.
///
/// Rooms are created lazily on first join and persist after the last leave;
/// removal only happens through the idle-room sweep.
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    pub id: RoomId,
    /// Insertion-ordered, deduplicated by value.
    pub participants: Vec<UserName>,
    pub code: String,
    pub language: String,
    /// Unix timestamp when created (in JST, milliseconds)
    pub created_at: i64,
    /// Set when the last member left, cleared on join. Drives eviction.
    pub emptied_at: Option<i64>,
}

impl Room {
    pub fn new(id: RoomId, created_at: i64) -> Self {
        Self {
            id,
            participants: Vec::new(),
            code: DEFAULT_CODE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            created_at,
            emptied_at: None,
        }
    }

    /// Insert a participant name; idempotent if already present.
    pub fn add_participant(&mut self, name: UserName) {
        if !self.participants.contains(&name) {
            self.participants.push(name);
        }
    }

    /// Remove a participant name; returns whether it was present.
    pub fn remove_participant(&mut self, name: &UserName) -> bool {
        match self.participants.iter().position(|p| p == name) {
            Some(index) => {
                self.participants.remove(index);
                true
            }
            None => false,
        }
    }

    /// Current membership snapshot as plain strings, in insertion order.
    pub fn participant_names(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }
}
