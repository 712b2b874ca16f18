//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Room list entry for `GET /api/rooms`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub id: String,
    pub participants: Vec<String>,
    pub created_at: String,
}

/// Room detail for `GET /api/rooms/{room_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub id: String,
    pub participants: Vec<String>,
    pub code: String,
    pub language: String,
    pub created_at: String,
    pub emptied_at: Option<String>,
}
