//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::{Room, RoomId},
    infrastructure::dto::http::{RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
};
use kobeya_shared::time::timestamp_to_jst_rfc3339;

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.hub.rooms().await;

    let summaries: Vec<RoomSummaryDto> = rooms
        .into_iter()
        .map(|room| RoomSummaryDto {
            id: room.id.as_str().to_string(),
            participants: room.participant_names(),
            created_at: timestamp_to_jst_rfc3339(room.created_at),
        })
        .collect();

    Json(summaries)
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let room_id = RoomId::new(room_id).map_err(|_| StatusCode::NOT_FOUND)?;

    match state.hub.room(&room_id).await {
        Some(room) => Ok(Json(to_detail_dto(room))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

fn to_detail_dto(room: Room) -> RoomDetailDto {
    RoomDetailDto {
        id: room.id.as_str().to_string(),
        participants: room.participant_names(),
        code: room.code,
        language: room.language,
        created_at: timestamp_to_jst_rfc3339(room.created_at),
        emptied_at: room.emptied_at.map(timestamp_to_jst_rfc3339),
    }
}
