use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use huddle_shared::constants::DEFAULT_ROOM_NAME;

use crate::error::ChatResult;
use crate::models::{AuthUser, CreateRoomRequest, RoomListQuery, RoomType};
use crate::AppState;

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<CreateRoomRequest>,
) -> ChatResult<impl IntoResponse> {
    let name = match body.room_type {
        RoomType::Direct => String::new(),
        RoomType::Group => body
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM_NAME.to_string()),
    };

    let mut members = body.members;
    if !members.contains(&user.id) {
        members.push(user.id.clone());
    }

    let room_id = uuid::Uuid::new_v4().to_string();
    let membership = state
        .memberships
        .create_membership(&room_id, &name, &members, body.room_type, &user.id)
        .await?;

    Ok((StatusCode::CREATED, Json(membership)))
}

/// GET /api/rooms?type=GROUP|DIRECT
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<RoomListQuery>,
) -> ChatResult<impl IntoResponse> {
    let rooms = state.memberships.rooms_of(&user.id, query.room_type).await?;
    Ok(Json(rooms))
}
