use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::{ChatError, ChatResult};
use crate::models::{AuthUser, MembersRequest, TransferAdminRequest};
use crate::AppState;

/// GET /api/rooms/:roomId/members
pub async fn list_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
) -> ChatResult<impl IntoResponse> {
    let membership = state.memberships.membership(&room_id).await?;
    if !membership.contains(&user.id) {
        return Err(ChatError::forbidden("Not a member of this room"));
    }
    Ok(Json(membership))
}

/// POST /api/rooms/:roomId/members
pub async fn add_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<MembersRequest>,
) -> ChatResult<impl IntoResponse> {
    if !state.memberships.is_member(&room_id, &user.id).await? {
        return Err(ChatError::forbidden("Not a member of this room"));
    }
    let membership = state.memberships.add_members(&room_id, &body.user_ids).await?;
    Ok(Json(membership))
}

/// DELETE /api/rooms/:roomId/members
pub async fn remove_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<MembersRequest>,
) -> ChatResult<impl IntoResponse> {
    let membership = state
        .memberships
        .remove_members(&room_id, &user.id, &body.user_ids)
        .await?;
    Ok(Json(membership))
}

/// PUT /api/rooms/:roomId/admin
pub async fn transfer_admin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Json(body): Json<TransferAdminRequest>,
) -> ChatResult<impl IntoResponse> {
    let membership = state
        .memberships
        .transfer_admin(&room_id, &user.id, &body.user_id)
        .await?;
    Ok(Json(membership))
}
