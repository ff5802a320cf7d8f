use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::{ChatError, ChatResult};
use crate::models::{AuthUser, MessagePage};
use crate::ws::events::RoomEvent;
use crate::AppState;

/// GET /api/rooms/:roomId/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(room_id): Path<String>,
    Query(page): Query<MessagePage>,
) -> ChatResult<impl IntoResponse> {
    let fetch = state
        .messages
        .fetch_messages(&room_id, &user.id, &page)
        .await?;

    if !fetch.newly_read.is_empty() {
        state.router.publish_room_event(&RoomEvent::Read {
            room_id: room_id.clone(),
            user_id: user.id.clone(),
            message_ids: fetch.newly_read.clone(),
        });
    }

    let items: Vec<_> = fetch.messages.iter().map(|m| m.view()).collect();
    Ok(Json(serde_json::json!({
        "firstUnreadId": fetch.first_unread_id,
        "items": items,
        "cursor": fetch.cursor,
        "hasMore": fetch.has_more,
    })))
}

/// PUT /api/messages/:messageId/reactions/:slot
pub async fn add_reaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((message_id, slot)): Path<(String, String)>,
) -> ChatResult<impl IntoResponse> {
    let slot = parse_slot(&slot)?;
    let message = state.messages.add_reaction(&message_id, &user.id, slot).await?;
    let view = message.view();
    state
        .router
        .publish_room_event(&RoomEvent::Reaction { message: view.clone() });
    Ok(Json(view))
}

/// DELETE /api/messages/:messageId/reactions/:slot
pub async fn remove_reaction(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((message_id, slot)): Path<(String, String)>,
) -> ChatResult<impl IntoResponse> {
    let slot = parse_slot(&slot)?;
    let message = state
        .messages
        .remove_reaction(&message_id, &user.id, slot)
        .await?;
    let view = message.view();
    state
        .router
        .publish_room_event(&RoomEvent::Reaction { message: view.clone() });
    Ok(Json(view))
}

/// DELETE /api/messages/:messageId
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(message_id): Path<String>,
) -> ChatResult<impl IntoResponse> {
    let (message, changed) = state.messages.delete_message(&message_id, &user.id).await?;
    if changed {
        state.router.publish_room_event(&RoomEvent::Deleted {
            room_id: message.room_id.clone(),
            message_id: message.id.clone(),
        });
    }
    Ok(Json(message.view()))
}

fn parse_slot(raw: &str) -> ChatResult<usize> {
    raw.parse()
        .map_err(|_| ChatError::not_found(format!("Unknown reaction slot {raw}")))
}
