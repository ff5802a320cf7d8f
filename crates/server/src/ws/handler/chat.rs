use serde::Deserialize;

use huddle_shared::constants::APP_DESTINATION_PREFIX;

use crate::AppState;
use crate::chat::router::OutboundEvent;
use crate::error::{ChatError, ChatResult};
use crate::models::{AuthUser, MessageContent};
use crate::ws::frame::Frame;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest {
    room_id: String,
    #[serde(flatten)]
    content: MessageContent,
}

pub async fn handle_send(state: &AppState, user: &AuthUser, frame: &Frame) -> ChatResult<()> {
    let destination = frame
        .get("destination")
        .ok_or_else(|| ChatError::invalid("SEND requires a destination"))?;

    let route = destination
        .strip_prefix(APP_DESTINATION_PREFIX)
        .and_then(|d| d.strip_prefix('/'));
    if route != Some("chat.message") {
        return Err(ChatError::not_found(format!("Unknown destination {destination}")));
    }

    let request: SendRequest = serde_json::from_str(&frame.body)
        .map_err(|e| ChatError::invalid(format!("Invalid message payload: {e}")))?;

    state
        .router
        .publish(OutboundEvent::Chat {
            room_id: request.room_id,
            author_id: user.id.clone(),
            content: request.content,
        })
        .await?;
    Ok(())
}
