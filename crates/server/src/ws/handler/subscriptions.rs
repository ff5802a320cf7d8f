use huddle_shared::constants::{NOTIFICATION_FEED_ROOM, ROOM_TOPIC_PREFIX};

use crate::AppState;
use crate::chat::router::room_topic;
use crate::error::{ChatError, ChatResult};
use crate::models::AuthUser;
use crate::ws::frame::Frame;
use crate::ws::gateway::ClientId;

pub async fn subscribe(
    state: &AppState,
    client_id: ClientId,
    user: &AuthUser,
    frame: &Frame,
) -> ChatResult<()> {
    let destination = frame
        .get("destination")
        .ok_or_else(|| ChatError::invalid("SUBSCRIBE requires a destination"))?;
    let subscription_id = frame
        .get("id")
        .ok_or_else(|| ChatError::invalid("SUBSCRIBE requires an id"))?;
    let room_id = room_from_destination(destination)
        .ok_or_else(|| ChatError::not_found(format!("Unknown destination {destination}")))?;

    if room_id != NOTIFICATION_FEED_ROOM
        && !state.memberships.is_member(room_id, &user.id).await?
    {
        return Err(ChatError::forbidden("Not a member of this room"));
    }

    state
        .gateway
        .add_subscription(
            client_id,
            subscription_id,
            destination,
            room_id,
            &room_topic(room_id),
            &state.broker,
        )
        .await?;
    state.router.enter_room(&user.id, room_id).await;

    tracing::debug!(client_id, user_id = %user.id, room_id, "Subscribed");
    Ok(())
}

pub async fn unsubscribe(
    state: &AppState,
    client_id: ClientId,
    user: &AuthUser,
    frame: &Frame,
) -> ChatResult<()> {
    let subscription_id = frame
        .get("id")
        .ok_or_else(|| ChatError::invalid("UNSUBSCRIBE requires an id"))?;

    let subscription = state
        .gateway
        .remove_subscription(client_id, subscription_id, &state.broker)
        .await
        .ok_or_else(|| ChatError::not_found("Unknown subscription"))?;

    state
        .router
        .leave_room_if(&user.id, &subscription.room_id)
        .await;
    Ok(())
}

/// `/topic/room.<id>` or `/exchange/<name>/room.<id>`.
fn room_from_destination(destination: &str) -> Option<&str> {
    let topic = if let Some(rest) = destination.strip_prefix("/topic/") {
        rest
    } else {
        let rest = destination.strip_prefix("/exchange/")?;
        let (exchange, topic) = rest.split_once('/')?;
        if exchange.is_empty() {
            return None;
        }
        topic
    };
    topic
        .strip_prefix(ROOM_TOPIC_PREFIX)
        .filter(|id| !id.is_empty())
}
