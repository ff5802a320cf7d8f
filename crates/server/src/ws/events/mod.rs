use serde::Serialize;

use crate::chat::presence::PresenceChange;
use crate::models::MessageView;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomEvent {
    Message {
        message: MessageView,
    },
    Sub {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Unsub {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Read {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "messageIds")]
        message_ids: Vec<String>,
    },
    Reaction {
        message: MessageView,
    },
    Deleted {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

impl RoomEvent {
    pub fn room_id(&self) -> &str {
        match self {
            RoomEvent::Message { message } | RoomEvent::Reaction { message } => &message.room_id,
            RoomEvent::Sub { room_id, .. }
            | RoomEvent::Unsub { room_id, .. }
            | RoomEvent::Read { room_id, .. }
            | RoomEvent::Deleted { room_id, .. } => room_id,
        }
    }
}

impl From<PresenceChange> for RoomEvent {
    fn from(change: PresenceChange) -> Self {
        match change {
            PresenceChange::Entered { user_id, room_id } => RoomEvent::Sub { room_id, user_id },
            PresenceChange::Left { user_id, room_id } => RoomEvent::Unsub { room_id, user_id },
        }
    }
}
