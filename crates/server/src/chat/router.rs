use std::sync::Arc;

use huddle_shared::constants::ROOM_TOPIC_PREFIX;

use crate::broker::Broker;
use crate::error::ChatResult;
use crate::models::{Message, MessageContent};
use crate::ws::events::RoomEvent;

use super::messages::MessageStore;
use super::notify::Notifier;
use super::presence::{PresenceChange, PresenceTracker};

#[derive(Debug, Clone)]
pub enum OutboundEvent {
    Chat {
        room_id: String,
        author_id: String,
        content: MessageContent,
    },
    System(PresenceChange),
}

pub fn room_topic(room_id: &str) -> String {
    format!("{ROOM_TOPIC_PREFIX}{room_id}")
}

#[derive(Clone)]
pub struct DeliveryRouter {
    messages: MessageStore,
    broker: Arc<Broker>,
    presence: Arc<PresenceTracker>,
    notifier: Notifier,
}

impl DeliveryRouter {
    pub fn new(
        messages: MessageStore,
        broker: Arc<Broker>,
        presence: Arc<PresenceTracker>,
        notifier: Notifier,
    ) -> Self {
        Self {
            messages,
            broker,
            presence,
            notifier,
        }
    }

    /// Returns the stored message for chat content. Delivery past the broker
    /// is fire-and-forget.
    pub async fn publish(&self, event: OutboundEvent) -> ChatResult<Option<Message>> {
        match event {
            OutboundEvent::Chat {
                room_id,
                author_id,
                content,
            } => {
                let message = self
                    .messages
                    .send_message(&room_id, &author_id, &content)
                    .await?;

                self.publish_room_event(&RoomEvent::Message {
                    message: message.view(),
                });

                let notifier = self.notifier.clone();
                let pending = message.clone();
                tokio::spawn(async move {
                    if let Err(e) = notifier.notify_absent_members(&pending).await {
                        tracing::warn!(message_id = %pending.id, "Notification fallback failed: {}", e);
                    }
                });

                Ok(Some(message))
            }
            OutboundEvent::System(change) => {
                self.publish_room_event(&RoomEvent::from(change));
                Ok(None)
            }
        }
    }

    pub fn publish_room_event(&self, event: &RoomEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Failed to serialize room event: {}", e);
                return 0;
            }
        };
        self.broker.publish(&room_topic(event.room_id()), payload)
    }

    pub async fn enter_room(&self, user_id: &str, room_id: &str) {
        if let Some(change) = self.presence.subscribe(user_id, room_id) {
            let _ = self.publish(OutboundEvent::System(change)).await;
        }
    }

    pub async fn leave_room(&self, user_id: &str) {
        if let Some(change) = self.presence.unsubscribe(user_id) {
            let _ = self.publish(OutboundEvent::System(change)).await;
        }
    }

    pub async fn leave_room_if(&self, user_id: &str, room_id: &str) {
        if let Some(change) = self.presence.unsubscribe_from(user_id, room_id) {
            let _ = self.publish(OutboundEvent::System(change)).await;
        }
    }
}
