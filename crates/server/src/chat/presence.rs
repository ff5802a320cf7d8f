use dashmap::DashMap;

use huddle_shared::constants::NOTIFICATION_FEED_ROOM;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Entered { user_id: String, room_id: String },
    Left { user_id: String, room_id: String },
}

#[derive(Default)]
pub struct PresenceTracker {
    viewing: DashMap<String, String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` is now viewing `room_id`, replacing any earlier
    /// entry. The notifications feed is not a room and leaves presence alone.
    pub fn subscribe(&self, user_id: &str, room_id: &str) -> Option<PresenceChange> {
        if room_id == NOTIFICATION_FEED_ROOM {
            return None;
        }

        self.viewing
            .insert(user_id.to_string(), room_id.to_string());
        tracing::debug!(user_id, room_id, "Presence set");

        Some(PresenceChange::Entered {
            user_id: user_id.to_string(),
            room_id: room_id.to_string(),
        })
    }

    pub fn unsubscribe(&self, user_id: &str) -> Option<PresenceChange> {
        let (user_id, room_id) = self.viewing.remove(user_id)?;
        tracing::debug!(%user_id, %room_id, "Presence cleared");
        Some(PresenceChange::Left { user_id, room_id })
    }

    /// Clear presence only if it still points at `room_id`.
    pub fn unsubscribe_from(&self, user_id: &str, room_id: &str) -> Option<PresenceChange> {
        let (user_id, room_id) = self
            .viewing
            .remove_if(user_id, |_, current| current == room_id)?;
        Some(PresenceChange::Left { user_id, room_id })
    }

    pub fn is_viewing(&self, user_id: &str, room_id: &str) -> bool {
        self.viewing
            .get(user_id)
            .is_some_and(|current| current.as_str() == room_id)
    }

    pub fn current(&self, user_id: &str) -> Option<String> {
        self.viewing.get(user_id).map(|r| r.value().clone())
    }
}
