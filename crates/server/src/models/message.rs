use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use huddle_shared::constants::REACTION_SLOTS;

use super::AuthorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    #[serde(alias = "IMG")]
    Image,
    File,
    Sub,
    Unsub,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "TEXT",
            MessageType::Image => "IMAGE",
            MessageType::File => "FILE",
            MessageType::Sub => "SUB",
            MessageType::Unsub => "UNSUB",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "TEXT" => Some(MessageType::Text),
            "IMAGE" => Some(MessageType::Image),
            "FILE" => Some(MessageType::File),
            "SUB" => Some(MessageType::Sub),
            "UNSUB" => Some(MessageType::Unsub),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, MessageType::Sub | MessageType::Unsub)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Alive,
    Deleted,
}

impl MessageStatus {
    pub fn parse(raw: &str) -> Self {
        if raw == "DELETED" {
            MessageStatus::Deleted
        } else {
            MessageStatus::Alive
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default, alias = "body")]
    pub message: String,
    #[serde(default)]
    pub mention: Vec<String>,
    #[serde(default)]
    pub mention_all: bool,
}

impl MessageContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            message: body.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_image: Option<String>,
    #[sqlx(rename = "type")]
    pub message_type: String,
    pub body: String,
    pub mentions: String,
    pub mention_all: bool,
    pub created_at: String,
    pub status: String,
}

pub type ReactionTable = [BTreeSet<String>; REACTION_SLOTS];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub author: AuthorSnapshot,
    pub message_type: MessageType,
    pub body: String,
    pub mentions: Vec<String>,
    pub mention_all: bool,
    pub created_at: String,
    pub read_by: BTreeSet<String>,
    pub membership_snapshot: BTreeSet<String>,
    pub reactions: ReactionTable,
    pub status: MessageStatus,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.status == MessageStatus::Deleted
    }

    /// Intended recipients that have not fetched the message yet.
    pub fn unread_count(&self) -> usize {
        let mut audience = self.membership_snapshot.clone();
        audience.insert(self.author.id.clone());
        audience.difference(&self.read_by).count()
    }

    pub fn view(&self) -> MessageView {
        let deleted = self.is_deleted();
        MessageView {
            id: self.id.clone(),
            room_id: self.room_id.clone(),
            message_type: self.message_type,
            author: self.author.clone(),
            message: if deleted { String::new() } else { self.body.clone() },
            mention: if deleted { Vec::new() } else { self.mentions.clone() },
            mention_all: self.mention_all && !deleted,
            created_at: self.created_at.clone(),
            read: self.read_by.iter().cloned().collect(),
            joined: self.membership_snapshot.iter().cloned().collect(),
            unread_count: self.unread_count(),
            emoji_list: self
                .reactions
                .iter()
                .enumerate()
                .map(|(slot, users)| ReactionSlotView {
                    slot,
                    user_ids: users.iter().cloned().collect(),
                })
                .collect(),
            message_status: self.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub room_id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub author: AuthorSnapshot,
    pub message: String,
    pub mention: Vec<String>,
    pub mention_all: bool,
    pub created_at: String,
    pub read: Vec<String>,
    pub joined: Vec<String>,
    pub unread_count: usize,
    pub emoji_list: Vec<ReactionSlotView>,
    pub message_status: MessageStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSlotView {
    pub slot: usize,
    pub user_ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePage {
    pub before: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct MessageFetch {
    pub first_unread_id: Option<String>,
    /// Newest first.
    pub messages: Vec<Message>,
    pub has_more: bool,
    pub cursor: Option<String>,
    /// Ids this call added the requester to `read_by` for.
    pub newly_read: Vec<String>,
}
