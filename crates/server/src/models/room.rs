use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Direct,
    Group,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Direct => "DIRECT",
            RoomType::Group => "GROUP",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DIRECT" => Some(RoomType::Direct),
            "GROUP" => Some(RoomType::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RoomRow {
    pub id: String,
    pub name: String,
    pub room_type: String,
    pub admin_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub room_id: String,
    pub name: String,
    pub room_type: RoomType,
    pub admin: String,
    pub members: BTreeSet<String>,
    pub created_at: String,
}

impl Membership {
    pub fn contains(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin == user_id
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: Option<String>,
    pub room_type: RoomType,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoomListQuery {
    #[serde(rename = "type")]
    pub room_type: Option<RoomType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAdminRequest {
    pub user_id: String,
}
