use dashmap::DashMap;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db::now_timestamp;
use crate::error::{ChatError, ChatResult};
use crate::models::{Membership, RoomRow, RoomType};

#[derive(Clone)]
pub struct MembershipStore {
    db: SqlitePool,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl MembershipStore {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock_room(&self, room_id: &str) -> ChatResult<RoomLock> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&self.db)
            .await?;
        if exists == 0 {
            return Err(ChatError::not_found("Room not found"));
        }

        let lock = self
            .locks
            .entry(room_id.to_string())
            .or_default()
            .clone();
        Ok(RoomLock {
            guard: Some(lock.lock_owned().await),
            room_id: room_id.to_string(),
            locks: self.locks.clone(),
        })
    }

    pub async fn create_membership(
        &self,
        room_id: &str,
        name: &str,
        initial_members: &[String],
        room_type: RoomType,
        admin: &str,
    ) -> ChatResult<Membership> {
        let members: BTreeSet<String> = initial_members.iter().cloned().collect();

        if !members.contains(admin) {
            return Err(ChatError::invalid("Room admin must be one of the initial members"));
        }
        if room_type == RoomType::Direct && members.len() != 2 {
            return Err(ChatError::invalid("A direct room has exactly two members"));
        }
        if let Err(e) = huddle_shared::validation::validate_room_name(name) {
            return Err(ChatError::InvalidArgument(e));
        }

        let now = now_timestamp();
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists > 0 {
            return Err(ChatError::invalid("Room already exists"));
        }

        sqlx::query(
            "INSERT INTO rooms (id, name, room_type, admin_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(name.trim())
        .bind(room_type.as_str())
        .bind(admin)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for user_id in &members {
            sqlx::query("INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
                .bind(room_id)
                .bind(user_id)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(room_id, admin, members = members.len(), "Room created");

        Ok(Membership {
            room_id: room_id.to_string(),
            name: name.trim().to_string(),
            room_type,
            admin: admin.to_string(),
            members,
            created_at: now,
        })
    }

    /// Union `new_members` into the room. Adding an existing member is a no-op.
    pub async fn add_members(&self, room_id: &str, new_members: &[String]) -> ChatResult<Membership> {
        let current = self.membership(room_id).await?;

        let additions: Vec<&String> = new_members
            .iter()
            .filter(|u| !current.contains(u))
            .collect();
        if additions.is_empty() {
            return Ok(current);
        }
        if current.room_type == RoomType::Direct {
            return Err(ChatError::invalid("Members cannot be added to a direct room"));
        }

        let now = now_timestamp();
        for user_id in &additions {
            sqlx::query(
                "INSERT OR IGNORE INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)",
            )
            .bind(room_id)
            .bind(*user_id)
            .bind(&now)
            .execute(&self.db)
            .await?;
        }

        tracing::info!(room_id, added = additions.len(), "Members added");
        self.membership(room_id).await
    }

    pub async fn remove_members(
        &self,
        room_id: &str,
        actor_id: &str,
        targets: &[String],
    ) -> ChatResult<Membership> {
        let _guard = self.lock_room(room_id).await?;
        let current = self.membership(room_id).await?;

        if !current.is_admin(actor_id) {
            return Err(ChatError::forbidden("Only the room admin can remove members"));
        }
        if targets.iter().any(|t| current.is_admin(t)) {
            return Err(ChatError::invalid(
                "The admin must transfer the room before leaving it",
            ));
        }

        let mut tx = self.db.begin().await?;
        for user_id in targets {
            sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
                .bind(room_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::info!(room_id, actor_id, removed = targets.len(), "Members removed");
        self.membership(room_id).await
    }

    pub async fn transfer_admin(
        &self,
        room_id: &str,
        actor_id: &str,
        new_admin: &str,
    ) -> ChatResult<Membership> {
        let _guard = self.lock_room(room_id).await?;
        let current = self.membership(room_id).await?;

        if !current.is_admin(actor_id) {
            return Err(ChatError::forbidden("Only the room admin can transfer the room"));
        }
        if !current.contains(new_admin) {
            return Err(ChatError::invalid("The new admin must be a member of the room"));
        }

        let result = sqlx::query("UPDATE rooms SET admin_id = ? WHERE id = ? AND admin_id = ?")
            .bind(new_admin)
            .bind(room_id)
            .bind(actor_id)
            .execute(&self.db)
            .await?;

        // Another process changed the admin between our read and write.
        if result.rows_affected() == 0 {
            return Err(ChatError::forbidden("Room admin changed concurrently"));
        }

        tracing::info!(room_id, from = actor_id, to = new_admin, "Room admin transferred");
        self.membership(room_id).await
    }

    pub async fn membership(&self, room_id: &str) -> ChatResult<Membership> {
        let room = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, room_type, admin_id, created_at FROM rooms WHERE id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ChatError::not_found("Room not found"))?;

        let members = self.load_members(room_id).await?;
        Ok(into_membership(room, members))
    }

    pub async fn members_of(&self, room_id: &str) -> ChatResult<BTreeSet<String>> {
        Ok(self.membership(room_id).await?.members)
    }

    /// Membership of `user_id` in an existing room. `NotFound` for unknown rooms.
    pub async fn is_member(&self, room_id: &str, user_id: &str) -> ChatResult<bool> {
        Ok(self.membership(room_id).await?.contains(user_id))
    }

    pub async fn rooms_of(
        &self,
        user_id: &str,
        room_type: Option<RoomType>,
    ) -> ChatResult<Vec<Membership>> {
        let rooms = sqlx::query_as::<_, RoomRow>(
            r#"SELECT r.id, r.name, r.room_type, r.admin_id, r.created_at
               FROM rooms r
               INNER JOIN room_members m ON m.room_id = r.id
               WHERE m.user_id = ? AND (? IS NULL OR r.room_type = ?)
               ORDER BY r.created_at DESC"#,
        )
        .bind(user_id)
        .bind(room_type.map(|t| t.as_str()))
        .bind(room_type.map(|t| t.as_str()))
        .fetch_all(&self.db)
        .await?;

        let mut result = Vec::with_capacity(rooms.len());
        for room in rooms {
            let members = self.load_members(&room.id).await?;
            result.push(into_membership(room, members));
        }
        Ok(result)
    }

    async fn load_members(&self, room_id: &str) -> ChatResult<BTreeSet<String>> {
        let members = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM room_members WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_all(&self.db)
        .await?;
        Ok(members.into_iter().collect())
    }
}

// Dropping the guard unlocks the room and forgets its mutex once unused.
struct RoomLock {
    guard: Option<OwnedMutexGuard<()>>,
    room_id: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for RoomLock {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.room_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn into_membership(room: RoomRow, members: BTreeSet<String>) -> Membership {
    let room_type = RoomType::parse(&room.room_type).unwrap_or_else(|| {
        tracing::warn!(room_id = %room.id, raw = %room.room_type, "Unknown room type, treating as group");
        RoomType::Group
    });
    Membership {
        room_id: room.id,
        name: room.name,
        room_type,
        admin: room.admin_id,
        members,
        created_at: room.created_at,
    }
}
