use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashMap};

use huddle_shared::constants::{MAX_MESSAGE_PAGE_SIZE, MESSAGE_PAGE_SIZE, REACTION_SLOTS};
use huddle_shared::validation;

use crate::db::now_timestamp;
use crate::error::{ChatError, ChatResult};
use crate::models::{
    AuthorSnapshot, Message, MessageContent, MessageFetch, MessagePage, MessageRow,
    MessageStatus, MessageType, ReactionTable,
};

const MESSAGE_COLUMNS: &str = "id, room_id, author_id, author_name, author_image, type, body, \
                               mentions, mention_all, created_at, status";

#[derive(Clone)]
pub struct MessageStore {
    db: SqlitePool,
}

impl MessageStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn send_message(
        &self,
        room_id: &str,
        author_id: &str,
        content: &MessageContent,
    ) -> ChatResult<Message> {
        let members = self.room_members(room_id).await?;

        let author = sqlx::query_as::<_, AuthorSnapshot>(
            r#"SELECT id, name, image FROM "user" WHERE id = ?"#,
        )
        .bind(author_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ChatError::not_found("Author not found"))?;

        if !members.contains(author_id) {
            return Err(ChatError::forbidden("Not a member of this room"));
        }
        validate_content(content, &members)?;

        let id = uuid::Uuid::now_v7().to_string();
        let created_at = now_timestamp();
        let mentions_json =
            serde_json::to_string(&content.mention).unwrap_or_else(|_| "[]".to_string());

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"INSERT INTO messages (id, room_id, author_id, author_name, author_image, type, body, mentions, mention_all, created_at, status)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'ALIVE')"#,
        )
        .bind(&id)
        .bind(room_id)
        .bind(&author.id)
        .bind(&author.name)
        .bind(&author.image)
        .bind(content.message_type.as_str())
        .bind(&content.message)
        .bind(&mentions_json)
        .bind(content.mention_all)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        for user_id in &members {
            sqlx::query("INSERT INTO message_recipients (message_id, user_id) VALUES (?, ?)")
                .bind(&id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        // The author has always read their own message.
        sqlx::query("INSERT INTO message_reads (message_id, user_id, read_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(author_id)
            .bind(&created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(message_id = %id, room_id, author_id, "Message stored");

        Ok(Message {
            id,
            room_id: room_id.to_string(),
            author,
            message_type: content.message_type,
            body: content.message.clone(),
            mentions: content.mention.clone(),
            mention_all: content.mention_all,
            created_at,
            read_by: BTreeSet::from([author_id.to_string()]),
            membership_snapshot: members,
            reactions: empty_reactions(),
            status: MessageStatus::Alive,
        })
    }

    pub async fn fetch_messages(
        &self,
        room_id: &str,
        requester_id: &str,
        page: &MessagePage,
    ) -> ChatResult<MessageFetch> {
        let members = self.room_members(room_id).await?;
        if !members.contains(requester_id) {
            return Err(ChatError::forbidden("Not a member of this room"));
        }

        let limit = page
            .limit
            .unwrap_or(MESSAGE_PAGE_SIZE)
            .clamp(1, MAX_MESSAGE_PAGE_SIZE);
        let before = match page.before.as_deref() {
            Some(raw) => normalize_timestamp(raw)?,
            None => now_timestamp(),
        };

        let unread = sqlx::query_scalar::<_, String>(
            r#"SELECT m.id FROM messages m
               INNER JOIN message_recipients r ON r.message_id = m.id AND r.user_id = ?
               WHERE m.room_id = ?
                 AND NOT EXISTS (
                     SELECT 1 FROM message_reads x WHERE x.message_id = m.id AND x.user_id = ?
                 )
               ORDER BY m.created_at ASC, m.id ASC"#,
        )
        .bind(requester_id)
        .bind(room_id)
        .bind(requester_id)
        .fetch_all(&self.db)
        .await?;

        // Each mark is its own set-union; a concurrent fetch by the same user
        // simply finds the row already present.
        let read_at = now_timestamp();
        let mut newly_read = Vec::new();
        for message_id in &unread {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at) VALUES (?, ?, ?)",
            )
            .bind(message_id)
            .bind(requester_id)
            .bind(&read_at)
            .execute(&self.db)
            .await?;
            if result.rows_affected() > 0 {
                newly_read.push(message_id.clone());
            }
        }

        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ? AND created_at < ? \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );
        let mut rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(room_id)
            .bind(&before)
            .bind(limit + 1)
            .fetch_all(&self.db)
            .await?;

        let has_more = rows.len() as i64 > limit;
        if has_more {
            rows.pop();
        }
        let cursor = rows.last().map(|m| m.created_at.clone());

        let first_unread_id = unread
            .first()
            .cloned()
            .or_else(|| rows.last().map(|m| m.id.clone()));

        let messages = self.hydrate(rows).await?;

        if !newly_read.is_empty() {
            tracing::debug!(room_id, requester_id, marked = newly_read.len(), "Messages marked read");
        }

        Ok(MessageFetch {
            first_unread_id,
            messages,
            has_more,
            cursor,
            newly_read,
        })
    }

    /// Add `user_id` to a reaction slot. Reacting again is a no-op.
    pub async fn add_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        slot: usize,
    ) -> ChatResult<Message> {
        let message = self.reactable(message_id, user_id, slot).await?;

        sqlx::query(
            "INSERT OR IGNORE INTO message_reactions (message_id, slot, user_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(slot as i64)
        .bind(user_id)
        .bind(now_timestamp())
        .execute(&self.db)
        .await?;

        self.load_message(message_id).await
    }

    pub async fn remove_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        slot: usize,
    ) -> ChatResult<Message> {
        let message = self.reactable(message_id, user_id, slot).await?;

        sqlx::query("DELETE FROM message_reactions WHERE message_id = ? AND slot = ? AND user_id = ?")
            .bind(&message.id)
            .bind(slot as i64)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        self.load_message(message_id).await
    }

    /// Soft-delete. Returns the message and whether this call changed it.
    pub async fn delete_message(
        &self,
        message_id: &str,
        requester_id: &str,
    ) -> ChatResult<(Message, bool)> {
        let message = self.load_message(message_id).await?;
        if message.author.id != requester_id {
            return Err(ChatError::forbidden("Only the author can delete a message"));
        }

        let result =
            sqlx::query("UPDATE messages SET status = 'DELETED' WHERE id = ? AND status = 'ALIVE'")
                .bind(message_id)
                .execute(&self.db)
                .await?;
        let changed = result.rows_affected() > 0;

        if changed {
            tracing::info!(message_id, room_id = %message.room_id, "Message deleted");
        }

        Ok((self.load_message(message_id).await?, changed))
    }

    pub async fn load_message(&self, message_id: &str) -> ChatResult<Message> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?");
        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ChatError::not_found("Message not found"))?;

        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or_else(|| ChatError::not_found("Message not found"))
    }

    async fn reactable(&self, message_id: &str, user_id: &str, slot: usize) -> ChatResult<Message> {
        if let Err(e) = validation::validate_reaction_slot(slot) {
            return Err(ChatError::NotFound(e));
        }
        let message = self.load_message(message_id).await?;
        if message.is_deleted() {
            return Err(ChatError::invalid("Cannot react to a deleted message"));
        }
        let is_member = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM room_members WHERE room_id = ? AND user_id = ?",
        )
        .bind(&message.room_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        if is_member == 0 {
            return Err(ChatError::forbidden("Not a member of this room"));
        }
        Ok(message)
    }

    async fn room_members(&self, room_id: &str) -> ChatResult<BTreeSet<String>> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&self.db)
            .await?;
        if exists == 0 {
            return Err(ChatError::not_found("Room not found"));
        }

        let members = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM room_members WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_all(&self.db)
        .await?;
        Ok(members.into_iter().collect())
    }

    async fn hydrate(&self, rows: Vec<MessageRow>) -> ChatResult<Vec<Message>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let in_clause = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");

        let sql = format!(
            "SELECT message_id, user_id FROM message_recipients WHERE message_id IN ({in_clause})"
        );
        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut snapshots: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (message_id, user_id) in query.fetch_all(&self.db).await? {
            snapshots.entry(message_id).or_default().insert(user_id);
        }

        let sql =
            format!("SELECT message_id, user_id FROM message_reads WHERE message_id IN ({in_clause})");
        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut reads: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (message_id, user_id) in query.fetch_all(&self.db).await? {
            reads.entry(message_id).or_default().insert(user_id);
        }

        let sql = format!(
            "SELECT message_id, slot, user_id FROM message_reactions WHERE message_id IN ({in_clause})"
        );
        let mut query = sqlx::query_as::<_, (String, i64, String)>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let mut reactions: HashMap<String, ReactionTable> = HashMap::new();
        for (message_id, slot, user_id) in query.fetch_all(&self.db).await? {
            let Some(slot) = usize::try_from(slot).ok().filter(|s| *s < REACTION_SLOTS) else {
                tracing::warn!(message_id = %message_id, slot, "Ignoring reaction in unknown slot");
                continue;
            };
            reactions
                .entry(message_id)
                .or_insert_with(empty_reactions)[slot]
                .insert(user_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let membership_snapshot = snapshots.remove(&row.id).unwrap_or_default();
                let read_by = reads.remove(&row.id).unwrap_or_default();
                let reactions = reactions.remove(&row.id).unwrap_or_else(empty_reactions);
                into_message(row, membership_snapshot, read_by, reactions)
            })
            .collect())
    }
}

fn into_message(
    row: MessageRow,
    membership_snapshot: BTreeSet<String>,
    read_by: BTreeSet<String>,
    reactions: ReactionTable,
) -> Message {
    let message_type = MessageType::parse(&row.message_type).unwrap_or_default();
    let mentions: Vec<String> = serde_json::from_str(&row.mentions).unwrap_or_default();
    Message {
        author: AuthorSnapshot {
            id: row.author_id,
            name: row.author_name,
            image: row.author_image,
        },
        id: row.id,
        room_id: row.room_id,
        message_type,
        body: row.body,
        mentions,
        mention_all: row.mention_all,
        created_at: row.created_at,
        read_by,
        membership_snapshot,
        reactions,
        status: MessageStatus::parse(&row.status),
    }
}

fn empty_reactions() -> ReactionTable {
    std::array::from_fn(|_| BTreeSet::new())
}

fn validate_content(content: &MessageContent, members: &BTreeSet<String>) -> ChatResult<()> {
    let checked = match content.message_type {
        MessageType::Sub | MessageType::Unsub => {
            return Err(ChatError::invalid("System messages cannot be sent by clients"));
        }
        MessageType::Text => validation::validate_message_content(&content.message),
        MessageType::Image | MessageType::File => {
            validation::validate_attachment_ref(&content.message)
        }
    };
    checked
        .and_then(|_| validation::validate_mentions(&content.mention))
        .map_err(ChatError::InvalidArgument)?;

    if let Some(outsider) = content.mention.iter().find(|m| !members.contains(*m)) {
        return Err(ChatError::invalid(format!(
            "Mentioned user {outsider} is not a member of this room"
        )));
    }
    Ok(())
}

fn normalize_timestamp(raw: &str) -> ChatResult<String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| {
            t.with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        })
        .map_err(|_| ChatError::invalid("before must be an RFC 3339 timestamp"))
}
