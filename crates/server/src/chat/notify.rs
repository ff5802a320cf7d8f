use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use huddle_shared::constants::{DIRECT_ROOM_TITLE, FILE_PREVIEW, IMAGE_PREVIEW};

use crate::config::Config;
use crate::error::ChatResult;
use crate::models::{Message, MessageType};

use super::presence::PresenceTracker;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, notification: &PushNotification) -> anyhow::Result<()>;
}

pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send(&self, token: &str, notification: &PushNotification) -> anyhow::Result<()> {
        tracing::info!(
            token_len = token.len(),
            title = %notification.title,
            "Push notification (no gateway configured)"
        );
        Ok(())
    }
}

pub struct HttpPushSender {
    http_client: reqwest::Client,
    endpoint: url::Url,
    api_key: String,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    notification: &'a PushNotification,
}

impl HttpPushSender {
    pub fn new(endpoint: url::Url, api_key: String) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http_client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(&self, token: &str, notification: &PushNotification) -> anyhow::Result<()> {
        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .json(&PushRequest { to: token, notification });
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

pub fn sender_from_config(config: &Config) -> Arc<dyn PushSender> {
    match &config.push_gateway_url {
        Some(url) => match HttpPushSender::new(url.clone(), config.push_api_key.clone()) {
            Ok(sender) => {
                tracing::info!(gateway = %url, "Push notifications enabled");
                Arc::new(sender)
            }
            Err(e) => {
                tracing::warn!("Push gateway client could not be built, logging instead: {}", e);
                Arc::new(LogPushSender)
            }
        },
        None => Arc::new(LogPushSender),
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotifySummary {
    pub notified: Vec<String>,
    pub viewing: Vec<String>,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Notifier {
    db: SqlitePool,
    presence: Arc<PresenceTracker>,
    push: Arc<dyn PushSender>,
    icon_url: Option<String>,
}

impl Notifier {
    pub fn new(
        db: SqlitePool,
        presence: Arc<PresenceTracker>,
        push: Arc<dyn PushSender>,
        icon_url: &str,
    ) -> Self {
        Self {
            db,
            presence,
            push,
            icon_url: Some(icon_url.to_string()).filter(|u| !u.is_empty()),
        }
    }

    pub async fn register_device(&self, user_id: &str, token: &str) -> ChatResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO device_tokens (user_id, token, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token.trim())
        .bind(crate::db::now_timestamp())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Returns whether a token was removed.
    pub async fn unregister_device(&self, user_id: &str, token: &str) -> ChatResult<bool> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE user_id = ? AND token = ?")
            .bind(user_id)
            .bind(token.trim())
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn notify_absent_members(&self, message: &Message) -> ChatResult<NotifySummary> {
        let mut summary = NotifySummary::default();
        if message.body.trim().is_empty() || message.message_type.is_system() {
            return Ok(summary);
        }

        let room_name = sqlx::query_scalar::<_, String>("SELECT name FROM rooms WHERE id = ?")
            .bind(&message.room_id)
            .fetch_optional(&self.db)
            .await?
            .unwrap_or_default();
        let notification = self.build_notification(&room_name, message);

        let mut targets = Vec::new();
        for member in &message.membership_snapshot {
            if *member == message.author.id {
                continue;
            }
            if self.presence.is_viewing(member, &message.room_id) {
                summary.viewing.push(member.clone());
                continue;
            }
            let tokens = sqlx::query_scalar::<_, String>(
                "SELECT token FROM device_tokens WHERE user_id = ?",
            )
            .bind(member)
            .fetch_all(&self.db)
            .await?;
            if tokens.is_empty() {
                continue;
            }
            summary.notified.push(member.clone());
            targets.extend(tokens);
        }

        let sends = targets.iter().map(|token| {
            let notification = &notification;
            async move { (token, self.push.send(token, notification).await) }
        });
        for (token, result) in futures::future::join_all(sends).await {
            match result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        message_id = %message.id,
                        token_len = token.len(),
                        "Push delivery failed: {}",
                        e
                    );
                }
            }
        }

        tracing::debug!(
            message_id = %message.id,
            notified = summary.notified.len(),
            viewing = summary.viewing.len(),
            delivered = summary.delivered,
            "Notification fallback done"
        );
        Ok(summary)
    }

    pub fn build_notification(&self, room_name: &str, message: &Message) -> PushNotification {
        let title = if room_name.trim().is_empty() {
            DIRECT_ROOM_TITLE.to_string()
        } else {
            room_name.to_string()
        };
        let preview = match message.message_type {
            MessageType::Image => IMAGE_PREVIEW,
            MessageType::File => FILE_PREVIEW,
            _ => message.body.as_str(),
        };
        PushNotification {
            title,
            body: format!("{}: {}", message.author.name, preview),
            image: message.author.image.clone().or_else(|| self.icon_url.clone()),
        }
    }
}
