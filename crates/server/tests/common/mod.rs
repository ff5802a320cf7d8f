#![allow(dead_code)]

pub mod ws_helpers;

use async_trait::async_trait;
use axum::Router;
use huddle_server::chat::notify::{PushNotification, PushSender};
use huddle_server::config::Config;
use huddle_server::models::RoomType;
use huddle_server::{db, routes, AppState};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::{Arc, Mutex};

/// Create an in-memory SQLite pool with schema applied.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    db::apply_schema(&pool).await.unwrap();

    pool
}

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_path: ":memory:".into(),
        push_gateway_url: None,
        push_api_key: String::new(),
        push_icon_url: "https://cdn.test/icon.png".into(),
        broker_buffer_size: 64,
    }
}

/// Push sender that remembers every notification instead of delivering it.
#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<(String, PushNotification)>>,
    /// Tokens whose delivery should fail.
    pub failing: Mutex<Vec<String>>,
}

impl RecordingPush {
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect();
        tokens.sort();
        tokens
    }

    pub fn notifications(&self) -> Vec<PushNotification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn fail_for(&self, token: &str) {
        self.failing.lock().unwrap().push(token.to_string());
    }
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send(&self, token: &str, notification: &PushNotification) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().iter().any(|t| t == token) {
            anyhow::bail!("gateway rejected {}", token);
        }
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), notification.clone()));
        Ok(())
    }
}

pub fn create_test_state(pool: SqlitePool) -> (Arc<AppState>, Arc<RecordingPush>) {
    let push = Arc::new(RecordingPush::default());
    let state = Arc::new(AppState::new(pool, test_config(), push.clone()));
    (state, push)
}

/// Build a test Axum app with the given pool.
pub fn create_test_app(pool: SqlitePool) -> Router {
    let (state, _) = create_test_state(pool);
    routes::build_router(state)
}

/// Create a test user directly in the database. Returns (user_id, session_token).
pub async fn create_test_user(pool: &SqlitePool, email: &str, name: &str) -> (String, String) {
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO "user" (id, name, username, email, image, createdAt, updatedAt)
           VALUES (?, ?, ?, ?, NULL, ?, ?)"#,
    )
    .bind(&user_id)
    .bind(name)
    .bind(name)
    .bind(email)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();

    let session_token = uuid::Uuid::new_v4().to_string();
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(30)).to_rfc3339();
    insert_session(pool, &user_id, &session_token, &expires_at).await;

    (user_id, session_token)
}

pub async fn insert_session(pool: &SqlitePool, user_id: &str, token: &str, expires_at: &str) {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        r#"INSERT INTO "session" (id, userId, token, expiresAt, createdAt, updatedAt)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();
}

/// Create a group room with `admin` plus `others` as members.
pub async fn create_group_room(state: &AppState, name: &str, admin: &str, others: &[&str]) -> String {
    let room_id = uuid::Uuid::new_v4().to_string();
    let mut members = vec![admin.to_string()];
    members.extend(others.iter().map(|m| m.to_string()));
    state
        .memberships
        .create_membership(&room_id, name, &members, RoomType::Group, admin)
        .await
        .unwrap();
    room_id
}

pub async fn register_device(state: &AppState, user_id: &str, token: &str) {
    state.notifier.register_device(user_id, token).await.unwrap();
}

/// Poll until `check` holds or a second has passed.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    check()
}
