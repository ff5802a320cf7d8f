pub mod devices;
pub mod members;
pub mod messages;
pub mod rooms;

use crate::ws;
use crate::AppState;
use axum::{routing::{delete, get, post, put}, Json, Router};
use huddle_shared::constants::STOMP_ENDPOINT;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Rooms
        .route("/rooms", post(rooms::create_room))
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{roomId}/members", get(members::list_members))
        .route("/rooms/{roomId}/members", post(members::add_members))
        .route("/rooms/{roomId}/members", delete(members::remove_members))
        .route("/rooms/{roomId}/admin", put(members::transfer_admin))
        // Messages
        .route("/rooms/{roomId}/messages", get(messages::list_messages))
        .route("/messages/{messageId}", delete(messages::delete_message))
        .route("/messages/{messageId}/reactions/{slot}", put(messages::add_reaction))
        .route("/messages/{messageId}/reactions/{slot}", delete(messages::remove_reaction))
        // Push endpoints
        .route("/devices", post(devices::register_device))
        .route("/devices", delete(devices::unregister_device));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .route(STOMP_ENDPOINT, get(ws::handler::ws_handler))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
