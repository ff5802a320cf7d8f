use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use huddle_shared::validation::validate_device_token;

use crate::error::{ChatError, ChatResult};
use crate::models::{AuthUser, DeviceTokenRequest};
use crate::AppState;

/// POST /api/devices
pub async fn register_device(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<DeviceTokenRequest>,
) -> ChatResult<StatusCode> {
    validate_device_token(&body.token).map_err(ChatError::InvalidArgument)?;
    state.notifier.register_device(&user.id, &body.token).await?;
    tracing::debug!(user_id = %user.id, "Device registered");
    Ok(StatusCode::CREATED)
}

/// DELETE /api/devices
pub async fn unregister_device(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<DeviceTokenRequest>,
) -> ChatResult<StatusCode> {
    if !state.notifier.unregister_device(&user.id, &body.token).await? {
        return Err(ChatError::not_found("Device token not registered"));
    }
    Ok(StatusCode::NO_CONTENT)
}
