use crate::AppState;
use crate::error::ChatResult;
use crate::middleware::auth::resolve_token;
use crate::models::{AuthUser, Identity};
use crate::ws::frame::Frame;
use crate::ws::gateway::ClientId;
use crate::ws::session::Session;

pub async fn connect(
    state: &AppState,
    client_id: ClientId,
    session: &mut Session,
    credential: Option<String>,
) -> ChatResult<()> {
    let identity = match credential {
        Some(token) => resolve_token(&state.db, &token).await.unwrap_or_else(|e| {
            tracing::error!(client_id, "Token lookup failed: {}", e);
            Identity::Unauthenticated
        }),
        None => Identity::Unauthenticated,
    };

    let user = session.bind(identity)?;
    state.gateway.identify(client_id, &user.id).await;
    tracing::info!(client_id, user_id = %user.id, "STOMP session authenticated");

    let connected = Frame::new("CONNECTED")
        .header("version", "1.2")
        .header("heart-beat", "0,0")
        .header("user-name", user.id.as_str());
    state.gateway.send_to(client_id, &connected).await;
    Ok(())
}

pub async fn disconnect(state: &AppState, session: &mut Session, user: &AuthUser) {
    state.router.leave_room(&user.id).await;
    session.terminate();
    tracing::debug!(user_id = %user.id, "STOMP session disconnected");
}

pub async fn handle_disconnect(state: &AppState, client_id: ClientId) {
    let Some(client) = state.gateway.unregister(client_id, &state.broker).await else {
        return;
    };

    if let Some(user_id) = client.user_id {
        state.router.leave_room(&user_id).await;
        tracing::info!(client_id, %user_id, "STOMP socket closed");
    }
}
