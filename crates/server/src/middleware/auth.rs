use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    extract::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::error::ChatError;
use crate::models::{AuthUser, Identity};
use crate::AppState;

pub const SESSION_COOKIE: &str = "huddle.session_token";

/// Strip the `Bearer ` scheme from an authorization header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a session token to the identity it was issued for.
pub async fn resolve_token(db: &SqlitePool, token: &str) -> Result<Identity, sqlx::Error> {
    if token.is_empty() {
        return Ok(Identity::Unauthenticated);
    }

    let row = sqlx::query_as::<_, (String, String, String)>(
        r#"SELECT u.id, u.username, s.expiresAt
           FROM "session" s
           JOIN "user" u ON u.id = s.userId
           WHERE s.token = ?"#,
    )
    .bind(token)
    .fetch_optional(db)
    .await?;

    let Some((id, username, expires_at)) = row else {
        return Ok(Identity::Unauthenticated);
    };

    let expired = chrono::DateTime::parse_from_rfc3339(&expires_at)
        .map(|t| t < chrono::Utc::now())
        .unwrap_or(true);
    if expired {
        tracing::debug!(user_id = %id, "Rejected expired session token");
        return Ok(Identity::Unauthenticated);
    }

    Ok(Identity::Authenticated(AuthUser { id, username }))
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ChatError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let from_header =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .ok()
                .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string());

        let token = match from_header {
            Some(t) => Some(t),
            None => CookieJar::from_request_parts(parts, state)
                .await
                .ok()
                .and_then(|jar| jar.get(SESSION_COOKIE).map(|c| c.value().to_string())),
        };

        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(ChatError::AuthenticationFailed("Not authenticated".into())),
        };

        match resolve_token(&state.db, &token).await? {
            Identity::Authenticated(user) => Ok(user),
            Identity::Unauthenticated => {
                Err(ChatError::AuthenticationFailed("Invalid session".into()))
            }
        }
    }
}
