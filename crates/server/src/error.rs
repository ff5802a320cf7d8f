use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    UnsupportedOperation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ChatError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::InvalidArgument(_) | ChatError::UnsupportedOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            ChatError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Forbidden(_) => "FORBIDDEN",
            ChatError::NotFound(_) => "NOT_FOUND",
            ChatError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ChatError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            ChatError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            ChatError::Database(_) => "INTERNAL",
        }
    }

    /// Message safe to show to a client. Storage details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ChatError::Database(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.client_message(),
                "code": self.code(),
            })),
        )
            .into_response()
    }
}
