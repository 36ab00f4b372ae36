//! HTTP-facing error type.
//!
//! Handlers return `Result<_, AppError>`; the `IntoResponse` impl turns every
//! variant into a status code plus a `{"error": "..."}` body. Storage and
//! other unexpected failures collapse into a logged, generic 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::chatbot::ChatbotError;

/// Result alias used by handlers and the store.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// Missing, unknown or expired credentials.
    #[error("authentication required")]
    Unauthorized,

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// The addressed entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The request conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// An external provider failed.
    #[error("upstream service error: {0}")]
    Upstream(String),

    /// A feature is not configured on this deployment.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ChatbotError> for AppError {
    fn from(err: ChatbotError) -> Self {
        match err {
            ChatbotError::NotConfigured => AppError::Unavailable(err.to_string()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let (status, json) = body_json(AppError::not_found("topic")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "topic not found");
    }

    #[tokio::test]
    async fn test_database_error_is_masked() {
        let err = AppError::from(rusqlite::Error::InvalidQuery);
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "internal server error");
    }

    #[test]
    fn test_chatbot_error_mapping() {
        assert_eq!(
            AppError::from(ChatbotError::NotConfigured).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::from(ChatbotError::EmptyResponse).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
