//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] taskdesk_db::DbError),

    #[error("Auth error: {0}")]
    Auth(#[from] taskdesk_auth::AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Database(e) => match e {
                taskdesk_db::DbError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                taskdesk_db::DbError::Duplicate(msg) | taskdesk_db::DbError::Conflict(msg) => {
                    (StatusCode::CONFLICT, msg.clone())
                }
                _ => {
                    error!("Database error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            ApiError::Auth(e) => {
                if e.status_code().is_server_error() {
                    error!("Auth error: {}", e);
                }
                (e.status_code(), e.public_message().to_string())
            }
        };

        let body = axum::Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdesk_auth::AuthError;
    use taskdesk_db::DbError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::Database(DbError::Duplicate("x".into())), StatusCode::CONFLICT),
            (ApiError::Database(DbError::Conflict("x".into())), StatusCode::CONFLICT),
            (ApiError::Database(DbError::NotFound("Task 1".into())), StatusCode::NOT_FOUND),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::Auth(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::Auth(AuthError::InsufficientPermissions), StatusCode::FORBIDDEN),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
