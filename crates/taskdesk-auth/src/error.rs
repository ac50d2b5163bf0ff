//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Bad signature and expiry are deliberately the same variant
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Missing authorization header")]
    MissingAuthHeader,

    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    /// A role gate ran on a request the token verifier never saw
    #[error("Not authenticated")]
    MissingAuthContext,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Invalid signing configuration: {0}")]
    Configuration(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MissingAuthContext => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::Configuration(_) | AuthError::PasswordHash(_) | AuthError::Jwt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand back to the client
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid credentials",
            AuthError::InvalidToken => "Invalid or expired token",
            AuthError::MissingAuthHeader => "No token provided",
            AuthError::InvalidAuthHeader => "Invalid authorization format",
            AuthError::MissingAuthContext => "Not authenticated",
            AuthError::InsufficientPermissions => "Forbidden: insufficient privileges",
            AuthError::Configuration(_) | AuthError::PasswordHash(_) | AuthError::Jwt(_) => {
                "Internal server error"
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = axum::Json(json!({
            "error": self.public_message()
        }));

        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_kinds_share_status() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::InvalidToken,
            AuthError::MissingAuthHeader,
            AuthError::InvalidAuthHeader,
            AuthError::MissingAuthContext,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AuthError::PasswordHash("salt too short".to_string());
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
