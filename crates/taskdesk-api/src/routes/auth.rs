//! Login route and password helpers

use axum::{extract::State, routing::post, Json, Router};
use taskdesk_auth::{dummy_hash, hash_password, verify_password, AuthError, Identity};
use taskdesk_db::utils::normalize_email;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{LoginRequest, LoginResponse};

/// Maximum allowed password length (prevent DoS with very large passwords)
pub(super) const MAX_PASSWORD_LENGTH: usize = 256;

/// Hash a password on the blocking pool
pub(super) async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Verify a password on the blocking pool
async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))
}

fn record_login(outcome: &'static str) {
    metrics::counter!("taskdesk_login_attempts_total", "outcome" => outcome).increment(1);
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Email and password required".to_string(),
        ));
    }
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }

    debug!("Login attempt for: {}", email);

    // Unknown accounts are checked against a dummy hash so both failure
    // paths take the same time
    let user = state.db.get_user_by_email(&email).await?;
    let hash_to_verify = user
        .as_ref()
        .map(|u| u.password_hash.clone())
        .unwrap_or_else(|| dummy_hash().to_string());

    let password_valid = verify_password_blocking(request.password, hash_to_verify).await?;

    let user = match (user, password_valid) {
        (Some(u), true) if u.status.is_active() => u,
        _ => {
            record_login("failure");
            warn!("Rejected login attempt for: {}", email);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let token = state.jwt.issue(&Identity {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
    })?;

    record_login("success");
    info!("User {} logged in successfully", user.id);

    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt.token_ttl().num_seconds(),
        user: user.into(),
    }))
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}
