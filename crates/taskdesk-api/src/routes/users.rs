//! User management routes

use axum::{
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use taskdesk_auth::{require_role, AuthUser, ADMIN_ROLE};
use taskdesk_db::utils::normalize_email;
use taskdesk_db::{NewUser, UserPatch, DEFAULT_ROLE_NAME};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::auth::{hash_password_blocking, MAX_PASSWORD_LENGTH};
use super::types::{CreateUserRequest, UpdateUserRequest, UserResponse};

// ==================== Input Validation ====================

/// Maximum allowed display name length
const MAX_NAME_LENGTH: usize = 100;
/// Maximum allowed email length
const MAX_EMAIL_LENGTH: usize = 254;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Name exceeds maximum length of {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Email exceeds maximum length of {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err(ApiError::BadRequest(format!("Invalid email: {}", email))),
    }
}

/// Validate password length
fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Look up a role ID by name
async fn resolve_role(state: &AppState, name: &str) -> Result<i64, ApiError> {
    state
        .db
        .get_role_by_name(name)
        .await?
        .map(|r| r.id)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid role: {}", name)))
}

// ==================== User Routes ====================

/// GET /api/users (Admin only)
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.list_users().await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/users (Admin only)
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let email = normalize_email(&request.email);
    validate_name(&request.name)?;
    validate_email(&email)?;
    validate_password(&request.password)?;

    debug!("Creating user: {}", email);

    let role_name = request.role.as_deref().unwrap_or(DEFAULT_ROLE_NAME);
    let role_id = resolve_role(&state, role_name).await?;

    let password_hash = hash_password_blocking(request.password).await?;

    let user = state
        .db
        .insert_user(NewUser {
            name: request.name.trim().to_string(),
            email,
            password_hash,
            role_id: Some(role_id),
            status: request.status.unwrap_or_default(),
            avatar_color: request.avatar_color,
        })
        .await?;

    info!("Created user: {}", user.id);

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/users/me
async fn get_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let me = state
        .db
        .get_user_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(me.into()))
}

/// GET /api/users/{id} (Admin or self)
async fn get_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, ApiError> {
    if !user.is_admin_or_self(id) {
        return Err(ApiError::Forbidden);
    }

    let found = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(found.into()))
}

/// PUT /api/users/{id} (Admin or self; role and status are admin only)
async fn update_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if !user.is_admin_or_self(id) {
        return Err(ApiError::Forbidden);
    }
    if (request.role.is_some() || request.status.is_some()) && !user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    debug!("Updating user: {}", id);

    let mut patch = UserPatch {
        status: request.status,
        avatar_color: request.avatar_color,
        ..Default::default()
    };

    if let Some(name) = request.name {
        validate_name(&name)?;
        patch.name = Some(name.trim().to_string());
    }
    if let Some(email) = request.email {
        let email = normalize_email(&email);
        validate_email(&email)?;
        patch.email = Some(email);
    }
    if let Some(role_name) = &request.role {
        patch.role_id = Some(Some(resolve_role(&state, role_name).await?));
    }
    if let Some(password) = request.password {
        validate_password(&password)?;
        patch.password_hash = Some(hash_password_blocking(password).await?);
    }

    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    if !state.db.update_user(id, patch).await? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let updated = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!("Updated user: {}", updated.id);

    Ok(Json(updated.into()))
}

/// DELETE /api/users/{id} (Admin only)
async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if user.id == id {
        return Err(ApiError::BadRequest(
            "Administrators cannot delete their own account".to_string(),
        ));
    }

    debug!("Deleting user: {}", id);

    if state.db.delete_user(id).await? {
        info!("Deleted user: {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("User not found".to_string()))
    }
}

/// Create user routes
///
/// Every route expects the token verifier to run first.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/users",
            get(list_users)
                .post(create_user)
                .route_layer(require_role(ADMIN_ROLE)),
        )
        .route("/api/users/me", get(get_me))
        .route(
            "/api/users/{id}",
            get(get_user)
                .put(update_user)
                .delete(delete_user.layer(require_role(ADMIN_ROLE))),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@x.com").is_ok());
        assert!(validate_email("ana").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("ana@").is_err());
        assert!(validate_email("an a@x.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ana").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"a".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }
}
