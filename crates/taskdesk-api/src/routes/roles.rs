//! Role management routes (Admin only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use taskdesk_auth::{require_role, ADMIN_ROLE};
use taskdesk_db::{NewRole, Role, RoleUpdate, ADMIN_ROLE_NAME, DEFAULT_ROLE_NAME};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{CreateRoleRequest, RoleResponse, UpdateRoleRequest, UserResponse};

/// Maximum allowed role name length
const MAX_ROLE_NAME_LENGTH: usize = 64;

/// Validate role name format and length
fn validate_role_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::BadRequest("Role name cannot be empty".to_string()));
    }
    if name.len() > MAX_ROLE_NAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Role name exceeds maximum length of {} characters",
            MAX_ROLE_NAME_LENGTH
        )));
    }
    // Role names are compared verbatim by the role gate
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(ApiError::BadRequest(
            "Role name can only contain lowercase letters, digits, underscores, and hyphens"
                .to_string(),
        ));
    }
    Ok(())
}

fn is_builtin(role: &Role) -> bool {
    role.name == ADMIN_ROLE_NAME || role.name == DEFAULT_ROLE_NAME
}

async fn find_role(state: &AppState, id: i64) -> Result<Role, ApiError> {
    state
        .db
        .get_role_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Role not found".to_string()))
}

/// GET /api/roles
async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<RoleResponse>>, ApiError> {
    let roles = state.db.list_roles().await?;

    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// POST /api/roles
async fn create_role(
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    let name = request.name.trim().to_string();
    validate_role_name(&name)?;

    debug!("Creating role: {}", name);

    let role = state
        .db
        .insert_role(NewRole {
            name,
            description: request.description,
        })
        .await?;

    info!("Created role: {}", role.name);

    Ok((StatusCode::CREATED, Json(role.into())))
}

/// PUT /api/roles/{id}
async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, ApiError> {
    let role = find_role(&state, id).await?;

    let name = request.name.map(|n| n.trim().to_string());
    if let Some(name) = &name {
        validate_role_name(name)?;
        if is_builtin(&role) && *name != role.name {
            return Err(ApiError::BadRequest(format!(
                "Built-in role '{}' cannot be renamed",
                role.name
            )));
        }
    }

    let update = RoleUpdate {
        name,
        description: request.description,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    state.db.update_role(id, update).await?;
    let updated = find_role(&state, id).await?;

    info!("Updated role: {}", updated.name);

    Ok(Json(updated.into()))
}

/// DELETE /api/roles/{id}
async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let role = find_role(&state, id).await?;
    if is_builtin(&role) {
        return Err(ApiError::BadRequest(format!(
            "Built-in role '{}' cannot be deleted",
            role.name
        )));
    }

    if state.db.delete_role(id).await? {
        info!("Deleted role: {}", role.name);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Role not found".to_string()))
    }
}

/// GET /api/roles/{id}/users
async fn role_users(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let role = find_role(&state, id).await?;
    let users = state.db.list_users_by_role(role.id).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create role routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/roles", get(list_roles).post(create_role))
        .route("/api/roles/{id}", axum::routing::put(update_role).delete(delete_role))
        .route("/api/roles/{id}/users", get(role_users))
        .route_layer(require_role(ADMIN_ROLE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_role_name() {
        assert!(validate_role_name("auditor").is_ok());
        assert!(validate_role_name("team-lead_2").is_ok());
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name("Admin").is_err());
        assert!(validate_role_name("two words").is_err());
        assert!(validate_role_name(&"a".repeat(MAX_ROLE_NAME_LENGTH + 1)).is_err());
    }
}
