//! Task and project routes

use axum::{
    extract::{Path, State},
    handler::Handler,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use taskdesk_auth::{require_role, AuthUser, ADMIN_ROLE};
use taskdesk_db::{NewTask, TaskPatch};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{
    CreateTaskRequest, DeleteTaskResponse, ProjectResponse, TaskResponse, UpdateTaskRequest,
};

/// Maximum allowed task title length
const MAX_TITLE_LENGTH: usize = 200;

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Title exceeds maximum length of {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

async fn ensure_project_exists(state: &AppState, project_id: i64) -> Result<(), ApiError> {
    if state.db.get_project_by_id(project_id).await?.is_none() {
        return Err(ApiError::BadRequest("Project does not exist".to_string()));
    }
    Ok(())
}

fn task_list(tasks: Vec<taskdesk_db::Task>) -> Json<Vec<TaskResponse>> {
    Json(tasks.into_iter().map(TaskResponse::from).collect())
}

/// GET /api/tasks/my
async fn my_tasks(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state.db.list_tasks_for_user(user.id).await?;
    Ok(task_list(tasks))
}

/// GET /api/tasks/projects
async fn list_projects(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectResponse>>, ApiError> {
    let projects = state.db.list_projects().await?;
    Ok(Json(projects.into_iter().map(ProjectResponse::from).collect()))
}

/// GET /api/tasks (Admin only)
async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state.db.list_tasks().await?;
    Ok(task_list(tasks))
}

/// GET /api/tasks/user/{user_id} (Admin only)
async fn tasks_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state.db.list_tasks_for_user(user_id).await?;
    Ok(task_list(tasks))
}

/// POST /api/tasks (Admin only)
async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let assigned_to = match request.assigned_to {
        Some(id) if !request.title.trim().is_empty() => id,
        _ => {
            return Err(ApiError::BadRequest(
                "Title and assigned_to are required".to_string(),
            ));
        }
    };
    validate_title(&request.title)?;

    if state.db.get_user_by_id(assigned_to).await?.is_none() {
        return Err(ApiError::BadRequest(
            "Assigned user does not exist".to_string(),
        ));
    }
    if let Some(project_id) = request.project_id {
        ensure_project_exists(&state, project_id).await?;
    }

    let task = state
        .db
        .insert_task(NewTask {
            title: request.title.trim().to_string(),
            description: request.description,
            assigned_to,
            project_id: request.project_id,
            priority: request.priority.unwrap_or_default(),
            due_date: request.due_date,
        })
        .await?;

    info!("Created task {} for user {}", task.id, assigned_to);

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// PUT /api/tasks/{id} (Admin or assignee)
async fn update_task(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state
        .db
        .get_task_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    if !user.is_admin() && user.id != task.assigned_to_id {
        return Err(ApiError::Forbidden);
    }

    debug!("Updating task: {}", id);

    if let Some(title) = &request.title {
        validate_title(title)?;
    }
    if let Some(Some(project_id)) = request.project_id {
        ensure_project_exists(&state, project_id).await?;
    }

    let patch = TaskPatch {
        title: request.title.map(|t| t.trim().to_string()),
        description: request.description,
        status: request.status,
        priority: request.priority,
        due_date: request.due_date,
        project_id: request.project_id,
    };
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    if !state.db.update_task(id, patch).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    let updated = state
        .db
        .get_task_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    info!("Updated task: {}", id);

    Ok(Json(updated.into()))
}

/// DELETE /api/tasks/{id} (Admin only)
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteTaskResponse>, ApiError> {
    let deleted = state
        .db
        .delete_task(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    info!("Deleted task: {}", id);

    Ok(Json(DeleteTaskResponse {
        message: "Task deleted successfully".to_string(),
        deleted_task: deleted,
    }))
}

/// Create task routes
///
/// Every route expects the token verifier to run first.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/my", get(my_tasks))
        .route("/api/tasks/projects", get(list_projects))
        .route(
            "/api/tasks",
            get(list_tasks)
                .post(create_task)
                .route_layer(require_role(ADMIN_ROLE)),
        )
        .route(
            "/api/tasks/user/{user_id}",
            get(tasks_by_user).route_layer(require_role(ADMIN_ROLE)),
        )
        .route(
            "/api/tasks/{id}",
            put(update_task).delete(delete_task.layer(require_role(ADMIN_ROLE))),
        )
}
