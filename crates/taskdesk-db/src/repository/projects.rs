//! Project operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewProject, Project};

use super::Database;

impl Database {
    /// Insert a new project
    pub async fn insert_project(&self, project: NewProject) -> Result<Project, DbError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO projects (name, description, created_at)
            VALUES (?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&project.name)
        .bind(&project.description)
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DbError::unique_or_sqlite(e, || format!("Project '{}' already exists", project.name))
        })?;

        Ok(Project {
            id: result.get("id"),
            name: project.name,
            description: project.description,
            created_at: now,
        })
    }

    /// Get a project by ID
    pub async fn get_project_by_id(&self, id: i64) -> Result<Option<Project>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, name, description, created_at
            FROM projects
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Project::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all projects
    pub async fn list_projects(&self) -> Result<Vec<Project>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, created_at
            FROM projects
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Project::try_from(row).map_err(DbError::from))
            .collect()
    }
}
