//! Task operations

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::DbError;
use crate::models::{NewTask, Task, TaskPatch, TaskStatus, TaskSummary};
use crate::utils::format_date;

use super::Database;

const TASK_COLUMNS: &str = r#"
    SELECT t.id, t.title, t.description, t.status, t.priority, t.due_date,
           t.project_id, p.name AS project,
           t.assigned_to AS assigned_to_id, u.name AS assigned_to,
           t.created_at, t.updated_at
    FROM tasks t
    LEFT JOIN users u ON t.assigned_to = u.id
    LEFT JOIN projects p ON t.project_id = p.id
"#;

impl Database {
    /// Insert a new task
    ///
    /// The caller is expected to have checked that the assignee and
    /// project exist.
    pub async fn insert_task(&self, task: NewTask) -> Result<Task, DbError> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (title, description, status, priority, due_date, project_id, assigned_to, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(TaskStatus::Pending.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_date.as_ref().map(format_date))
        .bind(task.project_id)
        .bind(task.assigned_to)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = result.get("id");

        self.get_task_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Task {}", id)))
    }

    /// Get a task by ID
    pub async fn get_task_by_id(&self, id: i64) -> Result<Option<Task>, DbError> {
        let result = sqlx::query(&format!("{} WHERE t.id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Task::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all tasks, newest first
    pub async fn list_tasks(&self) -> Result<Vec<Task>, DbError> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY t.created_at DESC, t.id DESC",
            TASK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Task::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// List tasks assigned to a user, newest first
    pub async fn list_tasks_for_user(&self, user_id: i64) -> Result<Vec<Task>, DbError> {
        let rows = sqlx::query(&format!(
            "{} WHERE t.assigned_to = ? ORDER BY t.created_at DESC, t.id DESC",
            TASK_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Task::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update
    ///
    /// Returns `Ok(false)` when no task has the given ID.
    pub async fn update_task(&self, id: i64, patch: TaskPatch) -> Result<bool, DbError> {
        if patch.is_empty() {
            return Ok(self.get_task_by_id(id).await?.is_some());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET ");
        let mut assignments = builder.separated(", ");
        if let Some(title) = patch.title {
            assignments.push("title = ").push_bind_unseparated(title);
        }
        if let Some(description) = patch.description {
            assignments
                .push("description = ")
                .push_bind_unseparated(description);
        }
        if let Some(status) = patch.status {
            assignments.push("status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(priority) = patch.priority {
            assignments
                .push("priority = ")
                .push_bind_unseparated(priority.as_str());
        }
        if let Some(due_date) = patch.due_date {
            assignments
                .push("due_date = ")
                .push_bind_unseparated(due_date.as_ref().map(format_date));
        }
        if let Some(project_id) = patch.project_id {
            assignments
                .push("project_id = ")
                .push_bind_unseparated(project_id);
        }
        assignments
            .push("updated_at = ")
            .push_bind_unseparated(Utc::now().to_rfc3339());

        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a task, returning what was removed
    pub async fn delete_task(&self, id: i64) -> Result<Option<TaskSummary>, DbError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? RETURNING id, title")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result.map(|row| TaskSummary {
            id: row.get("id"),
            title: row.get("title"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::{NewProject, NewTask, TaskPatch, TaskPriority, TaskStatus};
    use crate::repository::test_support::{insert_user, test_db};
    use crate::repository::Database;

    fn new_task(title: &str, assigned_to: i64) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            assigned_to,
            project_id: None,
            priority: TaskPriority::default(),
            due_date: None,
        }
    }

    async fn project(db: &Database, name: &str) -> i64 {
        db.insert_project(NewProject {
            name: name.to_string(),
            description: None,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_insert_joins_names() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;
        let ops = project(&db, "Operations").await;

        let task = db
            .insert_task(NewTask {
                project_id: Some(ops),
                due_date: NaiveDate::from_ymd_opt(2025, 8, 12),
                ..new_task("Daily checklist", ana.id)
            })
            .await
            .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.assigned_to.as_deref(), Some("Ana"));
        assert_eq!(task.project.as_deref(), Some("Operations"));
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 8, 12));
    }

    #[tokio::test]
    async fn test_tasks_scoped_to_assignee() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;
        let bruno = insert_user(&db, "Bruno", "user").await;

        db.insert_task(new_task("first", ana.id)).await.unwrap();
        db.insert_task(new_task("second", ana.id)).await.unwrap();
        db.insert_task(new_task("other", bruno.id)).await.unwrap();

        let titles: Vec<String> = db
            .list_tasks_for_user(ana.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["second", "first"]);
        assert_eq!(db.list_tasks().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_patch_only_touches_given_fields() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;
        let ops = project(&db, "Operations").await;
        let task = db
            .insert_task(NewTask {
                description: Some("check the hull".to_string()),
                project_id: Some(ops),
                ..new_task("Daily checklist", ana.id)
            })
            .await
            .unwrap();

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert!(db.update_task(task.id, patch).await.unwrap());
        let updated = db.get_task_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.title, "Daily checklist");
        assert_eq!(updated.description.as_deref(), Some("check the hull"));
        assert_eq!(updated.project_id, Some(ops));

        let clear = TaskPatch {
            description: Some(None),
            project_id: Some(None),
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        assert!(db.update_task(task.id, clear).await.unwrap());
        let updated = db.get_task_by_id(task.id).await.unwrap().unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.project_id, None);
        assert_eq!(updated.project, None);
        assert_eq!(updated.priority, TaskPriority::High);
        assert_eq!(updated.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_delete_returns_summary() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;
        let task = db.insert_task(new_task("Upload report", ana.id)).await.unwrap();

        let removed = db.delete_task(task.id).await.unwrap().unwrap();
        assert_eq!(removed.id, task.id);
        assert_eq!(removed.title, "Upload report");
        assert!(db.delete_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_user_removes_their_tasks() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;
        db.insert_task(new_task("orphan", ana.id)).await.unwrap();

        assert!(db.delete_user(ana.id).await.unwrap());
        assert!(db.list_tasks().await.unwrap().is_empty());
    }
}
