//! Role operations

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::DbError;
use crate::models::{NewRole, Role, RoleUpdate};

use super::Database;

const ROLE_COLUMNS: &str = r#"
    SELECT r.id, r.name, r.description, r.created_at, r.updated_at,
           (SELECT COUNT(*) FROM users u WHERE u.role_id = r.id) AS user_count
    FROM roles r
"#;

impl Database {
    /// Insert a new role
    pub async fn insert_role(&self, role: NewRole) -> Result<Role, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO roles (name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&role.name)
        .bind(&role.description)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::unique_or_sqlite(e, || format!("Role '{}' already exists", role.name)))?;

        let id: i64 = result.get("id");

        Ok(Role {
            id,
            name: role.name,
            description: role.description,
            user_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a role by ID
    pub async fn get_role_by_id(&self, id: i64) -> Result<Option<Role>, DbError> {
        let result = sqlx::query(&format!("{} WHERE r.id = ?", ROLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Role::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a role by name
    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, DbError> {
        let result = sqlx::query(&format!("{} WHERE r.name = ?", ROLE_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Role::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all roles
    pub async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
        let rows = sqlx::query(&format!("{} ORDER BY r.name ASC", ROLE_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Role::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Rename or re-describe a role
    pub async fn update_role(&self, id: i64, update: RoleUpdate) -> Result<bool, DbError> {
        if update.is_empty() {
            return Ok(self.get_role_by_id(id).await?.is_some());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE roles SET ");
        let mut assignments = builder.separated(", ");
        if let Some(name) = &update.name {
            assignments.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = update.description {
            assignments
                .push("description = ")
                .push_bind_unseparated(description);
        }
        assignments
            .push("updated_at = ")
            .push_bind_unseparated(Utc::now().to_rfc3339());

        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await.map_err(|e| {
            DbError::unique_or_sqlite(e, || {
                format!("Role '{}' already exists", update.name.unwrap_or_default())
            })
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a role
    ///
    /// Fails with [`DbError::Conflict`] while any user still holds it.
    pub async fn delete_role(&self, id: i64) -> Result<bool, DbError> {
        let holders: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE role_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?
            .get("count");
        if holders > 0 {
            return Err(DbError::Conflict(format!(
                "Role is assigned to {} user(s)",
                holders
            )));
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{NewRole, RoleUpdate};
    use crate::repository::test_support::{insert_user, test_db};
    use crate::DbError;

    fn auditor() -> NewRole {
        NewRole {
            name: "auditor".to_string(),
            description: Some("Read-only reviewer".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (db, _dir) = test_db().await;
        let role = db.insert_role(auditor()).await.unwrap();
        assert_eq!(role.user_count, 0);

        let names: Vec<String> = db.list_roles().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["admin", "auditor", "user"]);

        assert!(matches!(db.insert_role(auditor()).await, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_concurrent_create_reports_duplicate() {
        let (db, _dir) = test_db().await;
        let (a, b) = tokio::join!(db.insert_role(auditor()), db.insert_role(auditor()));

        assert!(a.is_ok() != b.is_ok());
        assert!(matches!(a.and(b), Err(DbError::Duplicate(_))));
        assert_eq!(db.list_roles().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_user_count() {
        let (db, _dir) = test_db().await;
        insert_user(&db, "Ana", "admin").await;
        insert_user(&db, "Bruno", "user").await;
        insert_user(&db, "Carla", "user").await;

        let user_role = db.get_role_by_name("user").await.unwrap().unwrap();
        assert_eq!(user_role.user_count, 2);
    }

    #[tokio::test]
    async fn test_rename_and_describe() {
        let (db, _dir) = test_db().await;
        let role = db.insert_role(auditor()).await.unwrap();

        let update = RoleUpdate {
            name: Some("reviewer".to_string()),
            description: Some(None),
        };
        assert!(db.update_role(role.id, update).await.unwrap());

        let updated = db.get_role_by_id(role.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "reviewer");
        assert_eq!(updated.description, None);

        let clash = RoleUpdate {
            name: Some("admin".to_string()),
            description: None,
        };
        assert!(matches!(db.update_role(role.id, clash).await, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_delete_blocked_while_assigned() {
        let (db, _dir) = test_db().await;
        let role = db.insert_role(auditor()).await.unwrap();
        let user = insert_user(&db, "Dora", "auditor").await;
        assert_eq!(user.role, "auditor");

        assert!(matches!(db.delete_role(role.id).await, Err(DbError::Conflict(_))));

        db.delete_user(user.id).await.unwrap();
        assert!(db.delete_role(role.id).await.unwrap());
        assert!(db.get_role_by_id(role.id).await.unwrap().is_none());
        assert!(!db.delete_role(role.id).await.unwrap());
    }
}
