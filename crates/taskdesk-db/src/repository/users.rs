//! User operations

use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::error::DbError;
use crate::models::{NewUser, User, UserPatch};
use crate::repository::Database;
use crate::utils::normalize_email;

const USER_COLUMNS: &str = r#"
    SELECT u.id, u.name, u.email, u.password_hash, u.role_id, r.name AS role,
           u.status, u.avatar_color, u.created_at, u.updated_at
    FROM users u
    LEFT JOIN roles r ON u.role_id = r.id
"#;

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user
    ///
    /// The email is stored lowercased; a taken email is [`DbError::Duplicate`].
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();
        let email = normalize_email(&user.email);

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, role_id, status, avatar_color, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(user.status.as_str())
        .bind(&user.avatar_color)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::unique_or_sqlite(e, || format!("User '{}' already exists", email)))?;

        let id: i64 = result.get("id");

        self.get_user_by_id(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("User {}", id)))
    }

    /// Get a user by email, ignoring case
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("{} WHERE u.email = ? LIMIT 1", USER_COLUMNS))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        let result = sqlx::query(&format!("{} WHERE u.id = ? LIMIT 1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(&format!("{} ORDER BY u.name ASC, u.id ASC", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// List users holding a role
    pub async fn list_users_by_role(&self, role_id: i64) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(&format!(
            "{} WHERE u.role_id = ? ORDER BY u.name ASC, u.id ASC",
            USER_COLUMNS
        ))
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Apply a partial update
    ///
    /// Returns `Ok(false)` when no user has the given ID. An empty patch
    /// is a no-op that still reports whether the user exists.
    pub async fn update_user(&self, id: i64, patch: UserPatch) -> Result<bool, DbError> {
        if patch.is_empty() {
            return Ok(self.get_user_by_id(id).await?.is_some());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut assignments = builder.separated(", ");
        if let Some(name) = patch.name {
            assignments.push("name = ").push_bind_unseparated(name);
        }
        let email = patch.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            assignments.push("email = ").push_bind_unseparated(email.clone());
        }
        if let Some(password_hash) = patch.password_hash {
            assignments
                .push("password_hash = ")
                .push_bind_unseparated(password_hash);
        }
        if let Some(role_id) = patch.role_id {
            assignments.push("role_id = ").push_bind_unseparated(role_id);
        }
        if let Some(status) = patch.status {
            assignments.push("status = ").push_bind_unseparated(status.as_str());
        }
        if let Some(avatar_color) = patch.avatar_color {
            assignments
                .push("avatar_color = ")
                .push_bind_unseparated(avatar_color);
        }
        assignments
            .push("updated_at = ")
            .push_bind_unseparated(Utc::now().to_rfc3339());

        builder.push(" WHERE id = ").push_bind(id);

        let result = builder.build().execute(&self.pool).await.map_err(|e| {
            DbError::unique_or_sqlite(e, || {
                format!("User '{}' already exists", email.unwrap_or_default())
            })
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user
    pub async fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{DEFAULT_ROLE_NAME, UserPatch, UserStatus};
    use crate::repository::test_support::{insert_user, test_db};
    use crate::DbError;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let (db, _dir) = test_db().await;
        assert!(!db.has_users().await.unwrap());

        let ana = insert_user(&db, "Ana", "admin").await;
        assert_eq!(ana.role, "admin");
        assert_eq!(ana.status, UserStatus::Active);
        assert!(db.has_users().await.unwrap());

        let by_email = db.get_user_by_email("ana@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, ana.id);
        assert!(db.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;

        let mut again = crate::models::NewUser {
            name: "Other".to_string(),
            email: ana.email.clone(),
            password_hash: "x".to_string(),
            role_id: None,
            status: UserStatus::Active,
            avatar_color: None,
        };
        assert!(matches!(db.insert_user(again.clone()).await, Err(DbError::Duplicate(_))));

        again.email = "other@example.com".to_string();
        let other = db.insert_user(again).await.unwrap();
        let clash = UserPatch {
            email: Some(ana.email.clone()),
            ..Default::default()
        };
        assert!(matches!(db.update_user(other.id, clash).await, Err(DbError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_insert_is_duplicate() {
        let (db, _dir) = test_db().await;
        let new_user = |name: &str| crate::models::NewUser {
            name: name.to_string(),
            email: "dana@example.com".to_string(),
            password_hash: "x".to_string(),
            role_id: None,
            status: UserStatus::Active,
            avatar_color: None,
        };

        let (a, b) = tokio::join!(
            db.insert_user(new_user("Dana")),
            db.insert_user(new_user("Dana Two"))
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(DbError::Duplicate(_))))
        );
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let (db, _dir) = test_db().await;
        let new_user = |email: &str| crate::models::NewUser {
            name: "Ana".to_string(),
            email: email.to_string(),
            password_hash: "x".to_string(),
            role_id: None,
            status: UserStatus::Active,
            avatar_color: None,
        };

        let ana = db.insert_user(new_user(" Ana@Example.com")).await.unwrap();
        assert_eq!(ana.email, "ana@example.com");
        assert!(matches!(
            db.insert_user(new_user("ANA@example.com")).await,
            Err(DbError::Duplicate(_))
        ));

        let found = db.get_user_by_email("ANA@EXAMPLE.COM").await.unwrap().unwrap();
        assert_eq!(found.id, ana.id);

        let bruno = insert_user(&db, "Bruno", "user").await;
        let clash = UserPatch {
            email: Some("Ana@example.COM".to_string()),
            ..Default::default()
        };
        assert!(matches!(db.update_user(bruno.id, clash).await, Err(DbError::Duplicate(_))));

        let rename = UserPatch {
            email: Some("Bruno.Silva@Example.com".to_string()),
            ..Default::default()
        };
        assert!(db.update_user(bruno.id, rename).await.unwrap());
        let bruno = db.get_user_by_id(bruno.id).await.unwrap().unwrap();
        assert_eq!(bruno.email, "bruno.silva@example.com");
    }

    #[tokio::test]
    async fn test_missing_role_reports_default() {
        let (db, _dir) = test_db().await;
        let user = insert_user(&db, "Bruno", "no-such-role").await;
        assert_eq!(user.role_id, None);
        assert_eq!(user.role, DEFAULT_ROLE_NAME);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let (db, _dir) = test_db().await;
        let ana = insert_user(&db, "Ana", "user").await;

        let patch = UserPatch {
            name: Some("Ana Maria".to_string()),
            avatar_color: Some(Some("#ff8800".to_string())),
            ..Default::default()
        };
        assert!(db.update_user(ana.id, patch).await.unwrap());

        let updated = db.get_user_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, ana.email);
        assert_eq!(updated.avatar_color.as_deref(), Some("#ff8800"));

        let clear = UserPatch {
            avatar_color: Some(None),
            status: Some(UserStatus::Inactive),
            ..Default::default()
        };
        assert!(db.update_user(ana.id, clear).await.unwrap());
        let updated = db.get_user_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(updated.avatar_color, None);
        assert_eq!(updated.status, UserStatus::Inactive);
        assert_eq!(updated.name, "Ana Maria");
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_user() {
        let (db, _dir) = test_db().await;
        let patch = UserPatch {
            name: Some("Ghost".to_string()),
            ..Default::default()
        };
        assert!(!db.update_user(404, patch).await.unwrap());
        assert!(!db.delete_user(404).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_ordered_by_name() {
        let (db, _dir) = test_db().await;
        insert_user(&db, "Carla", "user").await;
        insert_user(&db, "Ana", "admin").await;
        insert_user(&db, "Bruno", "user").await;

        let names: Vec<String> = db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Ana", "Bruno", "Carla"]);

        let user_role = db.get_role_by_name("user").await.unwrap().unwrap();
        let holders = db.list_users_by_role(user_role.id).await.unwrap();
        assert_eq!(holders.len(), 2);
    }
}
