//! SQLite repository: connection, schema and built-in roles

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbError;
use crate::models::{ADMIN_ROLE_NAME, DEFAULT_ROLE_NAME};

// Submodules
mod projects;
mod roles;
mod tasks;
mod users;

/// Handle to the TaskDesk SQLite database
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect, migrate and seed the built-in roles
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        db.seed_builtin_roles().await?;
        Ok(db)
    }

    /// Round-trip a trivial query to confirm SQLite is reachable
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        // Schema is created idempotently on every start
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role_id INTEGER REFERENCES roles(id),
                status TEXT NOT NULL DEFAULT 'active',
                avatar_color TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                priority TEXT NOT NULL DEFAULT 'medium',
                due_date TEXT,
                project_id INTEGER REFERENCES projects(id) ON DELETE SET NULL,
                assigned_to INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_role_id ON users(role_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Make sure the roles the API relies on exist
    async fn seed_builtin_roles(&self) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        for (name, description) in [
            (ADMIN_ROLE_NAME, "Full administrative access"),
            (DEFAULT_ROLE_NAME, "Regular user"),
        ] {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO roles (name, description, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(name)
            .bind(description)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}
