//! Errors raised by the persistence layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Anything SQLite or the pool reports, including row decoding
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    /// A unique email or role name is already taken
    #[error("{0}")]
    Duplicate(String),

    /// The row is still referenced, e.g. a role assigned to users
    #[error("{0}")]
    Conflict(String),
}

impl DbError {
    /// Map a UNIQUE constraint violation to [`DbError::Duplicate`]
    pub(crate) fn unique_or_sqlite(err: sqlx::Error, message: impl FnOnce() -> String) -> Self {
        if err
            .as_database_error()
            .is_some_and(|e| e.is_unique_violation())
        {
            DbError::Duplicate(message())
        } else {
            DbError::Sqlite(err)
        }
    }
}
