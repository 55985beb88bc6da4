//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    ConnectionError(String),

    #[error("database migration error: {0}")]
    MigrationError(String),

    #[error("database query error: {0}")]
    QueryError(String),

    #[error("duplicate entity: {0}")]
    Duplicate(String),

    #[error("entity not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                DatabaseError::Duplicate(db_error.message().to_string())
            }
            sqlx::Error::RowNotFound => DatabaseError::NotFound(error.to_string()),
            _ => DatabaseError::QueryError(error.to_string()),
        }
    }
}
