//! User repository for database operations.

use crate::entities::User;
use crate::repos::{new_public_id, timestamp_now};
use crate::types::DatabaseResult;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

const USER_COLUMNS: &str = "id, public_id, username, password_hash, created_at";

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user. A taken username surfaces as `DatabaseError::Duplicate`.
    pub async fn create(&self, username: &str, password_hash: &str) -> DatabaseResult<User> {
        let public_id = new_public_id();
        let now = timestamp_now();

        let result = sqlx::query(
            "INSERT INTO users (public_id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(username)
        .bind(password_hash)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(user = %public_id, username, "registered user");

        Ok(User {
            id: result.last_insert_rowid(),
            public_id,
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
            created_at: now,
        })
    }

    pub async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_user(&row)).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_user(&row)).transpose()
    }

    pub async fn exists(&self, public_id: &str) -> DatabaseResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE public_id = ?")
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// All users ordered by registration time.
    pub async fn list_all(&self) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_user).collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn map_user(row: &SqliteRow) -> DatabaseResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}
