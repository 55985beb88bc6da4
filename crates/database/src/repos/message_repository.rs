//! Repository for message data access operations.

use crate::entities::{ChatMessage, NewMessage};
use crate::repos::{new_public_id, timestamp_now};
use crate::types::DatabaseResult;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message and return it with its server-assigned id and timestamp.
    pub async fn create(&self, message: &NewMessage) -> DatabaseResult<ChatMessage> {
        let public_id = new_public_id();
        let now = timestamp_now();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, sender_id, recipient_id, text, file, file_name, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(message.text.as_deref())
        .bind(message.file.as_deref())
        .bind(message.file_name.as_deref())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(
            message = %public_id,
            sender = %message.sender_id,
            recipient = %message.recipient_id,
            "stored message"
        );

        Ok(ChatMessage {
            id: result.last_insert_rowid(),
            public_id,
            sender_id: message.sender_id.clone(),
            recipient_id: message.recipient_id.clone(),
            text: message.text.clone(),
            file: message.file.clone(),
            file_name: message.file_name.clone(),
            created_at: now,
        })
    }

    /// Every message exchanged between two users, in either direction, oldest first.
    pub async fn conversation(&self, first: &str, second: &str) -> DatabaseResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, public_id, sender_id, recipient_id, text, file, file_name, created_at
             FROM messages
             WHERE (sender_id = ? AND recipient_id = ?) OR (sender_id = ? AND recipient_id = ?)
             ORDER BY created_at ASC, id ASC",
        )
        .bind(first)
        .bind(second)
        .bind(second)
        .bind(first)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_message).collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn map_message(row: &SqliteRow) -> DatabaseResult<ChatMessage> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        sender_id: row.try_get("sender_id")?,
        recipient_id: row.try_get("recipient_id")?,
        text: row.try_get("text")?,
        file: row.try_get("file")?,
        file_name: row.try_get("file_name")?,
        created_at: row.try_get("created_at")?,
    })
}
