//! SQLite message store.
//!
//! One database file with two tables:
//! - `conversations` — one row per conversation, per owner
//! - `messages` — the append-only message log; `conversation_id` is
//!   nullable (NULL marks a global seed message) and cascade-deletes
//!   with its conversation
//!
//! Round writes go through a single transaction so a round either
//! commits whole or not at all.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use tabletalk_core::error::StoreError;
use tabletalk_core::message::{Conversation, Finality, NewMessage, Role, StoredMessage};
use tabletalk_core::store::MessageStore;

/// Production SQLite backend for the message store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful
    /// for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection; a pool of more
        // than one would hand out empty databases.
        let max_connections = if path == ":memory:" { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite message store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run schema migrations. Idempotent.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id    TEXT NOT NULL,
                title       TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER
                    REFERENCES conversations(id) ON DELETE CASCADE,
                role            TEXT NOT NULL,
                text            TEXT NOT NULL,
                created_at      TEXT,
                finality        INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation \
             ON messages(conversation_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversation index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_owner \
             ON conversations(owner_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("owner index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StoreError> {
        let role_text: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let role: Role = role_text
            .parse()
            .map_err(|e: String| StoreError::QueryFailed(e))?;
        let finality: i64 = row
            .try_get("finality")
            .map_err(|e| StoreError::QueryFailed(format!("finality column: {e}")))?;
        let created_at: Option<DateTime<Utc>> = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        Ok(StoredMessage {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            conversation_id: row
                .try_get("conversation_id")
                .map_err(|e| StoreError::QueryFailed(format!("conversation_id column: {e}")))?,
            role,
            text: row
                .try_get("text")
                .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?,
            created_at,
            finality: Finality::from_i64(finality),
        })
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
        Ok(Conversation {
            id: row
                .try_get("id")
                .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?,
            owner_id: row
                .try_get("owner_id")
                .map_err(|e| StoreError::QueryFailed(format!("owner_id column: {e}")))?,
            title: row
                .try_get("title")
                .map_err(|e| StoreError::QueryFailed(format!("title column: {e}")))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?,
        })
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn append(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let result = sqlx::query(
            "INSERT INTO messages (conversation_id, role, text, created_at, finality) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(message.conversation_id)
        .bind(message.role.as_str())
        .bind(&message.text)
        .bind(message.created_at)
        .bind(message.finality.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to append message: {e}")))?;

        let id = result.last_insert_rowid();
        debug!(id, "Appended message");

        Ok(StoredMessage {
            id,
            conversation_id: message.conversation_id,
            role: message.role,
            text: message.text,
            created_at: message.created_at,
            finality: message.finality,
        })
    }

    async fn append_round(
        &self,
        messages: Vec<NewMessage>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to begin transaction: {e}")))?;

        let mut stored = Vec::with_capacity(messages.len());
        for message in messages {
            let result = sqlx::query(
                "INSERT INTO messages (conversation_id, role, text, created_at, finality) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(message.conversation_id)
            .bind(message.role.as_str())
            .bind(&message.text)
            .bind(message.created_at)
            .bind(message.finality.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to append round message: {e}")))?;

            stored.push(StoredMessage {
                id: result.last_insert_rowid(),
                conversation_id: message.conversation_id,
                role: message.role,
                text: message.text,
                created_at: message.created_at,
                finality: message.finality,
            });
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to commit round: {e}")))?;

        debug!(count = stored.len(), "Committed round");
        Ok(stored)
    }

    async fn context(&self, conversation_id: i64) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, text, created_at, finality \
             FROM messages \
             WHERE conversation_id IS NULL \
                OR (conversation_id = ?1 AND (role = 'user' OR finality IN (1, 2))) \
             ORDER BY id DESC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Context query failed: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn create_conversation(
        &self,
        owner_id: &str,
        title: &str,
    ) -> Result<Conversation, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO conversations (owner_id, title, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(owner_id)
        .bind(title)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("Failed to create conversation: {e}")))?;

        Ok(Conversation {
            id: result.last_insert_rowid(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            created_at,
        })
    }

    async fn count_conversations(&self, owner_id: &str) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM conversations WHERE owner_id = ?1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Count query failed: {e}")))?;

        row.try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))
    }

    async fn list_conversations(&self, owner_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, created_at \
             FROM conversations WHERE owner_id = ?1 ORDER BY id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("List query failed: {e}")))?;

        rows.iter().map(Self::row_to_conversation).collect()
    }

    async fn display_messages(
        &self,
        conversation_id: i64,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, text, created_at, finality \
             FROM messages \
             WHERE conversation_id = ?1 \
               AND (role = 'user' OR (role = 'assistant' AND finality = 1)) \
             ORDER BY created_at ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Display query failed: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }
}
