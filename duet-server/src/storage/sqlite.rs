use super::{ChatStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_core::{DisplayName, HistoryEntry, RoomId};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS rooms (
        room_id    TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_history (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id      TEXT NOT NULL REFERENCES rooms(room_id),
        display_name TEXT NOT NULL,
        body         TEXT NOT NULL,
        file_ref     TEXT,
        sent_at      INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_history_room ON chat_history(room_id, sent_at)",
];

#[derive(sqlx::FromRow)]
struct HistoryRow {
    display_name: String,
    body: String,
    file_ref: Option<String>,
    /// Unix millis.
    sent_at: i64,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            display_name: DisplayName::parse(&row.display_name)
                .unwrap_or_else(|_| DisplayName::unknown()),
            body: row.body,
            file_ref: row.file_ref,
            timestamp: DateTime::from_timestamp_millis(row.sent_at).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    /// Opens (creating if needed) the database and applies the schema.
    ///
    /// For `sqlite::memory:` pass `max_connections = 1`: every connection
    /// would otherwise see its own empty database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "Chat store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn save_message(&self, room_id: &RoomId, entry: &HistoryEntry) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO rooms (room_id, created_at) VALUES (?, ?) ON CONFLICT(room_id) DO NOTHING")
            .bind(room_id.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO chat_history (room_id, display_name, body, file_ref, sent_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(room_id.as_str())
        .bind(entry.display_name.as_str())
        .bind(&entry.body)
        .bind(entry.file_ref.as_deref())
        .bind(entry.timestamp.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_history(&self, room_id: &RoomId) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT display_name, body, file_ref, sent_at
             FROM chat_history
             WHERE room_id = ?
             ORDER BY sent_at ASC, id ASC",
        )
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}
