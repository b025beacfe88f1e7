use async_trait::async_trait;
use duet_core::{HistoryEntry, RoomId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// System of record for chat messages, keyed by plain room identifier.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn save_message(&self, room_id: &RoomId, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// Oldest first.
    async fn load_history(&self, room_id: &RoomId) -> Result<Vec<HistoryEntry>, StoreError>;
}
