use super::{ChatStore, StoreError};
use async_trait::async_trait;
use duet_core::{HistoryEntry, RoomId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store. History is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    rooms: RwLock<HashMap<RoomId, Vec<HistoryEntry>>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn message_count(&self, room_id: &RoomId) -> usize {
        self.rooms.read().await.get(room_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn save_message(&self, room_id: &RoomId, entry: &HistoryEntry) -> Result<(), StoreError> {
        self.rooms
            .write()
            .await
            .entry(room_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn load_history(&self, room_id: &RoomId) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut history = self
            .rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .unwrap_or_default();
        // saves run on detached tasks and may land out of order
        history.sort_by_key(|e| e.timestamp);
        Ok(history)
    }
}
