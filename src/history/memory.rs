use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::RelayError;
use crate::history::ChatStore;
use crate::models::chat::ChatRecord;

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryChatStore {
    chats: RwLock<HashMap<String, ChatRecord>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<ChatRecord> {
        self.chats.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.chats.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.read().await.is_empty()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), RelayError> {
        self.chats.write().await.insert(record.id.clone(), record.clone());
        Ok(())
    }
}
