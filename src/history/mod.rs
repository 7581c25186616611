mod memory;
mod redis;

pub use memory::MemoryChatStore;
pub use self::redis::RedisChatStore;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;
use crate::cli::Args;
use crate::error::RelayError;
use crate::models::chat::ChatRecord;

/// Chat transcript storage. Writes are insert-or-replace keyed by `record.id`.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), RelayError>;
}

pub fn create_chat_store(
    args: &Args
) -> Result<Arc<dyn ChatStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = RedisChatStore::new(&args.history_host, &args.history_redis_prefix)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryChatStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_chat_store(
    args: &Args
) -> Result<Arc<dyn ChatStore>, Box<dyn Error + Send + Sync>> {
    info!("Chats will be stored in: {} at {}", args.history_type, args.history_host);
    create_chat_store(args)
}
