use async_trait::async_trait;
use crate::error::RelayError;
use crate::history::ChatStore;
use crate::models::chat::ChatRecord;
use log::debug;
use redis::Client;

pub struct RedisChatStore {
    client: Client,
    key_prefix: String,
}

impl RedisChatStore {
    pub fn new(host: &str, key_prefix: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: Client::open(host)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn chat_key(&self, id: &str) -> String {
        format!("{}{}", self.key_prefix, id)
    }
}

fn user_index_key(user_id: &str) -> String {
    format!("user:chat:{}", user_id)
}

#[async_trait]
impl ChatStore for RedisChatStore {
    async fn upsert_chat(&self, record: &ChatRecord) -> Result<(), RelayError> {
        let mut conn = self.get_connection().await?;
        let key = self.chat_key(&record.id);
        let payload = serde_json::to_string(record)?;

        redis::pipe()
            .atomic()
            .set(&key, payload)
            .ignore()
            .zadd(user_index_key(&record.user_id), &key, record.created_at)
            .ignore()
            .query_async::<_, ()>(&mut conn).await?;

        debug!("Upserted {} for user {}", key, record.user_id);
        Ok(())
    }
}
