pub mod openai;
pub mod sse;

use async_trait::async_trait;
use futures::Stream;
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use super::LlmConfig;
use self::openai::OpenAIChatClient;
use crate::error::RelayError;
use crate::models::chat::ChatMessage;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, RelayError>> + Send>>;

/// Streaming chat completion backend.
///
/// `stream_chat` resolves once the upstream has accepted the request; a
/// rejected request (network error, non-success status) is returned as `Err`
/// before any token is produced. The returned stream ends cleanly only when
/// the upstream signalled the end of the completion.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        override_key: Option<&str>
    ) -> Result<TokenStream, RelayError>;

    fn get_model(&self) -> String;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn CompletionClient>, Box<dyn StdError + Send + Sync>> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}
