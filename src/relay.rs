use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::Utc;
use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::io;
use std::sync::Arc;
use tokio::sync::{ mpsc, oneshot };
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::Authenticator;
use crate::error::RelayError;
use crate::history::ChatStore;
use crate::llm::chat::{ CompletionClient, TokenStream };
use crate::models::chat::{ AuthenticatedUser, ChatId, ChatMessage, ChatRecord, ChatRequest };

const RELAY_BUFFER: usize = 32;

pub type BodyStream = ReceiverStream<Result<Bytes, io::Error>>;

/// What happened to the transcript once the relay finished.
#[derive(Debug)]
pub enum PersistOutcome {
    Saved(ChatRecord),
    /// The stream never completed (upstream error or caller disconnect).
    Aborted,
    Failed(RelayError),
}

pub struct RelayResponse {
    pub body: BodyStream,
    pub persisted: JoinHandle<PersistOutcome>,
}

#[derive(Clone)]
pub struct ChatRelay {
    authenticator: Arc<dyn Authenticator>,
    completion: Arc<dyn CompletionClient>,
    store: Arc<dyn ChatStore>,
}

impl ChatRelay {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        completion: Arc<dyn CompletionClient>,
        store: Arc<dyn ChatStore>
    ) -> Self {
        Self { authenticator, completion, store }
    }

    /// Authorizes, then parses, then relays.
    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Result<RelayResponse, RelayError> {
        let user = self.authorize(headers).await?;
        let request = parse_request(body)?;
        self.relay(user, request).await
    }

    pub async fn authorize(&self, headers: &HeaderMap) -> Result<AuthenticatedUser, RelayError> {
        match self.authenticator.authenticate(headers).await {
            Some(user) => Ok(user),
            None => {
                debug!("Rejecting chat request without a valid session");
                Err(RelayError::Unauthorized)
            }
        }
    }

    pub async fn relay(
        &self,
        user: AuthenticatedUser,
        request: ChatRequest
    ) -> Result<RelayResponse, RelayError> {
        let ChatRequest { messages, id, preview_token } = request;
        info!(
            "Relaying chat for user {} to {} ({} messages, id: {})",
            user.id,
            self.completion.get_model(),
            messages.len(),
            id.as_deref().unwrap_or("new")
        );

        let upstream = self.completion.stream_chat(&messages, preview_token.as_deref()).await?;

        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        let (done_tx, done_rx) = oneshot::channel();
        spawn_forwarder(upstream, tx, done_tx);

        let store = Arc::clone(&self.store);
        let persisted = tokio::spawn(async move {
            persist_on_completion(done_rx, store, user, messages, id).await
        });

        Ok(RelayResponse {
            body: ReceiverStream::new(rx),
            persisted,
        })
    }
}

pub fn parse_request(body: &[u8]) -> Result<ChatRequest, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::InvalidRequest(e.to_string()))
}

/// Pipes upstream tokens to the caller. `done` resolves with the full text only
/// when the upstream stream ends cleanly; it is dropped on every other path.
fn spawn_forwarder(
    mut upstream: TokenStream,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    done: oneshot::Sender<String>
) {
    tokio::spawn(async move {
        let mut completion = String::new();

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    info!("Caller disconnected; dropping upstream stream");
                    return;
                }
                item = upstream.next() => item,
            };

            match next {
                Some(Ok(token)) => {
                    completion.push_str(&token);
                    if tx.send(Ok(Bytes::from(token))).await.is_err() {
                        info!("Caller disconnected; dropping upstream stream");
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!("Upstream stream failed: {}", e);
                    let _ = tx.send(Err(io::Error::other(e.to_string()))).await;
                    return;
                }
                None => {
                    break;
                }
            }
        }

        debug!("Upstream stream completed ({} bytes)", completion.len());
        let _ = done.send(completion);
    });
}

async fn persist_on_completion(
    done: oneshot::Receiver<String>,
    store: Arc<dyn ChatStore>,
    user: AuthenticatedUser,
    messages: Vec<ChatMessage>,
    requested_id: Option<String>
) -> PersistOutcome {
    let completion = match done.await {
        Ok(text) => text,
        Err(_) => {
            info!("Chat for user {} aborted before completion; nothing persisted", user.id);
            return PersistOutcome::Aborted;
        }
    };

    let chat_id = ChatId::resolve(requested_id.as_deref());
    match &chat_id {
        ChatId::Provided(_) => debug!("Overwriting chat {} for user {}", chat_id.as_str(), user.id),
        ChatId::Generated(_) => debug!("Assigned new chat id {} for user {}", chat_id.as_str(), user.id),
    }

    let record = ChatRecord::from_completion(
        chat_id,
        &user,
        messages,
        completion,
        Utc::now().timestamp_millis()
    );

    match store.upsert_chat(&record).await {
        Ok(()) => {
            info!("Saved chat {} for user {}", record.id, record.user_id);
            PersistOutcome::Saved(record)
        }
        Err(e) => {
            error!("Failed to persist chat {} for user {}: {}", record.id, record.user_id, e);
            PersistOutcome::Failed(e)
        }
    }
}
