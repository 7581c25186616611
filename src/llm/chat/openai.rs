use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE } };
use serde::Serialize;
use std::error::Error as StdError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::sse::{ SseDecoder, SseEvent };
use super::{ CompletionClient, TokenStream };
use crate::error::RelayError;
use crate::llm::{ LlmConfig, TEMPERATURE };
use crate::models::chat::ChatMessage;

const CHAT_COMPLETIONS_ROUTE: &str = "/chat/completions";

pub struct OpenAIChatClient {
    http: HttpClient,
    config: LlmConfig,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

impl OpenAIChatClient {
    pub fn new(config: LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self { http, config })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(config.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), CHAT_COMPLETIONS_ROUTE)
    }
}

#[async_trait]
impl CompletionClient for OpenAIChatClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        override_key: Option<&str>
    ) -> Result<TokenStream, RelayError> {
        let api_key = self.config.credential(override_key).ok_or(RelayError::MissingCredential)?;

        let req = OpenAIChatRequest {
            model: &self.config.completion_model,
            messages,
            temperature: TEMPERATURE,
            stream: true,
        };

        let url = self.endpoint();
        info!("Forwarding {} messages to {} ({})", messages.len(), url, self.config.completion_model);

        let resp = self.http.post(&url).bearer_auth(api_key).json(&req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text().await
                .unwrap_or_else(|e| format!("failed to read upstream error body: {}", e));
            return Err(RelayError::Upstream { status: status.as_u16(), body });
        }

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = resp.bytes_stream();

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();

            loop {
                let chunk_result = tokio::select! {
                    _ = tx.closed() => {
                        debug!("Token receiver dropped; abandoning upstream stream");
                        return;
                    }
                    next = bytes.next() => match next {
                        Some(chunk_result) => chunk_result,
                        None => break,
                    },
                };

                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(RelayError::Stream(e.to_string()))).await;
                        return;
                    }
                };

                for event in decoder.push(&chunk) {
                    match event {
                        SseEvent::Token(token) => {
                            if tx.send(Ok(token)).await.is_err() {
                                debug!("Token receiver dropped; abandoning upstream stream");
                                return;
                            }
                        }
                        SseEvent::Error(message) => {
                            let _ = tx.send(Err(RelayError::Stream(message))).await;
                            return;
                        }
                        SseEvent::Done => {
                            return;
                        }
                    }
                }
            }

            match decoder.finish() {
                Some(SseEvent::Token(token)) => {
                    let _ = tx.send(Ok(token)).await;
                }
                Some(SseEvent::Error(message)) => {
                    let _ = tx.send(Err(RelayError::Stream(message))).await;
                }
                Some(SseEvent::Done) | None => {}
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn get_model(&self) -> String {
        self.config.completion_model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use httpmock::prelude::*;
    use std::time::Duration;
    use tokio::io::{ AsyncReadExt, AsyncWriteExt };
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn client_for(server: &MockServer, api_key: Option<&str>) -> OpenAIChatClient {
        OpenAIChatClient::new(LlmConfig {
            api_key: api_key.map(str::to_string),
            base_url: server.base_url(),
            ..Default::default()
        }).unwrap()
    }

    fn hi() -> Vec<ChatMessage> {
        vec![ChatMessage { role: Role::User, content: "Hi".to_string() }]
    }

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo!\"}}]}\n\n",
        "data: [DONE]\n\n"
    );

    async fn collect(mut stream: TokenStream) -> Vec<Result<String, RelayError>> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn streams_decoded_tokens() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-env")
                .json_body_partial(
                    r#"{"model":"gpt-3.5-turbo","temperature":0.7,"stream":true,"messages":[{"role":"user","content":"Hi"}]}"#
                );
            then.status(200).header("content-type", "text/event-stream").body(SSE_BODY);
        }).await;

        let client = client_for(&server, Some("sk-env"));
        let stream = client.stream_chat(&hi(), None).await.unwrap();
        let tokens: Vec<String> = collect(stream).await
            .into_iter()
            .map(|t| t.unwrap())
            .collect();

        assert_eq!(tokens, vec!["Hel", "lo!"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn preview_token_is_used_as_bearer() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST).header("authorization", "Bearer sk-preview");
            then.status(200).body("data: [DONE]\n\n");
        }).await;

        let client = client_for(&server, Some("sk-env"));
        let stream = client.stream_chat(&hi(), Some("sk-preview")).await.unwrap();
        assert!(collect(stream).await.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(401).body("invalid api key");
        }).await;

        let client = client_for(&server, Some("sk-bad"));
        match client.stream_chat(&hi(), None).await {
            Err(RelayError::Upstream { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected upstream failure"),
        }
    }

    #[tokio::test]
    async fn missing_credential_skips_the_call() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        }).await;

        let client = client_for(&server, None);
        let result = client.stream_chat(&hi(), None).await;
        assert!(matches!(result, Err(RelayError::MissingCredential)));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_upstream_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();

        // Sends one token, then stays silent until the client hangs up.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut head = Vec::new();
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(
                concat!(
                    "HTTP/1.1 200 OK\r\n",
                    "content-type: text/event-stream\r\n",
                    "connection: close\r\n\r\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n"
                ).as_bytes()
            ).await.unwrap();

            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = closed_tx.send(());
        });

        let client = OpenAIChatClient::new(LlmConfig {
            api_key: Some("sk-env".to_string()),
            base_url: format!("http://{}", addr),
            ..Default::default()
        }).unwrap();

        let mut stream = client.stream_chat(&hi(), None).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        drop(stream);

        timeout(Duration::from_secs(5), closed_rx).await
            .expect("upstream connection left open after the stream was dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn in_stream_error_ends_with_err() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(POST);
            then.status(200).body(
                concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                    "data: {\"error\":{\"message\":\"overloaded\"}}\n\n"
                )
            );
        }).await;

        let client = client_for(&server, Some("sk-env"));
        let items = collect(client.stream_chat(&hi(), None).await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("Hel"));
        assert!(matches!(items[1], Err(RelayError::Stream(_))));
    }
}
