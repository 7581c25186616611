use serde::{ Serialize, Deserialize };
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of the chat `POST`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub preview_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Conversation id: reused from the request or freshly generated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatId {
    Provided(String),
    Generated(String),
}

impl ChatId {
    pub fn resolve(requested: Option<&str>) -> Self {
        match requested {
            Some(id) => ChatId::Provided(id.to_string()),
            None => ChatId::Generated(Uuid::new_v4().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChatId::Provided(id) | ChatId::Generated(id) => id,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            ChatId::Provided(id) | ChatId::Generated(id) => id,
        }
    }
}

/// Persisted conversation, upserted by `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: i64,
    pub path: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRecord {
    /// Builds the transcript written once the completion has finished streaming.
    pub fn from_completion(
        id: ChatId,
        user: &AuthenticatedUser,
        mut messages: Vec<ChatMessage>,
        completion: String,
        created_at: i64
    ) -> Self {
        let title = chat_title(&messages);
        let id = id.into_string();
        let path = chat_path(&id);
        messages.push(ChatMessage::assistant(completion));

        Self {
            id,
            title,
            user_id: user.id.clone(),
            created_at,
            path,
            messages,
        }
    }
}

pub fn chat_title(messages: &[ChatMessage]) -> String {
    messages
        .first()
        .map(|m| m.content.chars().take(TITLE_MAX_CHARS).collect())
        .unwrap_or_default()
}

pub fn chat_path(id: &str) -> String {
    format!("/chat/{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_msg(content: &str) -> ChatMessage {
        ChatMessage { role: Role::User, content: content.to_string() }
    }

    #[test]
    fn title_keeps_short_content_whole() {
        assert_eq!(chat_title(&[user_msg("Hi")]), "Hi");
        let exact = "a".repeat(100);
        assert_eq!(chat_title(&[user_msg(&exact)]), exact);
    }

    #[test]
    fn title_truncates_to_first_hundred_chars() {
        let long = format!("{}{}", "b".repeat(100), "tail");
        assert_eq!(chat_title(&[user_msg(&long)]), "b".repeat(100));

        let wide = "é".repeat(150);
        let title = chat_title(&[user_msg(&wide)]);
        assert_eq!(title.chars().count(), 100);
        assert_eq!(title, "é".repeat(100));
    }

    #[test]
    fn title_is_empty_without_messages() {
        assert_eq!(chat_title(&[]), "");
    }

    #[test]
    fn resolve_reuses_provided_id() {
        let id = ChatId::resolve(Some("abc"));
        assert_eq!(id, ChatId::Provided("abc".to_string()));
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn resolve_generates_distinct_ids() {
        let a = ChatId::resolve(None);
        let b = ChatId::resolve(None);
        assert!(matches!(a, ChatId::Generated(_)));
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn record_appends_single_assistant_message() {
        let user = AuthenticatedUser { id: "u1".to_string() };
        let messages = vec![
            ChatMessage { role: Role::System, content: "be brief".to_string() },
            user_msg("Hi")
        ];
        let record = ChatRecord::from_completion(
            ChatId::resolve(Some("c1")),
            &user,
            messages.clone(),
            "Hello!".to_string(),
            1_700_000_000_000
        );

        assert_eq!(record.id, "c1");
        assert_eq!(record.path, "/chat/c1");
        assert_eq!(record.title, "be brief");
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.messages.len(), 3);
        assert_eq!(&record.messages[..2], &messages[..]);
        assert_eq!(record.messages[2], ChatMessage::assistant("Hello!"));
    }

    #[test]
    fn request_accepts_camel_case_fields() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"Hi"}],"previewToken":"sk-p"}"#
        ).unwrap();
        assert_eq!(req.messages, vec![user_msg("Hi")]);
        assert_eq!(req.preview_token.as_deref(), Some("sk-p"));
        assert!(req.id.is_none());
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = ChatRecord {
            id: "c1".to_string(),
            title: "Hi".to_string(),
            user_id: "u1".to_string(),
            created_at: 42,
            path: "/chat/c1".to_string(),
            messages: vec![user_msg("Hi")],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["createdAt"], 42);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
