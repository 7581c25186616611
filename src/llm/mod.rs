pub mod chat;

use crate::cli::Args;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.7;

/// Upstream completion settings, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub completion_model: String,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            completion_model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl LlmConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
        }
    }

    /// Picks the bearer credential for one call: a non-empty override wins
    /// over the configured key.
    pub fn credential<'a>(&'a self, override_key: Option<&'a str>) -> Option<&'a str> {
        override_key
            .filter(|k| !k.is_empty())
            .or(self.api_key.as_deref())
    }
}
