use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Route the chat relay is mounted on.
    #[arg(long, env = "CHAT_PATH", default_value = "/api/chat")]
    pub chat_path: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    // --- Completion Service Args ---
    /// Base URL of the OpenAI-compatible completion API.
    #[arg(long, env = "CHAT_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub chat_base_url: String,

    /// API key used when a request carries no preview token.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name sent with every completion request.
    #[arg(long, env = "CHAT_MODEL", default_value = "gpt-3.5-turbo")]
    pub chat_model: String,

    // --- History Store Args ---
    /// Chat store type (redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "redis")]
    pub history_type: String,

    /// Chat store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis chat keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "chat:")]
    pub history_redis_prefix: String,

    // --- Session Args ---
    /// Secret used to verify signed session cookies.
    #[arg(long, env = "SESSION_SECRET")]
    pub session_secret: String,

    /// Name of the cookie carrying the session token.
    #[arg(long, env = "SESSION_COOKIE", default_value = "session")]
    pub session_cookie: String,

    /// Maximum session age in seconds. 0 disables the age check.
    #[arg(long, env = "SESSION_MAX_AGE", default_value = "604800")] // 7 days
    pub session_max_age: i64,
}
