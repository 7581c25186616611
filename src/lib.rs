pub mod auth;
pub mod cli;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;

use auth::SessionAuthenticator;
use cli::Args;
use history::initialize_chat_store;
use llm::LlmConfig;
use llm::chat::new_client;
use log::{ info, warn };
use relay::ChatRelay;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub fn build_relay(args: &Args) -> Result<ChatRelay, Box<dyn Error + Send + Sync>> {
    let llm_config = LlmConfig::from_args(args);
    if llm_config.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; only requests carrying a preview token will succeed.");
    }

    let authenticator = Arc::new(SessionAuthenticator::from_args(args));
    let completion = new_client(&llm_config)?;
    let store = initialize_chat_store(args)?;

    Ok(ChatRelay::new(authenticator, completion, store))
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Path: {}", args.chat_path);
    info!("Completion Base URL: {}", args.chat_base_url);
    info!("Completion Model: {}", args.chat_model);
    info!("History Store Type: {}", args.history_type);
    info!("History Store Host: {}", args.history_host);
    info!("Session Cookie: {}", args.session_cookie);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let relay = Arc::new(build_relay(&args)?);
    let server = Server::new(args.server_addr.clone(), relay, args.clone());
    server.run().await?;

    Ok(())
}
