mod auth;
mod bot;
mod commands;
mod config;
mod moderation;
mod platform;
mod polling;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::{BotMode, Config};
use crate::platform::telegram::TeloxideApi;
use crate::polling::Poller;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,groupwarden=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Mode: {:?}", config.server.mode);
    info!("  Admin: {}", config.telegram.admin_id);
    info!("  Group: {}", config.telegram.group_id);
    info!("  Channel: {}", config.telegram.channel_id);
    info!("  Auth mode: {:?}", config.auth.mode);
    info!("  Link filter: {}", config.moderation.link_filter);

    let api = Arc::new(TeloxideApi::new(&config.telegram.bot_token));

    let bot_username = match api.username().await {
        Ok(name) => name,
        Err(e) => {
            warn!("Could not fetch bot username, /cmd@bot suffixes will be ignored: {:#}", e);
            None
        }
    };
    api.register_commands(commands::COMMANDS).await;

    let mode = config.server.mode;
    let state = Arc::new(AppState::new(config, api.clone(), bot_username)?);

    info!("Bot is starting...");
    match mode {
        BotMode::Webhook => webhook::serve(state).await?,
        BotMode::Polling => {
            api.delete_webhook().await;
            Poller::new(state).run().await?;
        }
    }

    Ok(())
}
