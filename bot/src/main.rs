use std::sync::Arc;

use teloxide::Bot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod backend;
mod client;
mod config;
mod dialogue;
mod state;
mod telegram;
mod throttle;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitcoach_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::BotConfig::from_env();

    let api = client::ApiClient::new(config.api_url.clone());
    let engine = Arc::new(dialogue::Engine::new(state::DialogueStore::new(), api));
    let throttle = Arc::new(throttle::Throttle::new(config.cooldown));

    tracing::info!("Fitcoach bot starting (api: {})", config.api_url);
    let bot = Bot::new(config.bot_token.clone());
    telegram::run(bot, engine, throttle).await;
}
