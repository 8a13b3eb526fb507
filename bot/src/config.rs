//! Bot configuration from the environment.

use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_COOLDOWN_SECS: u64 = 2;

pub struct BotConfig {
    pub bot_token: String,
    pub api_url: String,
    /// Per-identity cooldown between processed messages
    pub cooldown: Duration,
}

impl BotConfig {
    pub fn from_env() -> Self {
        let bot_token = std::env::var("BOT_TOKEN").expect("BOT_TOKEN must be set");
        let api_url =
            std::env::var("FITCOACH_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let cooldown = std::env::var("BOT_COOLDOWN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_COOLDOWN_SECS));

        Self {
            bot_token,
            api_url,
            cooldown,
        }
    }
}
