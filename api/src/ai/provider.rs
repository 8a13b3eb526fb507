//! OpenAI-compatible chat-completion client.
//!
//! Works against any endpoint speaking the `/chat/completions` protocol
//! (OpenRouter, OpenAI, Ollama, vLLM). Configured from the environment:
//!
//! - `LLM_BASE_URL`: base URL (default: OpenRouter)
//! - `LLM_MODEL`: model identifier
//! - `LLM_API_KEY`: bearer token (optional, empty for local servers)

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LLM_BASE_URL_ENV: &str = "LLM_BASE_URL";
const LLM_MODEL_ENV: &str = "LLM_MODEL";
const LLM_API_KEY_ENV: &str = "LLM_API_KEY";

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Completions can be slow for long plans.
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("chat completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat completion endpoint returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("chat completion returned no usable text")]
    Empty,
}

#[derive(Clone)]
pub struct AiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl AiProvider {
    pub fn from_env() -> Self {
        let base_url =
            env::var(LLM_BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var(LLM_MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_key = env::var(LLM_API_KEY_ENV).ok().filter(|k| !k.is_empty());

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url,
            model,
            api_key,
        }
    }

    /// Send a single user-role message and return the completion text.
    /// Empty or missing content is an error, never a placeholder string.
    pub async fn complete(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.model, "sending chat completion request");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let content = content.trim();
        if content.is_empty() {
            return Err(AiError::Empty);
        }
        Ok(content.to_owned())
    }
}
