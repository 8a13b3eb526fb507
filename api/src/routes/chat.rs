use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use fitcoach_core::error::ApiError;
use fitcoach_core::types::{AiRequest, ChatAnswer};

use crate::ai::prompt;
use crate::error::AppError;
use crate::routes::users::fetch_profile;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/chat", post(chat))
}

/// Ask the AI coach a question
///
/// The stored profile is embedded in the prompt so answers are tailored to
/// the user. Off-topic questions are redirected by the prompt instructions.
#[utoipa::path(
    post,
    path = "/v1/chat",
    request_body = AiRequest,
    responses(
        (status = 200, description = "The coach's answer", body = ChatAnswer),
        (status = 400, description = "Empty message", body = ApiError),
        (status = 404, description = "No such user", body = ApiError),
        (status = 502, description = "Model produced no usable text", body = ApiError)
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<AiRequest>,
) -> Result<Json<ChatAnswer>, AppError> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation {
            message: "content must not be empty".to_string(),
            field: Some("content".to_string()),
        })?;

    let profile = fetch_profile(&state.db, req.user_id).await?;
    let prompt = prompt::chat_prompt(&profile, content);
    let answer = state.ai.complete(&prompt).await?;

    Ok(Json(ChatAnswer { answer }))
}
