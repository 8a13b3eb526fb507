use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use fitcoach_core::error::ApiError;
use fitcoach_core::types::{AiRequest, PlanInput, TrainingPlan};
use fitcoach_core::validate;

use crate::ai::prompt;
use crate::error::{AppError, is_fk_violation};
use crate::routes::users::{DeletedResponse, fetch_profile};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/users/{id}/plan",
            get(get_plan).put(put_plan).delete(delete_plan),
        )
        .route("/v1/plans/generate", post(generate_plan))
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct PlanRow {
    id: i64,
    user_id: i64,
    plan_description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PlanRow {
    fn into_plan(self) -> TrainingPlan {
        TrainingPlan {
            id: self.id,
            user_id: self.user_id,
            plan_description: self.plan_description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

async fn fetch_plan(db: &PgPool, user_id: i64) -> Result<Option<TrainingPlan>, AppError> {
    let row = sqlx::query_as::<_, PlanRow>(
        "SELECT id, user_id, plan_description, created_at, updated_at \
         FROM training_plans WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(row.map(PlanRow::into_plan))
}

/// Create-or-update in one statement, so a regeneration can never leave the
/// user without a plan.
async fn upsert_plan(
    db: &PgPool,
    user_id: i64,
    plan_description: &str,
) -> Result<TrainingPlan, AppError> {
    let row = sqlx::query_as::<_, PlanRow>(
        "INSERT INTO training_plans (user_id, plan_description) \
         VALUES ($1, $2) \
         ON CONFLICT (user_id) DO UPDATE \
         SET plan_description = EXCLUDED.plan_description, updated_at = now() \
         RETURNING id, user_id, plan_description, created_at, updated_at",
    )
    .bind(user_id)
    .bind(plan_description)
    .fetch_one(db)
    .await
    .map_err(|e| {
        if is_fk_violation(&e) {
            AppError::not_found(format!("user {user_id}"))
        } else {
            AppError::Database(e)
        }
    })?;

    Ok(row.into_plan())
}

/// Get a user's training plan
#[utoipa::path(
    get,
    path = "/v1/users/{id}/plan",
    params(("id" = i64, Path, description = "External user ID")),
    responses(
        (status = 200, description = "The plan", body = TrainingPlan),
        (status = 404, description = "No plan for this user", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn get_plan(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<TrainingPlan>, AppError> {
    match fetch_plan(&state.db, user_id).await? {
        Some(plan) => Ok(Json(plan)),
        None => Err(AppError::not_found(format!("plan for user {user_id}"))),
    }
}

/// Manually create or replace a user's plan
///
/// The text must mention every day of the week — partial weeks are rejected
/// with the missing days named.
#[utoipa::path(
    put,
    path = "/v1/users/{id}/plan",
    params(("id" = i64, Path, description = "External user ID")),
    request_body = PlanInput,
    responses(
        (status = 200, description = "Stored plan", body = TrainingPlan),
        (status = 400, description = "Incomplete week coverage", body = ApiError),
        (status = 404, description = "No such user", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn put_plan(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<PlanInput>,
) -> Result<Json<TrainingPlan>, AppError> {
    validate::check_week_coverage(&req.plan_description)
        .map_err(|e| AppError::field("plan_description", e))?;

    let plan = upsert_plan(&state.db, user_id, &req.plan_description).await?;
    Ok(Json(plan))
}

/// Delete a user's plan
#[utoipa::path(
    delete,
    path = "/v1/users/{id}/plan",
    params(("id" = i64, Path, description = "External user ID")),
    responses(
        (status = 200, description = "Plan deleted", body = DeletedResponse),
        (status = 404, description = "No plan for this user", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn delete_plan(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    let result = sqlx::query("DELETE FROM training_plans WHERE user_id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("plan for user {user_id}")));
    }

    Ok(Json(DeletedResponse {
        message: format!("plan for user {user_id} was deleted"),
    }))
}

/// Generate a plan with the AI
///
/// Builds the plan prompt from the stored profile (and the previous plan,
/// if any), calls the model, and stores the result — creating the plan row
/// or updating it in place.
#[utoipa::path(
    post,
    path = "/v1/plans/generate",
    request_body = AiRequest,
    responses(
        (status = 200, description = "Generated plan", body = TrainingPlan),
        (status = 404, description = "No such user", body = ApiError),
        (status = 502, description = "Model produced no usable text", body = ApiError)
    ),
    tag = "plans"
)]
pub async fn generate_plan(
    State(state): State<AppState>,
    Json(req): Json<AiRequest>,
) -> Result<Json<TrainingPlan>, AppError> {
    let profile = fetch_profile(&state.db, req.user_id).await?;
    let previous = fetch_plan(&state.db, req.user_id)
        .await?
        .map(|p| p.plan_description);

    let extra = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    let prompt = prompt::plan_prompt(&profile, previous.as_deref(), extra);
    let text = state.ai.complete(&prompt).await?;

    let plan = upsert_plan(&state.db, req.user_id, &text).await?;
    Ok(Json(plan))
}
