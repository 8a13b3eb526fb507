use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use fitcoach_core::error::ApiError;
use fitcoach_core::types::{ActivityLevel, ActivityLevelInput, ActivityLevelUpdate};

use crate::error::{AppError, is_fk_violation, is_unique_violation};
use crate::routes::users::DeletedResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/activity-levels", get(list_levels).post(create_level))
        .route(
            "/v1/activity-levels/{level}",
            get(get_level).patch(update_level).delete(delete_level),
        )
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct LevelRow {
    level: i32,
    name: String,
    description: String,
}

impl LevelRow {
    fn into_level(self) -> ActivityLevel {
        ActivityLevel {
            level: self.level,
            name: self.name,
            description: self.description,
        }
    }
}

/// List all activity levels, ordered by level number
#[utoipa::path(
    get,
    path = "/v1/activity-levels",
    responses((status = 200, description = "All levels, ascending", body = Vec<ActivityLevel>)),
    tag = "activity-levels"
)]
pub async fn list_levels(
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivityLevel>>, AppError> {
    let rows = sqlx::query_as::<_, LevelRow>(
        "SELECT level, name, description FROM activity_levels ORDER BY level",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(LevelRow::into_level).collect()))
}

/// Get one activity level by its number
#[utoipa::path(
    get,
    path = "/v1/activity-levels/{level}",
    params(("level" = i32, Path, description = "Level number")),
    responses(
        (status = 200, description = "The level", body = ActivityLevel),
        (status = 404, description = "No such level", body = ApiError)
    ),
    tag = "activity-levels"
)]
pub async fn get_level(
    State(state): State<AppState>,
    Path(level): Path<i32>,
) -> Result<Json<ActivityLevel>, AppError> {
    let row = sqlx::query_as::<_, LevelRow>(
        "SELECT level, name, description FROM activity_levels WHERE level = $1",
    )
    .bind(level)
    .fetch_optional(&state.db)
    .await?;

    match row {
        Some(r) => Ok(Json(r.into_level())),
        None => Err(AppError::not_found(format!("activity level {level}"))),
    }
}

/// Create an activity level
///
/// Administrative. New levels must fit the existing ordering — users pick
/// from whatever this table holds at that moment.
#[utoipa::path(
    post,
    path = "/v1/activity-levels",
    request_body = ActivityLevelInput,
    responses(
        (status = 201, description = "Level created", body = ActivityLevel),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "Level number taken", body = ApiError)
    ),
    tag = "activity-levels"
)]
pub async fn create_level(
    State(state): State<AppState>,
    Json(req): Json<ActivityLevelInput>,
) -> Result<impl IntoResponse, AppError> {
    if req.level <= 0 {
        return Err(AppError::validation("level must be a positive number"));
    }
    if req.name.trim().is_empty() || req.description.trim().is_empty() {
        return Err(AppError::validation("name and description must not be empty"));
    }

    let row = sqlx::query_as::<_, LevelRow>(
        "INSERT INTO activity_levels (level, name, description) \
         VALUES ($1, $2, $3) \
         RETURNING level, name, description",
    )
    .bind(req.level)
    .bind(&req.name)
    .bind(&req.description)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists {
                resource: format!("activity level {}", req.level),
            }
        } else {
            AppError::Database(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(row.into_level())))
}

/// Update an activity level's name or description
#[utoipa::path(
    patch,
    path = "/v1/activity-levels/{level}",
    params(("level" = i32, Path, description = "Level number")),
    request_body = ActivityLevelUpdate,
    responses(
        (status = 200, description = "Updated level", body = ActivityLevel),
        (status = 404, description = "No such level", body = ApiError)
    ),
    tag = "activity-levels"
)]
pub async fn update_level(
    State(state): State<AppState>,
    Path(level): Path<i32>,
    Json(req): Json<ActivityLevelUpdate>,
) -> Result<Json<ActivityLevel>, AppError> {
    let row = sqlx::query_as::<_, LevelRow>(
        "UPDATE activity_levels \
         SET name = COALESCE($2, name), description = COALESCE($3, description) \
         WHERE level = $1 \
         RETURNING level, name, description",
    )
    .bind(level)
    .bind(req.name.as_deref())
    .bind(req.description.as_deref())
    .fetch_optional(&state.db)
    .await?;

    match row {
        Some(r) => Ok(Json(r.into_level())),
        None => Err(AppError::not_found(format!("activity level {level}"))),
    }
}

/// Delete an activity level
///
/// Refused while any user still references the level.
#[utoipa::path(
    delete,
    path = "/v1/activity-levels/{level}",
    params(("level" = i32, Path, description = "Level number")),
    responses(
        (status = 200, description = "Level deleted", body = DeletedResponse),
        (status = 400, description = "Level still referenced", body = ApiError),
        (status = 404, description = "No such level", body = ApiError)
    ),
    tag = "activity-levels"
)]
pub async fn delete_level(
    State(state): State<AppState>,
    Path(level): Path<i32>,
) -> Result<Json<DeletedResponse>, AppError> {
    let result = sqlx::query("DELETE FROM activity_levels WHERE level = $1")
        .bind(level)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if is_fk_violation(&e) {
                AppError::validation(format!(
                    "activity level {level} is still referenced by users"
                ))
            } else {
                AppError::Database(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("activity level {level}")));
    }

    Ok(Json(DeletedResponse {
        message: format!("activity level {level} was deleted"),
    }))
}
