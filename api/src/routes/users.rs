use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use fitcoach_core::error::ApiError;
use fitcoach_core::types::{
    ActivityLevel, CreateProfileRequest, Gender, Profile, UpdateProfileRequest,
};
use fitcoach_core::validate;

use crate::error::{AppError, is_fk_violation, is_unique_violation};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users", post(create_user).get(list_users))
        .route(
            "/v1/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

/// Confirmation body for delete endpoints.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DeletedResponse {
    pub message: String,
}

/// Internal row type for sqlx mapping — users joined with their level
#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    username: Option<String>,
    age: i32,
    gender: String,
    height_cm: f64,
    weight_kg: f64,
    activity_level: i32,
    goal: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    level_name: Option<String>,
    level_description: Option<String>,
}

impl ProfileRow {
    fn into_profile(self) -> Result<Profile, AppError> {
        let gender: Gender = self.gender.parse().map_err(|()| {
            AppError::Internal(format!("invalid gender value in database: {}", self.gender))
        })?;
        let activity_level_info = match (self.level_name, self.level_description) {
            (Some(name), Some(description)) => Some(ActivityLevel {
                level: self.activity_level,
                name,
                description,
            }),
            _ => None,
        };

        Ok(Profile {
            id: self.id,
            username: self.username,
            age: self.age,
            gender,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            activity_level: self.activity_level,
            activity_level_info,
            goal: self.goal,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PROFILE_SELECT: &str = "\
    SELECT u.id, u.username, u.age, u.gender, u.height_cm, u.weight_kg, \
           u.activity_level, u.goal, u.created_at, u.updated_at, \
           al.name AS level_name, al.description AS level_description \
    FROM users u \
    LEFT JOIN activity_levels al ON al.level = u.activity_level";

/// Fetch one profile with its resolved activity level.
pub(crate) async fn fetch_profile(db: &PgPool, user_id: i64) -> Result<Profile, AppError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_SELECT} WHERE u.id = $1"))
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    match row {
        Some(r) => r.into_profile(),
        None => Err(AppError::not_found(format!("user {user_id}"))),
    }
}

/// The API enforces the same bounds the conversational validators do, so a
/// client bypassing the dialogue cannot persist an implausible profile.
fn validate_new_profile(req: &CreateProfileRequest) -> Result<(), AppError> {
    validate::check_age(req.age).map_err(|e| AppError::field("age", e))?;
    validate::check_height(req.height_cm).map_err(|e| AppError::field("height_cm", e))?;
    validate::check_weight(req.weight_kg).map_err(|e| AppError::field("weight_kg", e))?;
    Ok(())
}

fn validate_profile_update(req: &UpdateProfileRequest) -> Result<(), AppError> {
    if let Some(age) = req.age {
        validate::check_age(age).map_err(|e| AppError::field("age", e))?;
    }
    if let Some(height_cm) = req.height_cm {
        validate::check_height(height_cm).map_err(|e| AppError::field("height_cm", e))?;
    }
    if let Some(weight_kg) = req.weight_kg {
        validate::check_weight(weight_kg).map_err(|e| AppError::field("weight_kg", e))?;
    }
    Ok(())
}

/// Create a profile
///
/// The ID is the external chat-platform user ID, supplied by the caller.
/// Creating an ID that already exists is a conflict — callers that want
/// create-or-update semantics should fall back to PATCH on 409.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = Profile),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "Activity level does not exist", body = ApiError),
        (status = 409, description = "Profile already exists", body = ApiError)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_new_profile(&req)?;

    sqlx::query(
        "INSERT INTO users (id, username, age, gender, height_cm, weight_kg, activity_level, goal) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(req.id)
    .bind(req.username.as_deref())
    .bind(req.age)
    .bind(req.gender.as_str())
    .bind(req.height_cm)
    .bind(req.weight_kg)
    .bind(req.activity_level)
    .bind(req.goal.as_deref())
    .execute(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists {
                resource: format!("user {}", req.id),
            }
        } else if is_fk_violation(&e) {
            AppError::not_found(format!("activity level {}", req.activity_level))
        } else {
            AppError::Database(e)
        }
    })?;

    let profile = fetch_profile(&state.db, req.id).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Get a profile by ID
#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "External user ID")),
    responses(
        (status = 200, description = "The profile", body = Profile),
        (status = 404, description = "No such user", body = ApiError)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Profile>, AppError> {
    let profile = fetch_profile(&state.db, user_id).await?;
    Ok(Json(profile))
}

/// List all profiles
#[utoipa::path(
    get,
    path = "/v1/users",
    responses((status = 200, description = "All profiles", body = Vec<Profile>)),
    tag = "users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, AppError> {
    let rows = sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_SELECT} ORDER BY u.id"))
        .fetch_all(&state.db)
        .await?;

    let profiles = rows
        .into_iter()
        .map(ProfileRow::into_profile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(profiles))
}

/// Partially update a profile
///
/// Any subset of fields; absent fields are left untouched.
#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "External user ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "No such user or activity level", body = ApiError)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    if req.is_empty() {
        return Err(AppError::validation("no fields to update"));
    }
    validate_profile_update(&req)?;

    let mut query = sqlx::QueryBuilder::new("UPDATE users SET updated_at = now()");
    if let Some(username) = &req.username {
        query.push(", username = ").push_bind(username.as_str());
    }
    if let Some(age) = req.age {
        query.push(", age = ").push_bind(age);
    }
    if let Some(gender) = req.gender {
        query.push(", gender = ").push_bind(gender.as_str());
    }
    if let Some(height_cm) = req.height_cm {
        query.push(", height_cm = ").push_bind(height_cm);
    }
    if let Some(weight_kg) = req.weight_kg {
        query.push(", weight_kg = ").push_bind(weight_kg);
    }
    if let Some(activity_level) = req.activity_level {
        query.push(", activity_level = ").push_bind(activity_level);
    }
    if let Some(goal) = &req.goal {
        query.push(", goal = ").push_bind(goal.as_str());
    }
    query.push(" WHERE id = ").push_bind(user_id);

    let result = query.build().execute(&state.db).await.map_err(|e| {
        if is_fk_violation(&e) {
            AppError::not_found(format!(
                "activity level {}",
                req.activity_level.unwrap_or_default()
            ))
        } else {
            AppError::Database(e)
        }
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("user {user_id}")));
    }

    let profile = fetch_profile(&state.db, user_id).await?;
    Ok(Json(profile))
}

/// Delete a profile
///
/// Cascades the user's training plan.
#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = i64, Path, description = "External user ID")),
    responses(
        (status = 200, description = "Profile deleted", body = DeletedResponse),
        (status = 404, description = "No such user", body = ApiError)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("user {user_id}")));
    }

    Ok(Json(DeletedResponse {
        message: format!("user {user_id} was deleted"),
    }))
}
