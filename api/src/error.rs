use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fitcoach_core::error::{self, ApiError};
use fitcoach_core::validate::ValidationError;

use crate::ai::provider::AiError;

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
    },
    /// Referenced entity absent (404)
    NotFound { resource: String },
    /// Identity/natural key already taken (409)
    AlreadyExists { resource: String },
    /// The completion call yielded no usable text (502)
    Generation { message: String },
    /// Database error (500)
    Database(sqlx::Error),
    /// Internal error (500)
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn field(field: &str, err: ValidationError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            field: Some(field.to_owned()),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
        }
    }
}

/// Postgres unique-constraint violation (duplicate key).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505"))
}

/// Postgres foreign-key violation (referenced row absent, or still referenced).
pub fn is_fk_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503"))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation { message, field } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    request_id,
                },
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} not found"),
                    field: None,
                    request_id,
                },
            ),
            AppError::AlreadyExists { resource } => (
                StatusCode::CONFLICT,
                ApiError {
                    error: error::codes::ALREADY_EXISTS.to_string(),
                    message: format!("{resource} already exists"),
                    field: None,
                    request_id,
                },
            ),
            AppError::Generation { message } => {
                tracing::warn!("generation failed: {}", message);
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError {
                        error: error::codes::GENERATION_FAILED.to_string(),
                        message: "The AI did not produce a usable answer".to_string(),
                        field: None,
                        request_id,
                    },
                )
            }
            AppError::Database(err) => {
                tracing::error!("database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        request_id,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        request_id,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<AiError> for AppError {
    fn from(err: AiError) -> Self {
        AppError::Generation {
            message: err.to_string(),
        }
    }
}
