use axum::http::Response;
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

use fitcoach_core::error::{self, ApiError};

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

/// Rate limit for CRUD routes: 120 requests/minute per IP.
pub fn crud_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_millisecond(500) // 120 per minute = 2 per second replenish
            .burst_size(30)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for crud"),
    )
    .error_handler(json_error_handler)
}

/// Rate limit for AI-backed routes: 20 requests/minute per IP. Completions
/// are slow and metered, so this tier is much tighter than CRUD.
pub fn ai_layer() -> RateLimitLayer {
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            .per_second(3) // 20 per minute replenish
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for ai"),
    )
    .error_handler(json_error_handler)
}

/// Render governor rejections in the same structured shape as every other
/// API error, with a Retry-After header when the wait time is known.
fn json_error_handler(err: GovernorError) -> Response<axum::body::Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            Some(wait_time),
            format!("Too many requests. Retry after {wait_time} seconds."),
        ),
        GovernorError::UnableToExtractKey => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => {
            (code, None, msg.unwrap_or_default().to_string())
        }
    };

    let body = ApiError {
        error: error::codes::RATE_LIMITED.to_string(),
        message,
        field: None,
        request_id: uuid::Uuid::now_v7().to_string(),
    };
    let payload = serde_json::to_vec(&body).unwrap_or_default();

    let mut builder = Response::builder()
        .status(status)
        .header("content-type", "application/json");
    if let Some(seconds) = retry_after {
        builder = builder.header("retry-after", seconds.to_string());
    }

    builder
        .body(axum::body::Body::from(payload))
        .expect("rate limit response is statically well-formed")
}
