use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod ai;
mod error;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fitcoach API",
        version = "0.1.0",
        description = "CRUD and AI-coaching backend for the fitcoach Telegram bot: \
                       user profiles, activity levels, and AI-generated weekly training plans."
    ),
    paths(
        routes::health::health_check,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::list_users,
        routes::users::update_user,
        routes::users::delete_user,
        routes::activity_levels::list_levels,
        routes::activity_levels::get_level,
        routes::activity_levels::create_level,
        routes::activity_levels::update_level,
        routes::activity_levels::delete_level,
        routes::plans::get_plan,
        routes::plans::put_plan,
        routes::plans::delete_plan,
        routes::plans::generate_plan,
        routes::chat::chat,
    ),
    components(schemas(
        HealthResponse,
        routes::users::DeletedResponse,
        fitcoach_core::error::ApiError,
        fitcoach_core::types::Profile,
        fitcoach_core::types::Gender,
        fitcoach_core::types::CreateProfileRequest,
        fitcoach_core::types::UpdateProfileRequest,
        fitcoach_core::types::ActivityLevel,
        fitcoach_core::types::ActivityLevelInput,
        fitcoach_core::types::ActivityLevelUpdate,
        fitcoach_core::types::TrainingPlan,
        fitcoach_core::types::PlanInput,
        fitcoach_core::types::AiRequest,
        fitcoach_core::types::ChatAnswer,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitcoach_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let app_state = state::AppState {
        db: pool,
        ai: ai::provider::AiProvider::from_env(),
    };

    // Router with per-route rate limiting; AI routes get the tight tier
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::users::router().layer(middleware::rate_limit::crud_layer()))
        .merge(routes::activity_levels::router().layer(middleware::rate_limit::crud_layer()))
        .merge(routes::plans::router().layer(middleware::rate_limit::ai_layer()))
        .merge(routes::chat::router().layer(middleware::rate_limit::ai_layer()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Fitcoach API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
