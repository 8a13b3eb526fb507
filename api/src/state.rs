use sqlx::PgPool;

use crate::ai::provider::AiProvider;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub ai: AiProvider,
}
