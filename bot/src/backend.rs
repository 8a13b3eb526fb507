//! Contract of the backend collaborator the dialogue engine talks to.

use async_trait::async_trait;

use fitcoach_core::types::{ActivityLevel, CreateProfileRequest, Profile, UpdateProfileRequest};

/// Outcome of a profile-creation attempt. An explicit result, so callers
/// branch on "already exists" instead of catching an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Failures surfaced by backend calls, already shaped for dialogue handling.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("generation failed")]
    GenerationFailed,
    #[error("transport failure: {0}")]
    Transport(String),
}

/// The CRUD/AI service behind the bot. A trait so the engine's tests run
/// against an in-memory fake instead of a live API.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_profile(&self, id: i64) -> Result<Profile, BackendError>;

    async fn create_profile(
        &self,
        req: &CreateProfileRequest,
    ) -> Result<CreateOutcome, BackendError>;

    async fn update_profile(
        &self,
        id: i64,
        req: &UpdateProfileRequest,
    ) -> Result<(), BackendError>;

    async fn get_activity_levels(&self) -> Result<Vec<ActivityLevel>, BackendError>;

    /// Plan text for the user; `NotFound` when none exists yet.
    async fn get_plan(&self, id: i64) -> Result<String, BackendError>;

    /// Create-or-update the user's plan server-side; returns the new text.
    async fn generate_plan(&self, id: i64, extra: Option<&str>) -> Result<String, BackendError>;

    async fn chat(&self, id: i64, message: &str) -> Result<String, BackendError>;
}
