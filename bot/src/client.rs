//! Typed reqwest client for the fitcoach API.

use async_trait::async_trait;

use fitcoach_core::types::{
    ActivityLevel, AiRequest, ChatAnswer, CreateProfileRequest, Profile, TrainingPlan,
    UpdateProfileRequest,
};

use crate::backend::{Backend, BackendError, CreateOutcome};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

/// Map a non-success response to a backend error, pulling the message out
/// of the structured error body when there is one.
async fn error_from(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let message = body
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_owned();

    match status.as_u16() {
        400 => BackendError::Validation(message),
        404 => BackendError::NotFound,
        502 => BackendError::GenerationFailed,
        _ => BackendError::Transport(format!("unexpected status {status}: {message}")),
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn get_profile(&self, id: i64) -> Result<Profile, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/users/{id}")))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        response.json().await.map_err(transport)
    }

    async fn create_profile(
        &self,
        req: &CreateProfileRequest,
    ) -> Result<CreateOutcome, BackendError> {
        let response = self
            .http
            .post(self.url("/v1/users"))
            .json(req)
            .send()
            .await
            .map_err(transport)?;
        if response.status().is_success() {
            return Ok(CreateOutcome::Created);
        }
        if response.status().as_u16() == 409 {
            return Ok(CreateOutcome::AlreadyExists);
        }
        Err(error_from(response).await)
    }

    async fn update_profile(
        &self,
        id: i64,
        req: &UpdateProfileRequest,
    ) -> Result<(), BackendError> {
        let response = self
            .http
            .patch(self.url(&format!("/v1/users/{id}")))
            .json(req)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(())
    }

    async fn get_activity_levels(&self) -> Result<Vec<ActivityLevel>, BackendError> {
        let response = self
            .http
            .get(self.url("/v1/activity-levels"))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        response.json().await.map_err(transport)
    }

    async fn get_plan(&self, id: i64) -> Result<String, BackendError> {
        let response = self
            .http
            .get(self.url(&format!("/v1/users/{id}/plan")))
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let plan: TrainingPlan = response.json().await.map_err(transport)?;
        Ok(plan.plan_description)
    }

    async fn generate_plan(&self, id: i64, extra: Option<&str>) -> Result<String, BackendError> {
        let body = AiRequest {
            user_id: id,
            content: extra.map(str::to_owned),
        };
        let response = self
            .http
            .post(self.url("/v1/plans/generate"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let plan: TrainingPlan = response.json().await.map_err(transport)?;
        Ok(plan.plan_description)
    }

    async fn chat(&self, id: i64, message: &str) -> Result<String, BackendError> {
        let body = AiRequest {
            user_id: id,
            content: Some(message.to_owned()),
        };
        let response = self
            .http
            .post(self.url("/v1/chat"))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let answer: ChatAnswer = response.json().await.map_err(transport)?;
        Ok(answer.answer)
    }
}
