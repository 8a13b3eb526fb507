//! Transient per-conversation dialogue state.

use std::collections::HashMap;

use tokio::sync::Mutex;

use fitcoach_core::types::{CreateProfileRequest, Gender, ProfileField};

/// Linear onboarding steps. A step is entered only via a successful
/// validation of the previous step's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStep {
    Age,
    Gender,
    Height,
    Weight,
    ActivityLevel,
    Goal,
}

/// Answers collected so far during onboarding. Never persisted — a profile
/// only reaches the backend once every field is in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDraft {
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<i32>,
}

impl ProfileDraft {
    /// Assemble the creation request; `None` if any answer is missing.
    pub fn into_request(
        self,
        id: i64,
        username: Option<&str>,
        goal: String,
    ) -> Option<CreateProfileRequest> {
        Some(CreateProfileRequest {
            id,
            username: username.map(str::to_owned),
            age: self.age?,
            gender: self.gender?,
            height_cm: self.height_cm?,
            weight_kg: self.weight_kg?,
            activity_level: self.activity_level?,
            goal: Some(goal),
        })
    }
}

/// Where a conversation currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatState {
    /// Collecting the profile, one field per turn
    Onboarding {
        step: OnboardingStep,
        draft: ProfileDraft,
    },
    /// Profile committed; commands and free-text chat are live
    Main,
    /// Waiting for the user's free-text plan preferences
    SendingPlanRequest,
    /// An AI request is in flight; new input gets a "please wait"
    GeneratingAnswer,
    /// Waiting for a new value for one profile field
    EditingField(ProfileField),
}

/// Identity-keyed store for transient dialogue state. The engine only ever
/// goes through `get`/`set`/`clear`, so tests can seed and inspect it
/// directly.
#[derive(Default)]
pub struct DialogueStore {
    states: Mutex<HashMap<i64, ChatState>>,
}

impl DialogueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, identity: i64) -> Option<ChatState> {
        self.states.lock().await.get(&identity).cloned()
    }

    pub async fn set(&self, identity: i64, state: ChatState) {
        self.states.lock().await.insert(identity, state);
    }

    pub async fn clear(&self, identity: i64) {
        self.states.lock().await.remove(&identity);
    }
}
