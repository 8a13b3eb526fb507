//! Transport-agnostic dialogue engine.
//!
//! Each incoming update is reduced to an [`Input`], routed against the
//! conversation's current [`ChatState`], and answered with a list of
//! [`Reply`] values the transport renders. All state goes through the
//! [`DialogueStore`]; the backend is only reached through the [`Backend`]
//! trait. The engine itself holds no per-conversation data, so one instance
//! serves every conversation concurrently.

use fitcoach_core::types::{
    ActivityLevel, Profile, ProfileField, UpdateProfileRequest,
};
use fitcoach_core::validate;

use crate::backend::{Backend, BackendError, CreateOutcome};
use crate::state::{ChatState, DialogueStore, OnboardingStep, ProfileDraft};

pub const WELCOME: &str =
    "Hi! I'm your personal fitness coach. Let's set up your profile so I can \
     tailor plans and advice to you.";
pub const AGE_PROMPT: &str = "How old are you?";
pub const GENDER_PROMPT: &str = "What is your gender?";
pub const HEIGHT_PROMPT: &str = "What is your height, in centimeters?";
pub const WEIGHT_PROMPT: &str = "What is your weight, in kilograms?";
pub const LEVEL_PROMPT: &str = "Which activity level fits you best? Send its number.";
pub const GOAL_PROMPT: &str = "What is your training goal? A few words are enough.";
pub const PROFILE_SAVED: &str =
    "All set — your profile is saved!\n\
     Use /generate_plan for a weekly plan, /my_plan to see it, /profile to \
     review your data, or just send me a question.";
pub const PLAN_REQUEST_PROMPT: &str =
    "Great, I'll use the information from your profile.\n\
     You can also tell me more about the plan you'd like — or send a dash to skip.";
pub const PLEASE_WAIT: &str = "One moment — I'm still working on your previous request.";
pub const ONLY_TEXT: &str = "Only text messages are supported here.";
pub const GENERATION_APOLOGY: &str =
    "Sorry, I couldn't come up with an answer this time — please try again.";
pub const TRANSPORT_FAILURE: &str =
    "I couldn't reach the server — please send that again in a moment.";
pub const FINISH_PROFILE_FIRST: &str =
    "Let's finish setting up your profile first — answer the question above, \
     or /start to begin again.";
pub const NO_PROFILE: &str = "I couldn't find your profile — use /start to create one.";
pub const NO_PLAN: &str = "You don't have a plan yet — use /generate_plan to create one.";
pub const NO_LEVELS: &str =
    "No activity levels are configured yet — please try again later.";
pub const CANCEL_REFUSED: &str =
    "There's no saved profile to fall back to — keep answering, or /start to begin again.";
pub const CANCELLED: &str =
    "Cancelled — your saved profile is unchanged. Use /profile to review it.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const EDIT_CANCELLED: &str = "Edit cancelled — nothing was changed.";
pub const PLAN_REQUEST_CANCELLED: &str = "Plan request cancelled.";
pub const EDIT_SAVED: &str = "Done — your profile is updated.";
pub const PLAN_READY: &str = "Your plan is ready!";
pub const HELP: &str = "Here's what I can do:\n\
     /start — create your profile from scratch (also resets an unfinished one)\n\
     /profile — show your profile, with buttons to edit each field\n\
     /generate_plan — generate a weekly training plan for you\n\
     /my_plan — show your current plan\n\
     /cancel — abandon the current dialogue step\n\
     /help — this message\n\
     Anything else you send me is a question for your coach.";

/// One incoming update, reduced to what the engine cares about.
#[derive(Debug, Clone)]
pub enum Input {
    Text(String),
    /// The user tapped an edit affordance for one profile field
    EditField(ProfileField),
    /// Stickers, photos, voice — anything that is not text
    Unsupported,
}

/// A selectable option attached to a reply. `data` is either a literal
/// answer (fed back as text) or an `edit:<field>` affordance.
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub label: String,
    pub data: String,
}

impl Choice {
    fn answer(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// One outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    fn with_choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self {
            text: text.into(),
            choices,
        }
    }
}

/// Commands understood by the dialogue, regardless of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Cancel,
    Help,
    Profile,
    MyPlan,
    GeneratePlan,
}

/// Parse a leading `/command`, tolerating a `@botname` suffix. Unknown
/// commands fall through as plain text.
fn parse_command(text: &str) -> Option<Command> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name {
        "start" => Some(Command::Start),
        "cancel" => Some(Command::Cancel),
        "help" => Some(Command::Help),
        "profile" => Some(Command::Profile),
        "my_plan" => Some(Command::MyPlan),
        "generate_plan" => Some(Command::GeneratePlan),
        _ => None,
    }
}

fn failure_reply(err: &BackendError) -> Reply {
    match err {
        BackendError::Validation(message) => Reply::text(message.clone()),
        BackendError::GenerationFailed => Reply::text(GENERATION_APOLOGY),
        BackendError::NotFound => Reply::text(NO_PROFILE),
        BackendError::Transport(_) => Reply::text(TRANSPORT_FAILURE),
    }
}

fn gender_choices() -> Vec<Choice> {
    vec![
        Choice::answer("Male", "male"),
        Choice::answer("Female", "female"),
    ]
}

fn level_choices(levels: &[ActivityLevel]) -> Vec<Choice> {
    levels
        .iter()
        .map(|l| Choice::answer(format!("{} — {}", l.level, l.name), l.level.to_string()))
        .collect()
}

fn edit_choices() -> Vec<Choice> {
    ProfileField::ALL
        .iter()
        .map(|field| {
            Choice::answer(
                format!("Edit {}", field.label().to_lowercase()),
                format!("edit:{}", field.as_str()),
            )
        })
        .collect()
}

fn render_levels(levels: &[ActivityLevel]) -> String {
    levels
        .iter()
        .map(|l| format!("{}. {} — {}", l.level, l.name, l.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_profile(profile: &Profile) -> String {
    let mut out = String::from("Your profile:\n\n");
    if let Some(username) = &profile.username {
        out.push_str(&format!("Name: {username}\n"));
    }
    out.push_str(&format!("Age: {}\n", profile.age));
    out.push_str(&format!("Gender: {}\n", profile.gender));
    out.push_str(&format!("Height: {} cm\n", profile.height_cm));
    out.push_str(&format!("Weight: {} kg\n", profile.weight_kg));
    match &profile.activity_level_info {
        Some(level) => out.push_str(&format!(
            "Activity level: {} ({})\n{}\n",
            level.level, level.name, level.description
        )),
        None => out.push_str(&format!("Activity level: {}\n", profile.activity_level)),
    }
    out.push_str(&format!(
        "Goal: {}\n",
        profile.goal.as_deref().unwrap_or("not set")
    ));
    out
}

pub struct Engine<B> {
    store: DialogueStore,
    backend: B,
}

impl<B: Backend> Engine<B> {
    pub fn new(store: DialogueStore, backend: B) -> Self {
        Self { store, backend }
    }

    /// Process one update for one conversation and produce the replies.
    pub async fn handle(&self, identity: i64, username: Option<&str>, input: Input) -> Vec<Reply> {
        match input {
            Input::Unsupported => vec![Reply::text(ONLY_TEXT)],
            Input::EditField(field) => self.begin_edit(identity, field).await,
            Input::Text(text) => self.handle_text(identity, username, &text).await,
        }
    }

    async fn handle_text(&self, identity: i64, username: Option<&str>, text: &str) -> Vec<Reply> {
        if let Some(command) = parse_command(text) {
            return self.handle_command(identity, command).await;
        }

        let state = match self.resolve_state(identity).await {
            Ok(state) => state,
            Err(replies) => return replies,
        };

        match state {
            ChatState::Onboarding { step, draft } => {
                self.onboarding_turn(identity, step, draft, username, text).await
            }
            ChatState::Main => self.chat_turn(identity, text).await,
            ChatState::SendingPlanRequest => self.plan_request_turn(identity, text).await,
            ChatState::GeneratingAnswer => vec![Reply::text(PLEASE_WAIT)],
            ChatState::EditingField(field) => self.edit_turn(identity, field, text).await,
        }
    }

    /// Current state, or a fresh one for an identity the store has never
    /// seen: straight to `Main` when a committed profile exists, into
    /// onboarding otherwise.
    async fn resolve_state(&self, identity: i64) -> Result<ChatState, Vec<Reply>> {
        if let Some(state) = self.store.get(identity).await {
            return Ok(state);
        }
        match self.backend.get_profile(identity).await {
            Ok(_) => {
                self.store.set(identity, ChatState::Main).await;
                Ok(ChatState::Main)
            }
            Err(BackendError::NotFound) => Err(self.begin_onboarding(identity, true).await),
            Err(err) => Err(vec![failure_reply(&err)]),
        }
    }

    async fn handle_command(&self, identity: i64, command: Command) -> Vec<Reply> {
        if let Some(ChatState::GeneratingAnswer) = self.store.get(identity).await {
            return vec![Reply::text(PLEASE_WAIT)];
        }

        match command {
            Command::Start => self.begin_onboarding(identity, false).await,
            Command::Cancel => self.cancel(identity).await,
            Command::Help => vec![Reply::text(HELP)],
            Command::Profile => match self.require_main(identity).await {
                Ok(()) => self.show_profile(identity).await,
                Err(replies) => replies,
            },
            Command::MyPlan => match self.require_main(identity).await {
                Ok(()) => self.show_plan(identity).await,
                Err(replies) => replies,
            },
            Command::GeneratePlan => match self.require_main(identity).await {
                Ok(()) => {
                    self.store.set(identity, ChatState::SendingPlanRequest).await;
                    vec![Reply::text(PLAN_REQUEST_PROMPT)]
                }
                Err(replies) => replies,
            },
        }
    }

    /// Commands that need a committed profile. A pending sub-state
    /// (plan request, field edit) is abandoned in favor of the command.
    async fn require_main(&self, identity: i64) -> Result<(), Vec<Reply>> {
        match self.resolve_state(identity).await {
            Ok(ChatState::Onboarding { .. }) => Err(vec![Reply::text(FINISH_PROFILE_FIRST)]),
            Ok(ChatState::Main) => Ok(()),
            Ok(_) => {
                self.store.set(identity, ChatState::Main).await;
                Ok(())
            }
            Err(replies) => Err(replies),
        }
    }

    /// Restart is deliberately unconditional: it always clears transient
    /// state and re-collects every field, committed profile or not.
    async fn begin_onboarding(&self, identity: i64, first_contact: bool) -> Vec<Reply> {
        self.store
            .set(
                identity,
                ChatState::Onboarding {
                    step: OnboardingStep::Age,
                    draft: ProfileDraft::default(),
                },
            )
            .await;

        let mut replies = Vec::new();
        if first_contact {
            replies.push(Reply::text(WELCOME));
        }
        replies.push(Reply::text(AGE_PROMPT));
        replies
    }

    /// Cancellation is gated: mid-onboarding it only works for an identity
    /// that already has a committed profile to fall back to.
    async fn cancel(&self, identity: i64) -> Vec<Reply> {
        match self.store.get(identity).await {
            Some(ChatState::Onboarding { .. }) => {
                match self.backend.get_profile(identity).await {
                    Ok(_) => {
                        self.store.set(identity, ChatState::Main).await;
                        vec![Reply::text(CANCELLED)]
                    }
                    Err(BackendError::NotFound) => vec![Reply::text(CANCEL_REFUSED)],
                    Err(err) => vec![failure_reply(&err)],
                }
            }
            Some(ChatState::EditingField(_)) => {
                self.store.set(identity, ChatState::Main).await;
                vec![Reply::text(EDIT_CANCELLED)]
            }
            Some(ChatState::SendingPlanRequest) => {
                self.store.set(identity, ChatState::Main).await;
                vec![Reply::text(PLAN_REQUEST_CANCELLED)]
            }
            _ => vec![Reply::text(NOTHING_TO_CANCEL)],
        }
    }

    async fn onboarding_turn(
        &self,
        identity: i64,
        step: OnboardingStep,
        mut draft: ProfileDraft,
        username: Option<&str>,
        text: &str,
    ) -> Vec<Reply> {
        match step {
            OnboardingStep::Age => match validate::parse_age(text) {
                Ok(age) => {
                    draft.age = Some(age);
                    self.advance(identity, OnboardingStep::Gender, draft).await;
                    vec![Reply::with_choices(GENDER_PROMPT, gender_choices())]
                }
                Err(err) => vec![Reply::text(err.to_string())],
            },
            OnboardingStep::Gender => match validate::parse_gender(text) {
                Ok(gender) => {
                    draft.gender = Some(gender);
                    self.advance(identity, OnboardingStep::Height, draft).await;
                    vec![Reply::text(HEIGHT_PROMPT)]
                }
                Err(err) => vec![Reply::text(err.to_string())],
            },
            OnboardingStep::Height => match validate::parse_height(text) {
                Ok(height) => {
                    draft.height_cm = Some(height);
                    self.advance(identity, OnboardingStep::Weight, draft).await;
                    vec![Reply::text(WEIGHT_PROMPT)]
                }
                Err(err) => vec![Reply::text(err.to_string())],
            },
            OnboardingStep::Weight => match validate::parse_weight(text) {
                Ok(weight) => {
                    // The level list is fetched fresh on every presentation —
                    // levels are administratively curated and can change.
                    let levels = match self.backend.get_activity_levels().await {
                        Ok(levels) if !levels.is_empty() => levels,
                        Ok(_) => return vec![Reply::text(NO_LEVELS)],
                        Err(err) => return vec![failure_reply(&err)],
                    };
                    draft.weight_kg = Some(weight);
                    self.advance(identity, OnboardingStep::ActivityLevel, draft)
                        .await;
                    vec![Reply::with_choices(
                        format!("{LEVEL_PROMPT}\n\n{}", render_levels(&levels)),
                        level_choices(&levels),
                    )]
                }
                Err(err) => vec![Reply::text(err.to_string())],
            },
            OnboardingStep::ActivityLevel => {
                let levels = match self.backend.get_activity_levels().await {
                    Ok(levels) => levels,
                    Err(err) => return vec![failure_reply(&err)],
                };
                match validate::parse_activity_level(text, &levels) {
                    Ok(level) => {
                        draft.activity_level = Some(level);
                        self.advance(identity, OnboardingStep::Goal, draft).await;
                        vec![Reply::text(GOAL_PROMPT)]
                    }
                    Err(err) => vec![Reply::text(err.to_string())],
                }
            }
            OnboardingStep::Goal => match validate::parse_goal(text) {
                Ok(goal) => self.submit_profile(identity, username, draft, goal).await,
                Err(err) => vec![Reply::text(err.to_string())],
            },
        }
    }

    async fn advance(&self, identity: i64, step: OnboardingStep, draft: ProfileDraft) {
        self.store
            .set(identity, ChatState::Onboarding { step, draft })
            .await;
    }

    /// Terminal onboarding action: submit the assembled profile. Creation
    /// falling on an existing identity falls back to an update. The state
    /// only leaves `Goal` on success, so a failed submission is retried by
    /// resending the goal.
    async fn submit_profile(
        &self,
        identity: i64,
        username: Option<&str>,
        draft: ProfileDraft,
        goal: String,
    ) -> Vec<Reply> {
        let Some(request) = draft.into_request(identity, username, goal) else {
            self.store
                .set(
                    identity,
                    ChatState::Onboarding {
                        step: OnboardingStep::Age,
                        draft: ProfileDraft::default(),
                    },
                )
                .await;
            return vec![
                Reply::text("One of your answers went missing — let's start over."),
                Reply::text(AGE_PROMPT),
            ];
        };

        let result = match self.backend.create_profile(&request).await {
            Ok(CreateOutcome::Created) => Ok(()),
            Ok(CreateOutcome::AlreadyExists) => {
                self.backend
                    .update_profile(identity, &UpdateProfileRequest::from(&request))
                    .await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                self.store.set(identity, ChatState::Main).await;
                vec![Reply::text(PROFILE_SAVED)]
            }
            Err(err) => vec![failure_reply(&err)],
        }
    }

    /// Free text in `Main` is a question for the coach. The busy marker is
    /// set before the call and always restored after it, success or not —
    /// a conversation can never get stuck in `GeneratingAnswer`.
    async fn chat_turn(&self, identity: i64, text: &str) -> Vec<Reply> {
        self.store.set(identity, ChatState::GeneratingAnswer).await;
        let result = self.backend.chat(identity, text).await;
        self.store.set(identity, ChatState::Main).await;

        match result {
            Ok(answer) => vec![Reply::text(answer)],
            Err(BackendError::NotFound) => {
                // The profile vanished server-side; drop the stale state so
                // the next turn re-resolves into onboarding.
                self.store.clear(identity).await;
                vec![Reply::text(NO_PROFILE)]
            }
            Err(err) => vec![failure_reply(&err)],
        }
    }

    async fn plan_request_turn(&self, identity: i64, text: &str) -> Vec<Reply> {
        self.store.set(identity, ChatState::GeneratingAnswer).await;
        let result = self.backend.generate_plan(identity, Some(text)).await;
        self.store.set(identity, ChatState::Main).await;

        match result {
            Ok(plan) => vec![Reply::text(PLAN_READY), Reply::text(plan)],
            Err(err) => vec![failure_reply(&err)],
        }
    }

    async fn show_profile(&self, identity: i64) -> Vec<Reply> {
        match self.backend.get_profile(identity).await {
            Ok(profile) => vec![Reply::with_choices(
                render_profile(&profile),
                edit_choices(),
            )],
            Err(err) => vec![failure_reply(&err)],
        }
    }

    async fn show_plan(&self, identity: i64) -> Vec<Reply> {
        match self.backend.get_plan(identity).await {
            Ok(plan) => vec![Reply::text("Here is your current plan:"), Reply::text(plan)],
            Err(BackendError::NotFound) => vec![Reply::text(NO_PLAN)],
            Err(err) => vec![failure_reply(&err)],
        }
    }

    async fn begin_edit(&self, identity: i64, field: ProfileField) -> Vec<Reply> {
        match self.resolve_state(identity).await {
            Ok(ChatState::Main) | Ok(ChatState::EditingField(_)) => {}
            Ok(ChatState::GeneratingAnswer) => return vec![Reply::text(PLEASE_WAIT)],
            Ok(_) => return vec![Reply::text(FINISH_PROFILE_FIRST)],
            Err(replies) => return replies,
        }

        let reply = match field {
            ProfileField::Gender => {
                Reply::with_choices("Pick a new value:", gender_choices())
            }
            ProfileField::ActivityLevel => {
                let levels = match self.backend.get_activity_levels().await {
                    Ok(levels) if !levels.is_empty() => levels,
                    Ok(_) => return vec![Reply::text(NO_LEVELS)],
                    Err(err) => return vec![failure_reply(&err)],
                };
                Reply::with_choices(
                    format!("Pick a new value:\n\n{}", render_levels(&levels)),
                    level_choices(&levels),
                )
            }
            _ => Reply::text(format!(
                "Send a new value for {}.",
                field.label().to_lowercase()
            )),
        };

        self.store.set(identity, ChatState::EditingField(field)).await;
        vec![reply]
    }

    /// Validate and submit one field. A validation failure keeps the edit
    /// open for a retry — the user backs out with /cancel, never silently.
    async fn edit_turn(&self, identity: i64, field: ProfileField, text: &str) -> Vec<Reply> {
        let levels = if field == ProfileField::ActivityLevel {
            match self.backend.get_activity_levels().await {
                Ok(levels) => levels,
                Err(err) => return vec![failure_reply(&err)],
            }
        } else {
            Vec::new()
        };

        let value = match validate::validate_field(field, text, &levels) {
            Ok(value) => value,
            Err(err) => return vec![Reply::text(err.to_string())],
        };

        match self
            .backend
            .update_profile(identity, &UpdateProfileRequest::from_field(value))
            .await
        {
            Ok(()) => {
                self.store.set(identity, ChatState::Main).await;
                vec![Reply::text(EDIT_SAVED)]
            }
            Err(BackendError::Validation(message)) => vec![Reply::text(message)],
            Err(err) => vec![failure_reply(&err)],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::Utc;
    use tokio::sync::{Mutex, Notify};

    use fitcoach_core::types::{CreateProfileRequest, Gender};

    use super::*;

    fn test_levels() -> Vec<ActivityLevel> {
        (1..=4)
            .map(|level| ActivityLevel {
                level,
                name: format!("Level {level}"),
                description: format!("Description of level {level}"),
            })
            .collect()
    }

    fn sample_request(id: i64) -> CreateProfileRequest {
        CreateProfileRequest {
            id,
            username: Some("alice".to_owned()),
            age: 30,
            gender: Gender::Female,
            height_cm: 170.0,
            weight_kg: 60.0,
            activity_level: 2,
            goal: Some("stay fit".to_owned()),
        }
    }

    fn profile_from(req: &CreateProfileRequest) -> Profile {
        Profile {
            id: req.id,
            username: req.username.clone(),
            age: req.age,
            gender: req.gender,
            height_cm: req.height_cm,
            weight_kg: req.weight_kg,
            activity_level: req.activity_level,
            activity_level_info: None,
            goal: req.goal.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        profiles: Mutex<HashMap<i64, CreateProfileRequest>>,
        updates: Mutex<Vec<(i64, UpdateProfileRequest)>>,
        plans: Mutex<HashMap<i64, String>>,
        chat_calls: AtomicUsize,
        chat_gate: Mutex<Option<Arc<Notify>>>,
        fail_create: AtomicBool,
    }

    impl FakeBackend {
        fn with_profile(id: i64) -> Self {
            let fake = Self::default();
            fake.profiles
                .try_lock()
                .unwrap()
                .insert(id, sample_request(id));
            fake
        }
    }

    #[async_trait::async_trait]
    impl Backend for FakeBackend {
        async fn get_profile(&self, id: i64) -> Result<Profile, BackendError> {
            self.profiles
                .lock()
                .await
                .get(&id)
                .map(profile_from)
                .ok_or(BackendError::NotFound)
        }

        async fn create_profile(
            &self,
            req: &CreateProfileRequest,
        ) -> Result<CreateOutcome, BackendError> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(BackendError::Transport("connection refused".to_owned()));
            }
            let mut profiles = self.profiles.lock().await;
            if profiles.contains_key(&req.id) {
                return Ok(CreateOutcome::AlreadyExists);
            }
            profiles.insert(req.id, req.clone());
            Ok(CreateOutcome::Created)
        }

        async fn update_profile(
            &self,
            id: i64,
            req: &UpdateProfileRequest,
        ) -> Result<(), BackendError> {
            if !self.profiles.lock().await.contains_key(&id) {
                return Err(BackendError::NotFound);
            }
            self.updates.lock().await.push((id, req.clone()));
            Ok(())
        }

        async fn get_activity_levels(&self) -> Result<Vec<ActivityLevel>, BackendError> {
            Ok(test_levels())
        }

        async fn get_plan(&self, id: i64) -> Result<String, BackendError> {
            self.plans
                .lock()
                .await
                .get(&id)
                .cloned()
                .ok_or(BackendError::NotFound)
        }

        async fn generate_plan(
            &self,
            id: i64,
            extra: Option<&str>,
        ) -> Result<String, BackendError> {
            let plan = format!("plan for {id} ({})", extra.unwrap_or_default());
            self.plans.lock().await.insert(id, plan.clone());
            Ok(plan)
        }

        async fn chat(&self, _id: i64, message: &str) -> Result<String, BackendError> {
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.chat_gate.lock().await.clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(format!("answer to: {message}"))
        }
    }

    fn engine_with(backend: FakeBackend) -> Engine<FakeBackend> {
        Engine::new(DialogueStore::new(), backend)
    }

    async fn send(engine: &Engine<FakeBackend>, id: i64, text: &str) -> Vec<Reply> {
        engine
            .handle(id, Some("alice"), Input::Text(text.to_owned()))
            .await
    }

    #[tokio::test]
    async fn onboarding_walks_all_steps_and_persists_once() {
        let engine = engine_with(FakeBackend::default());

        let replies = send(&engine, 7, "hello").await;
        assert_eq!(replies.last().unwrap().text, AGE_PROMPT);

        let replies = send(&engine, 7, "25").await;
        assert_eq!(replies[0].text, GENDER_PROMPT);
        assert_eq!(replies[0].choices.len(), 2);

        let replies = send(&engine, 7, "male").await;
        assert_eq!(replies[0].text, HEIGHT_PROMPT);

        let replies = send(&engine, 7, "180").await;
        assert_eq!(replies[0].text, WEIGHT_PROMPT);

        let replies = send(&engine, 7, "75").await;
        assert!(replies[0].text.starts_with(LEVEL_PROMPT));
        assert_eq!(replies[0].choices.len(), 4);

        let replies = send(&engine, 7, "2").await;
        assert_eq!(replies[0].text, GOAL_PROMPT);

        let replies = send(&engine, 7, "get stronger").await;
        assert_eq!(replies[0].text, PROFILE_SAVED);
        assert_eq!(engine.store.get(7).await, Some(ChatState::Main));

        let profiles = engine.backend.profiles.lock().await;
        assert_eq!(profiles.len(), 1);
        let stored = &profiles[&7];
        assert_eq!(stored.id, 7);
        assert_eq!(stored.age, 25);
        assert_eq!(stored.gender, Gender::Male);
        assert_eq!(stored.height_cm, 180.0);
        assert_eq!(stored.weight_kg, 75.0);
        assert_eq!(stored.activity_level, 2);
        assert_eq!(stored.goal.as_deref(), Some("get stronger"));
    }

    #[tokio::test]
    async fn invalid_answer_keeps_the_step_and_stores_nothing() {
        let engine = engine_with(FakeBackend::default());
        send(&engine, 7, "hi").await;

        for bad in ["abc", "16", "100"] {
            let replies = send(&engine, 7, bad).await;
            assert_eq!(
                replies[0].text,
                validate::ValidationError::InvalidAge.to_string()
            );
        }
        assert_eq!(
            engine.store.get(7).await,
            Some(ChatState::Onboarding {
                step: OnboardingStep::Age,
                draft: ProfileDraft::default(),
            })
        );

        let replies = send(&engine, 7, "17").await;
        assert_eq!(replies[0].text, GENDER_PROMPT);
    }

    #[tokio::test]
    async fn second_onboarding_updates_instead_of_duplicating() {
        let engine = engine_with(FakeBackend::default());
        send(&engine, 7, "hi").await;
        for answer in ["25", "male", "180", "75", "2", "get stronger"] {
            send(&engine, 7, answer).await;
        }

        send(&engine, 7, "/start").await;
        for answer in ["26", "male", "181", "76", "3", "get even stronger"] {
            send(&engine, 7, answer).await;
        }

        let profiles = engine.backend.profiles.lock().await;
        assert_eq!(profiles.len(), 1);
        let updates = engine.backend.updates.lock().await;
        assert_eq!(updates.len(), 1);
        let (id, update) = &updates[0];
        assert_eq!(*id, 7);
        assert_eq!(update.age, Some(26));
        assert_eq!(update.goal.as_deref(), Some("get even stronger"));
    }

    #[tokio::test]
    async fn cancel_is_refused_for_a_brand_new_identity() {
        let engine = engine_with(FakeBackend::default());
        send(&engine, 7, "hi").await;
        send(&engine, 7, "25").await;

        let replies = send(&engine, 7, "/cancel").await;
        assert_eq!(replies[0].text, CANCEL_REFUSED);
        assert!(matches!(
            engine.store.get(7).await,
            Some(ChatState::Onboarding {
                step: OnboardingStep::Gender,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cancel_returns_an_existing_user_to_main() {
        let engine = engine_with(FakeBackend::with_profile(7));
        send(&engine, 7, "/start").await;
        send(&engine, 7, "30").await;

        let replies = send(&engine, 7, "/cancel").await;
        assert_eq!(replies[0].text, CANCELLED);
        assert_eq!(engine.store.get(7).await, Some(ChatState::Main));
    }

    #[tokio::test]
    async fn restart_resets_state_for_new_and_existing_identities() {
        let engine = engine_with(FakeBackend::with_profile(7));
        let replies = send(&engine, 7, "/start").await;
        assert_eq!(replies.last().unwrap().text, AGE_PROMPT);

        send(&engine, 7, "44").await;
        let replies = send(&engine, 7, "/start").await;
        assert_eq!(replies.last().unwrap().text, AGE_PROMPT);
        assert_eq!(
            engine.store.get(7).await,
            Some(ChatState::Onboarding {
                step: OnboardingStep::Age,
                draft: ProfileDraft::default(),
            })
        );
    }

    #[tokio::test]
    async fn failed_submission_keeps_the_goal_step_for_a_retry() {
        let engine = engine_with(FakeBackend::default());
        send(&engine, 7, "hi").await;
        for answer in ["25", "male", "180", "75", "2"] {
            send(&engine, 7, answer).await;
        }

        engine.backend.fail_create.store(true, Ordering::SeqCst);
        let replies = send(&engine, 7, "get stronger").await;
        assert_eq!(replies[0].text, TRANSPORT_FAILURE);
        assert!(matches!(
            engine.store.get(7).await,
            Some(ChatState::Onboarding {
                step: OnboardingStep::Goal,
                ..
            })
        ));

        engine.backend.fail_create.store(false, Ordering::SeqCst);
        let replies = send(&engine, 7, "get stronger").await;
        assert_eq!(replies[0].text, PROFILE_SAVED);
        assert_eq!(engine.backend.profiles.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn free_text_in_main_goes_to_the_coach() {
        let engine = engine_with(FakeBackend::with_profile(7));
        let replies = send(&engine, 7, "how do I squat?").await;
        assert_eq!(replies[0].text, "answer to: how do I squat?");
        assert_eq!(engine.store.get(7).await, Some(ChatState::Main));
        assert_eq!(engine.backend.chat_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn busy_gate_says_please_wait_and_makes_no_second_call() {
        let backend = FakeBackend::with_profile(7);
        let gate = Arc::new(Notify::new());
        *backend.chat_gate.try_lock().unwrap() = Some(gate.clone());
        let engine = Arc::new(engine_with(backend));

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { send(&engine, 7, "first question").await }
        });

        while engine.store.get(7).await != Some(ChatState::GeneratingAnswer) {
            tokio::task::yield_now().await;
        }

        let busy = send(&engine, 7, "second question").await;
        assert_eq!(busy[0].text, PLEASE_WAIT);
        assert_eq!(engine.backend.chat_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        let replies = first.await.unwrap();
        assert_eq!(replies[0].text, "answer to: first question");
        assert_eq!(engine.store.get(7).await, Some(ChatState::Main));

        *engine.backend.chat_gate.lock().await = None;
        let replies = send(&engine, 7, "third question").await;
        assert_eq!(replies[0].text, "answer to: third question");
        assert_eq!(engine.backend.chat_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn plan_request_flow_generates_and_returns_to_main() {
        let engine = engine_with(FakeBackend::with_profile(7));

        let replies = send(&engine, 7, "/generate_plan").await;
        assert_eq!(replies[0].text, PLAN_REQUEST_PROMPT);
        assert_eq!(
            engine.store.get(7).await,
            Some(ChatState::SendingPlanRequest)
        );

        let replies = send(&engine, 7, "more cardio please").await;
        assert_eq!(replies[0].text, PLAN_READY);
        assert!(replies[1].text.contains("more cardio please"));
        assert_eq!(engine.store.get(7).await, Some(ChatState::Main));
        assert!(engine.backend.plans.lock().await.contains_key(&7));
    }

    #[tokio::test]
    async fn my_plan_without_a_plan_points_to_generation() {
        let engine = engine_with(FakeBackend::with_profile(7));
        let replies = send(&engine, 7, "/my_plan").await;
        assert_eq!(replies[0].text, NO_PLAN);
    }

    #[tokio::test]
    async fn non_text_input_is_rejected_without_state_change() {
        let engine = engine_with(FakeBackend::with_profile(7));
        let replies = engine.handle(7, Some("alice"), Input::Unsupported).await;
        assert_eq!(replies[0].text, ONLY_TEXT);
        assert_eq!(engine.store.get(7).await, None);
    }

    #[tokio::test]
    async fn field_edit_validates_retries_and_submits_one_field() {
        let engine = engine_with(FakeBackend::with_profile(7));

        let replies = engine
            .handle(7, Some("alice"), Input::EditField(ProfileField::Age))
            .await;
        assert!(replies[0].text.contains("age"));
        assert_eq!(
            engine.store.get(7).await,
            Some(ChatState::EditingField(ProfileField::Age))
        );

        let replies = send(&engine, 7, "not a number").await;
        assert_eq!(
            replies[0].text,
            validate::ValidationError::InvalidAge.to_string()
        );
        assert_eq!(
            engine.store.get(7).await,
            Some(ChatState::EditingField(ProfileField::Age))
        );

        let replies = send(&engine, 7, "33").await;
        assert_eq!(replies[0].text, EDIT_SAVED);
        assert_eq!(engine.store.get(7).await, Some(ChatState::Main));

        let updates = engine.backend.updates.lock().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].1,
            UpdateProfileRequest {
                age: Some(33),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn profile_command_renders_summary_with_edit_affordances() {
        let engine = engine_with(FakeBackend::with_profile(7));
        let replies = send(&engine, 7, "/profile").await;
        assert!(replies[0].text.contains("Age: 30"));
        assert!(replies[0].text.contains("Gender: female"));
        assert_eq!(replies[0].choices.len(), ProfileField::ALL.len());
        assert!(replies[0].choices.iter().any(|c| c.data == "edit:age"));
    }

    #[tokio::test]
    async fn commands_needing_a_profile_are_deferred_during_onboarding() {
        let engine = engine_with(FakeBackend::default());
        send(&engine, 7, "hi").await;
        let replies = send(&engine, 7, "/profile").await;
        assert_eq!(replies[0].text, FINISH_PROFILE_FIRST);
    }
}
