use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed set of genders known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(()),
        }
    }
}

/// Administratively curated activity tier. `level` is the natural key —
/// lower numbers mean less day-to-day activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ActivityLevel {
    pub level: i32,
    /// Short name (e.g. "Moderate activity")
    pub name: String,
    /// Longer description shown to users when they pick a level
    pub description: String,
}

/// A persisted user profile with its resolved activity level.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    /// External chat-platform user ID — supplied by the caller, never generated
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub age: i32,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    /// References an existing activity level by its number
    pub activity_level: i32,
    /// Resolved from the lookup table when the profile is fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_level_info: Option<ActivityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a profile. Fields carry the same bounds the
/// conversational validators enforce (see [`crate::validate`]).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateProfileRequest {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub age: i32,
    pub gender: Gender,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

/// Partial profile update — any subset of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

impl UpdateProfileRequest {
    /// An update touching exactly one field.
    pub fn from_field(value: FieldValue) -> Self {
        let mut update = Self::default();
        match value {
            FieldValue::Age(age) => update.age = Some(age),
            FieldValue::Gender(gender) => update.gender = Some(gender),
            FieldValue::Height(height_cm) => update.height_cm = Some(height_cm),
            FieldValue::Weight(weight_kg) => update.weight_kg = Some(weight_kg),
            FieldValue::ActivityLevel(level) => update.activity_level = Some(level),
            FieldValue::Goal(goal) => update.goal = Some(goal),
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&CreateProfileRequest> for UpdateProfileRequest {
    fn from(req: &CreateProfileRequest) -> Self {
        Self {
            username: req.username.clone(),
            age: Some(req.age),
            gender: Some(req.gender),
            height_cm: Some(req.height_cm),
            weight_kg: Some(req.weight_kg),
            activity_level: Some(req.activity_level),
            goal: req.goal.clone(),
        }
    }
}

/// The finite set of editable profile fields. Each maps to exactly one
/// validator — see [`crate::validate::validate_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Age,
    Gender,
    Height,
    Weight,
    ActivityLevel,
    Goal,
}

impl ProfileField {
    pub const ALL: [ProfileField; 6] = [
        ProfileField::Age,
        ProfileField::Gender,
        ProfileField::Height,
        ProfileField::Weight,
        ProfileField::ActivityLevel,
        ProfileField::Goal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileField::Age => "age",
            ProfileField::Gender => "gender",
            ProfileField::Height => "height",
            ProfileField::Weight => "weight",
            ProfileField::ActivityLevel => "activity_level",
            ProfileField::Goal => "goal",
        }
    }

    /// Display name for rendering edit affordances.
    pub fn label(self) -> &'static str {
        match self {
            ProfileField::Age => "Age",
            ProfileField::Gender => "Gender",
            ProfileField::Height => "Height (cm)",
            ProfileField::Weight => "Weight (kg)",
            ProfileField::ActivityLevel => "Activity level",
            ProfileField::Goal => "Goal",
        }
    }
}

impl std::str::FromStr for ProfileField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age" => Ok(ProfileField::Age),
            "gender" => Ok(ProfileField::Gender),
            "height" => Ok(ProfileField::Height),
            "weight" => Ok(ProfileField::Weight),
            "activity_level" => Ok(ProfileField::ActivityLevel),
            "goal" => Ok(ProfileField::Goal),
            _ => Err(()),
        }
    }
}

/// A validated new value for a single profile field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Age(i32),
    Gender(Gender),
    Height(f64),
    Weight(f64),
    ActivityLevel(i32),
    Goal(String),
}

/// A user's training plan. One per user; regeneration updates it in place.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingPlan {
    pub id: i64,
    pub user_id: i64,
    pub plan_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for manual plan creation/replacement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanInput {
    pub plan_description: String,
}

/// Body for the chat and plan-generation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiRequest {
    pub user_id: i64,
    /// Free-text question or extra plan preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Answer returned by the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatAnswer {
    pub answer: String,
}

/// Body for creating an activity level.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityLevelInput {
    pub level: i32,
    pub name: String,
    pub description: String,
}

/// Partial update of an activity level. The level number itself is the
/// natural key and cannot change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ActivityLevelUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
