//! Deterministic prompt templates for the coaching model.
//!
//! Every request carries the same role-establishing preamble with the full
//! profile embedded, followed by task-specific instructions. No state is
//! kept between calls — the previous plan, when relevant, is passed in.

use fitcoach_core::types::Profile;

fn optional(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "(not provided)",
    }
}

/// Role preamble shared by every request: who the model is, who the user is.
pub fn base_prompt(profile: &Profile) -> String {
    let level_description = profile
        .activity_level_info
        .as_ref()
        .map(|l| l.description.as_str());

    format!(
        "You are a professional fitness coach. Your job is to help the user \
         reach their goals with training plans, advice, and encouragement. \
         Be polite, friendly, and supportive.\n\
         \n\
         USER DATA:\n\
         \x20 Name: \"{username}\"\n\
         \x20 Gender: \"{gender}\"\n\
         \x20 Age: \"{age}\"\n\
         \x20 Height: \"{height} cm\"\n\
         \x20 Weight: \"{weight} kg\"\n\
         \x20 Activity level: \"{level}\"\n\
         \x20 Activity level description: \"{level_description}\"\n\
         \x20 Goal: \"{goal}\"\n\
         \n\
         IMPORTANT:\n\
         \x20 1) If the goal is unrelated to training or a healthy lifestyle, ignore it.\n\
         \x20 2) If a field above says \"(not provided)\" (except the name), suggest \
         the user fill it in via their profile.\n\
         \x20 3) Do not greet the user or add filler — do exactly what is asked.\n",
        username = optional(profile.username.as_deref()),
        gender = profile.gender,
        age = profile.age,
        height = profile.height_cm,
        weight = profile.weight_kg,
        level = profile.activity_level,
        level_description = optional(level_description),
        goal = optional(profile.goal.as_deref()),
    )
}

/// Instructions for generating a weekly training plan.
pub fn plan_prompt(
    profile: &Profile,
    previous_plan: Option<&str>,
    extra_request: Option<&str>,
) -> String {
    let mut prompt = base_prompt(profile);
    prompt.push_str(&format!(
        "\nYour task:\n\
         \n\
         'Create a one-week training plan for the user.'\n\
         \n\
         The user added this (treat it as a preference, if it makes sense):\n\
         \n\
         \"{extra}\"\n\
         \n\
         IMPORTANT:\n\
         \x20 1) Take the user data into account.\n\
         \x20 2) Cover every day of the week, Monday through Sunday.\n\
         \x20 3) Give one piece of advice for each day.\n\
         \x20 4) Keep it compact enough to send as a single message.\n\
         \x20 5) End with: \"Remember this is a starting point — adjust it as you go!\"\n\
         \n\
         Use this template:\n\
         \n\
         MONDAY:\n\
         \x20 Training day (short summary)\n\
         \x20 Description of the session\n\
         \x20 Exercises with sets and reps\n\
         \x20 Advice\n\
         \n\
         TUESDAY:\n\
         \x20 Rest\n\
         \x20 Advice\n\
         ...\n\
         \n\
         The user's previous plan, for reference:\n\
         \"{previous}\"\n",
        extra = optional(extra_request),
        previous = optional(previous_plan),
    ));
    prompt
}

/// Instructions for answering a free-form question.
pub fn chat_prompt(profile: &Profile, question: &str) -> String {
    let mut prompt = base_prompt(profile);
    prompt.push_str(&format!(
        "\nThe user asks you:\n\
         \n\
         '{question}'\n\
         \n\
         Answer according to your role.\n\
         \n\
         IMPORTANT:\n\
         \x20 1) If the question is unrelated to training or a healthy lifestyle, \
         ask the user to stay on topic.\n\
         \x20 2) If the user states information that differs from USER DATA, suggest \
         updating the profile, but treat the stated information as authoritative for \
         this answer.\n\
         \x20 3) If asked to create a plan, point the user to the plan menu instead.\n",
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fitcoach_core::types::{ActivityLevel, Gender};

    fn profile() -> Profile {
        Profile {
            id: 42,
            username: Some("alice".to_owned()),
            age: 25,
            gender: Gender::Female,
            height_cm: 170.0,
            weight_kg: 60.0,
            activity_level: 3,
            activity_level_info: Some(ActivityLevel {
                level: 3,
                name: "Moderate activity".to_owned(),
                description: "Regular training three to four times a week".to_owned(),
            }),
            goal: Some("run a marathon".to_owned()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn base_prompt_embeds_all_profile_fields() {
        let prompt = base_prompt(&profile());
        assert!(prompt.contains("\"alice\""));
        assert!(prompt.contains("\"female\""));
        assert!(prompt.contains("\"25\""));
        assert!(prompt.contains("\"170 cm\""));
        assert!(prompt.contains("\"60 kg\""));
        assert!(prompt.contains("Regular training three to four times a week"));
        assert!(prompt.contains("\"run a marathon\""));
    }

    #[test]
    fn base_prompt_marks_absent_fields() {
        let mut p = profile();
        p.goal = None;
        p.activity_level_info = None;
        let prompt = base_prompt(&p);
        assert!(prompt.contains("Goal: \"(not provided)\""));
        assert!(prompt.contains("Activity level description: \"(not provided)\""));
    }

    #[test]
    fn plan_prompt_references_template_and_previous_plan() {
        let prompt = plan_prompt(&profile(), Some("old plan text"), Some("more cardio"));
        assert!(prompt.contains("MONDAY:"));
        assert!(prompt.contains("TUESDAY:"));
        assert!(prompt.contains("\"more cardio\""));
        assert!(prompt.contains("\"old plan text\""));
    }

    #[test]
    fn chat_prompt_embeds_the_question() {
        let prompt = chat_prompt(&profile(), "how much protein should I eat?");
        assert!(prompt.contains("'how much protein should I eat?'"));
        assert!(prompt.contains("stay on topic"));
    }
}
