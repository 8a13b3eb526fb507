//! Field validators for profile and plan input.
//!
//! Pure functions mapping raw text to typed, range-checked values. The
//! `Display` form of each failure is user-facing and surfaced verbatim by
//! callers, so the messages double as the retry prompt. The only validator
//! with an external input is the activity-level check, which takes a caller
//! supplied snapshot of known levels — validity may be stale between calls.

use thiserror::Error;

use crate::types::{ActivityLevel, FieldValue, Gender, ProfileField};

/// Accepted age range, exclusive on both ends.
pub const AGE_MIN: i32 = 16;
pub const AGE_MAX: i32 = 100;

/// Accepted height range in centimeters, exclusive on both ends.
pub const HEIGHT_MIN_CM: f64 = 100.0;
pub const HEIGHT_MAX_CM: f64 = 250.0;

/// Accepted weight range in kilograms, exclusive on both ends.
pub const WEIGHT_MIN_KG: f64 = 20.0;
pub const WEIGHT_MAX_KG: f64 = 300.0;

/// Weekday names a plan must mention, in display order.
pub const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Age must be a whole number between {} and {}", AGE_MIN + 1, AGE_MAX - 1)]
    InvalidAge,
    #[error("Unknown gender — answer \"male\" or \"female\"")]
    InvalidGender,
    #[error("Height must be a number between {HEIGHT_MIN_CM} and {HEIGHT_MAX_CM} cm")]
    InvalidHeight,
    #[error("Weight must be a number between {WEIGHT_MIN_KG} and {WEIGHT_MAX_KG} kg")]
    InvalidWeight,
    #[error("There is no such activity level — pick one of the listed options")]
    InvalidActivityLevel,
    #[error("Goal cannot be empty — a few words are enough")]
    EmptyGoal,
    #[error("The plan must cover every day of the week; missing: {}", .missing.join(", "))]
    IncompleteWeekCoverage { missing: Vec<String> },
}

/// Range check for an already-parsed age.
pub fn check_age(age: i32) -> Result<i32, ValidationError> {
    if age <= AGE_MIN || age >= AGE_MAX {
        return Err(ValidationError::InvalidAge);
    }
    Ok(age)
}

pub fn parse_age(input: &str) -> Result<i32, ValidationError> {
    let age: i32 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidAge)?;
    check_age(age)
}

/// Case-insensitive match against the closed gender set. Accepts the full
/// word or any prefix of it ("m", "fem", ...) — the sets share no prefix,
/// so a match is always unambiguous.
pub fn parse_gender(input: &str) -> Result<Gender, ValidationError> {
    let normalized = input.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(ValidationError::InvalidGender);
    }
    if "male".starts_with(&normalized) {
        return Ok(Gender::Male);
    }
    if "female".starts_with(&normalized) {
        return Ok(Gender::Female);
    }
    Err(ValidationError::InvalidGender)
}

/// Accepts both '.' and ',' as the decimal separator.
fn parse_decimal(input: &str) -> Option<f64> {
    input.trim().replace(',', ".").parse().ok()
}

pub fn check_height(height_cm: f64) -> Result<f64, ValidationError> {
    if height_cm <= HEIGHT_MIN_CM || height_cm >= HEIGHT_MAX_CM {
        return Err(ValidationError::InvalidHeight);
    }
    Ok(height_cm)
}

pub fn parse_height(input: &str) -> Result<f64, ValidationError> {
    let height = parse_decimal(input).ok_or(ValidationError::InvalidHeight)?;
    check_height(height)
}

/// Out-of-range is an OR of the two bound checks: too light OR too heavy
/// both fail.
pub fn check_weight(weight_kg: f64) -> Result<f64, ValidationError> {
    if weight_kg <= WEIGHT_MIN_KG || weight_kg >= WEIGHT_MAX_KG {
        return Err(ValidationError::InvalidWeight);
    }
    Ok(weight_kg)
}

pub fn parse_weight(input: &str) -> Result<f64, ValidationError> {
    let weight = parse_decimal(input).ok_or(ValidationError::InvalidWeight)?;
    check_weight(weight)
}

/// Membership check against the supplied snapshot of known levels.
pub fn parse_activity_level(
    input: &str,
    known: &[ActivityLevel],
) -> Result<i32, ValidationError> {
    let level: i32 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidActivityLevel)?;
    if known.iter().any(|l| l.level == level) {
        Ok(level)
    } else {
        Err(ValidationError::InvalidActivityLevel)
    }
}

pub fn parse_goal(input: &str) -> Result<String, ValidationError> {
    let goal = input.trim();
    if goal.is_empty() {
        return Err(ValidationError::EmptyGoal);
    }
    Ok(goal.to_owned())
}

/// Validate raw text for one editable field. The `known_levels` snapshot is
/// only consulted for [`ProfileField::ActivityLevel`].
pub fn validate_field(
    field: ProfileField,
    input: &str,
    known_levels: &[ActivityLevel],
) -> Result<FieldValue, ValidationError> {
    match field {
        ProfileField::Age => parse_age(input).map(FieldValue::Age),
        ProfileField::Gender => parse_gender(input).map(FieldValue::Gender),
        ProfileField::Height => parse_height(input).map(FieldValue::Height),
        ProfileField::Weight => parse_weight(input).map(FieldValue::Weight),
        ProfileField::ActivityLevel => {
            parse_activity_level(input, known_levels).map(FieldValue::ActivityLevel)
        }
        ProfileField::Goal => parse_goal(input).map(FieldValue::Goal),
    }
}

/// A plan must mention all seven weekday names (case-insensitive substring
/// match). The failure lists exactly the missing days, in week order.
pub fn check_week_coverage(plan: &str) -> Result<(), ValidationError> {
    let lower = plan.to_lowercase();
    let missing: Vec<String> = WEEKDAYS
        .iter()
        .copied()
        .filter(|day| !lower.contains(*day))
        .map(str::to_owned)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::IncompleteWeekCoverage { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<ActivityLevel> {
        (1..=4)
            .map(|level| ActivityLevel {
                level,
                name: format!("Level {level}"),
                description: String::new(),
            })
            .collect()
    }

    #[test]
    fn age_accepts_strict_interior() {
        for age in [17, 25, 99] {
            assert_eq!(parse_age(&age.to_string()), Ok(age));
        }
    }

    #[test]
    fn age_rejects_bounds_and_garbage() {
        for input in ["16", "100", "0", "-5", "150", "abc", "25.5", ""] {
            assert_eq!(parse_age(input), Err(ValidationError::InvalidAge));
        }
    }

    #[test]
    fn gender_matches_case_insensitive_prefixes() {
        assert_eq!(parse_gender("male"), Ok(Gender::Male));
        assert_eq!(parse_gender("MALE"), Ok(Gender::Male));
        assert_eq!(parse_gender("m"), Ok(Gender::Male));
        assert_eq!(parse_gender("Fem"), Ok(Gender::Female));
        assert_eq!(parse_gender(" female "), Ok(Gender::Female));
        assert_eq!(parse_gender("other"), Err(ValidationError::InvalidGender));
        assert_eq!(parse_gender(""), Err(ValidationError::InvalidGender));
        assert_eq!(parse_gender("males"), Err(ValidationError::InvalidGender));
    }

    #[test]
    fn height_accepts_both_decimal_separators() {
        assert_eq!(parse_height("180"), Ok(180.0));
        assert_eq!(parse_height("180.5"), Ok(180.5));
        assert_eq!(parse_height("180,5"), Ok(180.5));
    }

    #[test]
    fn height_rejects_out_of_range() {
        for input in ["100", "250", "99.9", "300", "tall"] {
            assert_eq!(parse_height(input), Err(ValidationError::InvalidHeight));
        }
    }

    #[test]
    fn weight_rejects_both_sides_of_the_range() {
        // Both bounds must be enforced — too light AND too heavy each fail.
        assert_eq!(parse_weight("10"), Err(ValidationError::InvalidWeight));
        assert_eq!(parse_weight("310"), Err(ValidationError::InvalidWeight));
        assert_eq!(parse_weight("20"), Err(ValidationError::InvalidWeight));
        assert_eq!(parse_weight("300"), Err(ValidationError::InvalidWeight));
        assert_eq!(parse_weight("21"), Ok(21.0));
        assert_eq!(parse_weight("299"), Ok(299.0));
        assert_eq!(parse_weight("75,5"), Ok(75.5));
    }

    #[test]
    fn activity_level_checks_membership() {
        assert_eq!(parse_activity_level("2", &levels()), Ok(2));
        assert_eq!(
            parse_activity_level("9", &levels()),
            Err(ValidationError::InvalidActivityLevel)
        );
        assert_eq!(
            parse_activity_level("two", &levels()),
            Err(ValidationError::InvalidActivityLevel)
        );
        assert_eq!(
            parse_activity_level("1", &[]),
            Err(ValidationError::InvalidActivityLevel)
        );
    }

    #[test]
    fn field_dispatch_covers_every_field() {
        let known = levels();
        assert_eq!(
            validate_field(ProfileField::Age, "30", &known),
            Ok(FieldValue::Age(30))
        );
        assert_eq!(
            validate_field(ProfileField::Gender, "f", &known),
            Ok(FieldValue::Gender(Gender::Female))
        );
        assert_eq!(
            validate_field(ProfileField::Height, "171,5", &known),
            Ok(FieldValue::Height(171.5))
        );
        assert_eq!(
            validate_field(ProfileField::Weight, "82", &known),
            Ok(FieldValue::Weight(82.0))
        );
        assert_eq!(
            validate_field(ProfileField::ActivityLevel, "3", &known),
            Ok(FieldValue::ActivityLevel(3))
        );
        assert_eq!(
            validate_field(ProfileField::Goal, " run a marathon ", &known),
            Ok(FieldValue::Goal("run a marathon".to_owned()))
        );
        assert_eq!(
            validate_field(ProfileField::Goal, "   ", &known),
            Err(ValidationError::EmptyGoal)
        );
    }

    #[test]
    fn week_coverage_passes_any_case_and_order() {
        let plan = "SUNDAY: rest. saturday: run. Friday, Thursday, wednesday, \
                    Tuesday and Monday: lift.";
        assert_eq!(check_week_coverage(plan), Ok(()));
    }

    #[test]
    fn week_coverage_names_exactly_the_missing_days() {
        let plan = "Monday: push. Tuesday: pull. Thursday: legs. Saturday: run. Sunday: rest.";
        assert_eq!(
            check_week_coverage(plan),
            Err(ValidationError::IncompleteWeekCoverage {
                missing: vec!["wednesday".to_owned(), "friday".to_owned()],
            })
        );
    }

    #[test]
    fn week_coverage_failure_message_lists_days() {
        let err = check_week_coverage("just monday").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("tuesday"));
        assert!(message.contains("sunday"));
        assert!(!message.contains("monday,"));
    }
}
