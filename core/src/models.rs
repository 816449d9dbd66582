use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(Error::validation(format!(
                "Invalid role '{other}'. Must be one of: user, admin"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub age: Option<i64>,
    pub height_cm: Option<i64>,
    /// Kilograms times ten (720 = 72.0 kg).
    pub current_weight_deci: Option<i64>,
    pub target_weight_deci: Option<i64>,
    pub daily_goal: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Values applied when a user has no stored profile, or a field is unset.
pub struct ProfileDefaults;

impl ProfileDefaults {
    pub const AGE: i64 = 30;
    pub const HEIGHT_CM: i64 = 170;
    pub const CURRENT_WEIGHT_DECI: i64 = 700;
    pub const TARGET_WEIGHT_DECI: i64 = 650;
    pub const DAILY_GOAL: i64 = 2000;
}

/// A profile with every default filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveProfile {
    pub age: i64,
    pub height_cm: i64,
    pub current_weight_deci: i64,
    pub target_weight_deci: i64,
    pub daily_goal: i64,
}

impl Profile {
    #[must_use]
    pub fn effective(profile: Option<&Profile>) -> EffectiveProfile {
        EffectiveProfile {
            age: profile
                .and_then(|p| p.age)
                .unwrap_or(ProfileDefaults::AGE),
            height_cm: profile
                .and_then(|p| p.height_cm)
                .unwrap_or(ProfileDefaults::HEIGHT_CM),
            current_weight_deci: profile
                .and_then(|p| p.current_weight_deci)
                .unwrap_or(ProfileDefaults::CURRENT_WEIGHT_DECI),
            target_weight_deci: profile
                .and_then(|p| p.target_weight_deci)
                .unwrap_or(ProfileDefaults::TARGET_WEIGHT_DECI),
            daily_goal: profile.map_or(ProfileDefaults::DAILY_GOAL, |p| p.daily_goal),
        }
    }
}

/// Profile fields to write. `None` keeps the stored value (or the default on
/// first write).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub age: Option<i64>,
    pub height_cm: Option<i64>,
    pub current_weight_deci: Option<i64>,
    pub target_weight_deci: Option<i64>,
    pub daily_goal: Option<i64>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        check_range("age", self.age, 1, 150)?;
        check_range("heightCm", self.height_cm, 50, 300)?;
        check_range("currentWeightDeci", self.current_weight_deci, 1, 5000)?;
        check_range("targetWeightDeci", self.target_weight_deci, 1, 5000)?;
        check_range("dailyGoal", self.daily_goal, 500, 10_000)?;
        Ok(())
    }
}

fn check_range(field: &str, value: Option<i64>, min: i64, max: i64) -> Result<()> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(Error::validation(format!(
            "{field} must be between {min} and {max} (got {v})"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub calories_per_100g: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFood {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub calories_per_100g: Option<i64>,
}

impl NewFood {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Food name must not be empty"));
        }
        if self.calories_per_100g.is_some_and(|c| c < 0) {
            return Err(Error::validation("caloriesPer100g must not be negative"));
        }
        Ok(())
    }
}

/// The authoritative calorie total for one user on one calendar day.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyConsumption {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub consumed: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodConsumptionEntry {
    pub id: i64,
    pub user_id: i64,
    pub food_id: i64,
    pub date: NaiveDate,
    pub quantity: f64,
    /// Snapshot taken at write time; never recomputed from the catalog.
    pub calories: i64,
    pub created_at: String,
    // Joined fields for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFoodEntry {
    pub food_id: i64,
    pub date: NaiveDate,
    pub quantity: f64,
    pub calories: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopFood {
    pub food_id: i64,
    pub food_name: String,
    pub food_icon: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealItem {
    pub food_id: i64,
    pub quantity_grams: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedMeal {
    pub entries: Vec<FoodConsumptionEntry>,
    pub daily: DailyConsumption,
}

/// Inclusive calendar-date window. `start > end` is legal and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: parse_date(start)?,
            end: parse_date(end)?,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// Parse a `YYYY-MM-DD` calendar date. Anything else is rejected rather than
/// treated as "no filter".
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields; the boundary format is strictly padded.
    if trimmed.len() != 10 {
        return Err(Error::invalid_range(format!(
            "Invalid date '{value}'. Must be YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| Error::invalid_range(format!("Invalid date '{value}'. Must be YYYY-MM-DD")))
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn validate_quantity(quantity: f64) -> Result<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::validation(format!(
            "quantity must be greater than 0 (got {quantity})"
        )));
    }
    Ok(())
}

/// Upper bound for any stored calorie figure: a daily total or one entry.
pub const MAX_CALORIES: i64 = 100_000;

pub fn validate_calories(field: &str, value: i64) -> Result<()> {
    if !(0..=MAX_CALORIES).contains(&value) {
        return Err(Error::validation(format!(
            "{field} must be between 0 and {MAX_CALORIES} (got {value})"
        )));
    }
    Ok(())
}

pub fn validate_limit(limit: i64) -> Result<()> {
    if limit < 1 {
        return Err(Error::validation(format!(
            "limit must be at least 1 (got {limit})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_date_valid() {
        let d = parse_date("2025-10-01").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
    }

    #[test]
    fn test_parse_date_rejects_malformed() {
        for bad in ["", "2025-1-1", "2025/10/01", "yesterday", "2025-02-30", "2025-10-01T00:00"] {
            let err = parse_date(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange, "{bad}");
        }
    }

    #[test]
    fn test_date_range_empty_when_reversed() {
        let range = DateRange::parse("2025-10-10", "2025-10-01").unwrap();
        assert!(range.is_empty());
        let range = DateRange::parse("2025-10-01", "2025-10-01").unwrap();
        assert!(!range.is_empty());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(100.0).is_ok());
        assert!(validate_quantity(0.5).is_ok());
        assert_eq!(
            validate_quantity(0.0).unwrap_err().kind(),
            ErrorKind::ValidationFailed
        );
        assert!(validate_quantity(-3.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_calories_bounds() {
        assert!(validate_calories("consumed", 0).is_ok());
        assert!(validate_calories("consumed", MAX_CALORIES).is_ok());
        assert!(validate_calories("consumed", -1).is_err());
        let err = validate_calories("consumed", i64::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_validate_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(-5).is_err());
    }

    #[test]
    fn test_effective_profile_defaults() {
        let eff = Profile::effective(None);
        assert_eq!(eff.age, 30);
        assert_eq!(eff.height_cm, 170);
        assert_eq!(eff.daily_goal, 2000);
        assert_eq!(eff.target_weight_deci, 650);
    }

    #[test]
    fn test_effective_profile_keeps_stored_values() {
        let profile = Profile {
            id: 1,
            user_id: 7,
            age: Some(41),
            height_cm: None,
            current_weight_deci: Some(812),
            target_weight_deci: None,
            daily_goal: 1800,
            created_at: String::new(),
            updated_at: String::new(),
        };
        let eff = Profile::effective(Some(&profile));
        assert_eq!(eff.age, 41);
        assert_eq!(eff.height_cm, ProfileDefaults::HEIGHT_CM);
        assert_eq!(eff.current_weight_deci, 812);
        assert_eq!(eff.daily_goal, 1800);
    }

    #[test]
    fn test_profile_update_validation() {
        assert!(ProfileUpdate::default().validate().is_ok());
        let update = ProfileUpdate {
            age: Some(32),
            daily_goal: Some(1800),
            ..ProfileUpdate::default()
        };
        assert!(update.validate().is_ok());

        let update = ProfileUpdate {
            age: Some(0),
            ..ProfileUpdate::default()
        };
        assert!(update.validate().is_err());

        let update = ProfileUpdate {
            daily_goal: Some(100),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            update.validate().unwrap_err().kind(),
            ErrorKind::ValidationFailed
        );
    }

    #[test]
    fn test_new_food_validation() {
        let food = NewFood {
            name: "  ".to_string(),
            icon: None,
            calories_per_100g: Some(100),
        };
        assert!(food.validate().is_err());

        let food = NewFood {
            name: "Banana".to_string(),
            icon: None,
            calories_per_100g: Some(-1),
        };
        assert!(food.validate().is_err());

        let food = NewFood {
            name: "Mystery stew".to_string(),
            icon: None,
            calories_per_100g: None,
        };
        assert!(food.validate().is_ok());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert!(Role::parse("root").is_err());
    }

    #[test]
    fn test_profile_update_rejects_unknown_fields() {
        let parsed: std::result::Result<ProfileUpdate, _> =
            serde_json::from_str(r#"{"age": 30, "weight": 70}"#);
        assert!(parsed.is_err());
        let parsed: ProfileUpdate = serde_json::from_str(r#"{"dailyGoal": 1900}"#).unwrap();
        assert_eq!(parsed.daily_goal, Some(1900));
    }
}
