use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::SEED_FOODS;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    DailyConsumption, DateRange, Food, FoodConsumptionEntry, LoggedMeal, MealItem, NewFood,
    NewFoodEntry, NewUser, Profile, ProfileUpdate, Role, TopFood, User, parse_date,
};
use crate::progress::{self, Progress, ProgressThresholds};

/// `foods.topConsumed` limit when the caller gives none.
pub const DEFAULT_TOP_LIMIT: i64 = 5;

/// `foodConsumption.add` quantity when the caller gives none.
pub const DEFAULT_QUANTITY: f64 = 1.0;

/// What reads do when the store cannot be reached.
///
/// `Strict` fails every call with `BackendUnavailable`. `Degraded` is the
/// offline mode for local tooling: reads return an empty result (and log a
/// warning) while mutations still fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    #[default]
    Strict,
    Degraded,
}

impl FromStr for ReadMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "degraded" => Ok(Self::Degraded),
            other => Err(Error::validation(format!(
                "Invalid read mode '{other}'. Must be one of: strict, degraded"
            ))),
        }
    }
}

enum Backend {
    Connected(Database),
    Unavailable { reason: String },
}

/// Everything the progress screen shows for one window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub goal: i64,
    pub totals: Vec<DailyConsumption>,
    pub top_foods: Vec<TopFood>,
    pub progress: Progress,
}

/// Entry point for every operation. The caller identity is resolved
/// upstream and passed in as `user_id`; this layer never derives it.
pub struct NutritionService {
    backend: Backend,
    read_mode: ReadMode,
    thresholds: ProgressThresholds,
}

impl NutritionService {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            backend: Backend::Connected(db),
            read_mode: ReadMode::Strict,
            thresholds: ProgressThresholds::default(),
        }
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// A service with no store behind it.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>, read_mode: ReadMode) -> Self {
        Self {
            backend: Backend::Unavailable {
                reason: reason.into(),
            },
            read_mode,
            thresholds: ProgressThresholds::default(),
        }
    }

    /// Open the database at `path`. In strict mode a failure to open is
    /// returned; in degraded mode the service starts without a store.
    pub fn connect(path: &Path, read_mode: ReadMode) -> Result<Self> {
        match Database::open(path) {
            Ok(db) => Ok(Self::new(db).with_read_mode(read_mode)),
            Err(e) if read_mode == ReadMode::Degraded => {
                tracing::warn!(error = %e, "store unavailable, starting in degraded read mode");
                Ok(Self::unavailable(e.to_string(), read_mode))
            }
            Err(e) => Err(e),
        }
    }

    #[must_use]
    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: ProgressThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Connected(_))
    }

    fn db(&self) -> Result<&Database> {
        match &self.backend {
            Backend::Connected(db) => Ok(db),
            Backend::Unavailable { reason } => Err(Error::BackendUnavailable(reason.clone())),
        }
    }

    fn read<T: Default>(&self, operation: &str, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        match (&self.backend, self.read_mode) {
            (Backend::Connected(db), _) => f(db),
            (Backend::Unavailable { .. }, ReadMode::Degraded) => {
                tracing::warn!(operation, "store unavailable, returning empty result");
                Ok(T::default())
            }
            (Backend::Unavailable { reason }, ReadMode::Strict) => {
                Err(Error::BackendUnavailable(reason.clone()))
            }
        }
    }

    // --- Users ---

    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        self.db()?.create_user(user)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.read("users.get", |db| db.get_user(id))
    }

    /// Make sure a user with `id` exists, creating a local one if needed.
    /// Used by the CLI, which has no registration flow.
    pub fn ensure_local_user(&self, id: i64) -> Result<User> {
        let db = self.db()?;
        if let Some(user) = db.get_user(id)? {
            return Ok(user);
        }
        tracing::info!(user_id = id, "creating local user");
        db.create_user_with_id(
            id,
            &NewUser {
                name: format!("Local user {id}"),
                email: format!("user{id}@localhost"),
                role: Role::User,
            },
        )
    }

    // --- profile.* ---

    pub fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        self.read("profile.get", |db| db.get_profile(user_id))
    }

    pub fn upsert_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<Profile> {
        update.validate()?;
        self.db()?.upsert_profile(user_id, update)
    }

    // --- consumption.* ---

    pub fn get_consumption_range(
        &self,
        user_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<DailyConsumption>> {
        let range = DateRange::parse(start_date, end_date)?;
        self.read("consumption.getRange", |db| db.get_daily_totals(user_id, range))
    }

    pub fn upsert_consumption(
        &self,
        user_id: i64,
        date: &str,
        consumed: i64,
    ) -> Result<DailyConsumption> {
        let date = parse_date(date)?;
        self.db()?.upsert_daily_total(user_id, date, consumed)
    }

    // --- foods.* ---

    pub fn list_foods(&self) -> Result<Vec<Food>> {
        self.read("foods.list", Database::list_foods)
    }

    pub fn create_food(&self, food: &NewFood) -> Result<Food> {
        food.validate()?;
        self.db()?.insert_food(food)
    }

    pub fn get_food(&self, id: i64) -> Result<Food> {
        self.db()?.get_food_by_id(id)
    }

    pub fn seed_foods(&self) -> Result<usize> {
        self.db()?.seed_foods(SEED_FOODS)
    }

    pub fn top_consumed_foods(
        &self,
        user_id: i64,
        start_date: &str,
        end_date: &str,
        limit: Option<i64>,
    ) -> Result<Vec<TopFood>> {
        let range = DateRange::parse(start_date, end_date)?;
        let limit = limit.unwrap_or(DEFAULT_TOP_LIMIT);
        crate::models::validate_limit(limit)?;
        self.read("foods.topConsumed", |db| db.top_foods(user_id, range, limit))
    }

    // --- foodConsumption.* ---

    pub fn list_food_consumption(
        &self,
        user_id: i64,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<FoodConsumptionEntry>> {
        let range = DateRange::parse(start_date, end_date)?;
        self.read("foodConsumption.list", |db| db.get_food_entries(user_id, range))
    }

    /// Append one entry with caller-computed calories. The day's total is
    /// not touched; use [`NutritionService::log_meal`] for that.
    pub fn add_food_consumption(
        &self,
        user_id: i64,
        food_id: i64,
        date: &str,
        quantity: Option<f64>,
        calories: i64,
    ) -> Result<FoodConsumptionEntry> {
        let date = parse_date(date)?;
        let quantity = quantity.unwrap_or(DEFAULT_QUANTITY);
        crate::models::validate_quantity(quantity)?;
        self.db()?.add_food_entry(
            user_id,
            &NewFoodEntry {
                food_id,
                date,
                quantity,
                calories,
            },
        )
    }

    pub fn delete_food_consumption(&self, user_id: i64, entry_id: i64) -> Result<bool> {
        self.db()?.delete_food_entry(user_id, entry_id)
    }

    pub fn log_meal(&self, user_id: i64, date: &str, items: &[MealItem]) -> Result<LoggedMeal> {
        let date = parse_date(date)?;
        self.db()?.log_meal(user_id, date, items)
    }

    // --- progress ---

    pub fn dashboard(&self, user_id: i64, start_date: &str, end_date: &str) -> Result<Dashboard> {
        let range = DateRange::parse(start_date, end_date)?;
        let profile = self.read("profile.get", |db| db.get_profile(user_id))?;
        let goal = Profile::effective(profile.as_ref()).daily_goal;
        let totals = self.read("consumption.getRange", |db| db.get_daily_totals(user_id, range))?;
        let top_foods = self.read("foods.topConsumed", |db| {
            db.top_foods(user_id, range, DEFAULT_TOP_LIMIT)
        })?;
        let progress = progress::classify_rows(&totals, goal, &self.thresholds);
        Ok(Dashboard {
            start: range.start,
            end: range.end,
            goal,
            totals,
            top_foods,
            progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::ProgressCategory;

    fn service_with_user() -> (NutritionService, i64) {
        let svc = NutritionService::new_in_memory().unwrap();
        let user = svc.ensure_local_user(1).unwrap();
        (svc, user.id)
    }

    #[test]
    fn test_ensure_local_user_is_idempotent() {
        let (svc, id) = service_with_user();
        assert_eq!(id, 1);
        let again = svc.ensure_local_user(1).unwrap();
        assert_eq!(again.email, "user1@localhost");
        assert!(svc.get_profile(1).unwrap().is_some());
    }

    #[test]
    fn test_consumption_upsert_and_range() {
        let (svc, user) = service_with_user();
        svc.upsert_consumption(user, "2025-10-02", 1800).unwrap();
        svc.upsert_consumption(user, "2025-10-01", 2200).unwrap();
        svc.upsert_consumption(user, "2025-10-02", 1900).unwrap();

        let rows = svc
            .get_consumption_range(user, "2025-10-01", "2025-10-07")
            .unwrap();
        let values: Vec<i64> = rows.iter().map(|r| r.consumed).collect();
        assert_eq!(values, vec![2200, 1900]);
    }

    #[test]
    fn test_malformed_dates_are_invalid_range() {
        let (svc, user) = service_with_user();
        for (start, end) in [("", "2025-10-01"), ("2025-10-01", "tomorrow"), ("01/10/2025", "2025-10-02")] {
            let err = svc.get_consumption_range(user, start, end).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange);
            let err = svc.list_food_consumption(user, start, end).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange);
        }
        let err = svc.upsert_consumption(user, "2025-13-01", 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
    }

    #[test]
    fn test_add_food_consumption_defaults_quantity() {
        let (svc, user) = service_with_user();
        let food = svc
            .create_food(&NewFood {
                name: "Café".to_string(),
                icon: Some("☕".to_string()),
                calories_per_100g: Some(2),
            })
            .unwrap();
        let entry = svc
            .add_food_consumption(user, food.id, "2025-10-01", None, 40)
            .unwrap();
        assert!((entry.quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(entry.calories, 40);
        assert_eq!(entry.food_icon.as_deref(), Some("☕"));

        let err = svc
            .add_food_consumption(user, food.id, "2025-10-01", Some(0.0), 40)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_top_consumed_default_limit() {
        let (svc, user) = service_with_user();
        svc.seed_foods().unwrap();
        let foods = svc.list_foods().unwrap();
        for food in foods.iter().take(7) {
            svc.add_food_consumption(user, food.id, "2025-10-01", Some(100.0), 0)
                .unwrap();
        }
        let top = svc
            .top_consumed_foods(user, "2025-10-01", "2025-10-01", None)
            .unwrap();
        assert_eq!(top.len(), 5);

        let err = svc
            .top_consumed_foods(user, "2025-10-01", "2025-10-01", Some(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_log_meal_through_service() {
        let (svc, user) = service_with_user();
        let rice = svc
            .create_food(&NewFood {
                name: "Arroz Branco".to_string(),
                icon: None,
                calories_per_100g: Some(130),
            })
            .unwrap();
        let meal = svc
            .log_meal(
                user,
                "2025-10-01",
                &[MealItem {
                    food_id: rice.id,
                    quantity_grams: 200.0,
                }],
            )
            .unwrap();
        assert_eq!(meal.daily.consumed, 260);

        let rows = svc
            .get_consumption_range(user, "2025-10-01", "2025-10-01")
            .unwrap();
        assert_eq!(rows[0].consumed, 260);
    }

    #[test]
    fn test_dashboard_uses_profile_goal() {
        let (svc, user) = service_with_user();
        svc.upsert_profile(
            user,
            &ProfileUpdate {
                daily_goal: Some(1500),
                ..Default::default()
            },
        )
        .unwrap();
        for day in 1..=5 {
            svc.upsert_consumption(user, &format!("2025-10-0{day}"), 1700)
                .unwrap();
        }
        let dash = svc.dashboard(user, "2025-10-01", "2025-10-07").unwrap();
        assert_eq!(dash.goal, 1500);
        assert_eq!(dash.totals.len(), 5);
        assert_eq!(dash.progress.category(), ProgressCategory::NeedsAttention);
    }

    #[test]
    fn test_dashboard_survives_rejected_huge_totals() {
        let (svc, user) = service_with_user();
        for day in ["2025-10-01", "2025-10-02"] {
            let err = svc.upsert_consumption(user, day, i64::MAX).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        }
        svc.upsert_consumption(user, "2025-10-01", 100_000).unwrap();
        svc.upsert_consumption(user, "2025-10-02", 100_000).unwrap();

        let dash = svc.dashboard(user, "2025-10-01", "2025-10-02").unwrap();
        assert_eq!(
            dash.progress,
            Progress::NeedsAttention {
                avg: 100_000,
                goal: 2000,
                pct_over: 4900
            }
        );
    }

    #[test]
    fn test_dashboard_without_profile_uses_default_goal() {
        let svc = NutritionService::new_in_memory().unwrap();
        let dash = svc.dashboard(7, "2025-10-01", "2025-10-07").unwrap();
        assert_eq!(dash.goal, 2000);
        assert_eq!(dash.progress, Progress::InsufficientData);
    }

    #[test]
    fn test_thresholds_flow_into_dashboard() {
        let svc = NutritionService::new_in_memory()
            .unwrap()
            .with_thresholds(ProgressThresholds {
                min_pct_met: 0,
                avg_tolerance: 2.0,
            });
        svc.ensure_local_user(1).unwrap();
        svc.upsert_consumption(1, "2025-10-01", 3000).unwrap();
        let dash = svc.dashboard(1, "2025-10-01", "2025-10-01").unwrap();
        assert_eq!(dash.progress.category(), ProgressCategory::OnTrack);
    }

    #[test]
    fn test_strict_mode_fails_reads_and_writes() {
        let svc = NutritionService::unavailable("no database configured", ReadMode::Strict);
        assert!(!svc.is_available());
        let err = svc.list_foods().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        let err = svc
            .get_consumption_range(1, "2025-10-01", "2025-10-02")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        let err = svc.upsert_consumption(1, "2025-10-01", 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_degraded_mode_empties_reads_only() {
        let svc = NutritionService::unavailable("no database configured", ReadMode::Degraded);
        assert!(svc.list_foods().unwrap().is_empty());
        assert!(svc.get_profile(1).unwrap().is_none());
        assert!(svc
            .get_consumption_range(1, "2025-10-01", "2025-10-02")
            .unwrap()
            .is_empty());
        assert!(svc
            .top_consumed_foods(1, "2025-10-01", "2025-10-02", None)
            .unwrap()
            .is_empty());

        let dash = svc.dashboard(1, "2025-10-01", "2025-10-02").unwrap();
        assert_eq!(dash.progress, Progress::InsufficientData);

        // Bad input is still rejected
        let err = svc.get_consumption_range(1, "nope", "2025-10-02").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);

        // Mutations never silently succeed
        let err = svc.upsert_consumption(1, "2025-10-01", 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        let err = svc
            .create_food(&NewFood {
                name: "Pizza".to_string(),
                icon: None,
                calories_per_100g: Some(266),
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[test]
    fn test_connect_degraded_on_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("nutrilog.db");
        assert!(NutritionService::connect(&path, ReadMode::Strict).is_err());

        let svc = NutritionService::connect(&path, ReadMode::Degraded).unwrap();
        assert!(!svc.is_available());
        assert_eq!(svc.read_mode(), ReadMode::Degraded);
    }

    #[test]
    fn test_read_mode_from_str() {
        assert_eq!("strict".parse::<ReadMode>().unwrap(), ReadMode::Strict);
        assert_eq!(" Degraded ".parse::<ReadMode>().unwrap(), ReadMode::Degraded);
        assert!("offline".parse::<ReadMode>().is_err());
    }
}
