use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, ffi, params};

use crate::catalog::{self, DEFAULT_ICON, SeedFood};
use crate::error::{Error, Result};
use crate::models::{
    DailyConsumption, DateRange, Food, FoodConsumptionEntry, LoggedMeal, MealItem, NewFood,
    NewFoodEntry, NewUser, Profile, ProfileDefaults, ProfileUpdate, Role, TopFood, User,
    validate_calories, validate_limit, validate_quantity,
};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            Error::BackendUnavailable(format!("Failed to open database {}: {e}", path.display()))
        })?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                    age INTEGER,
                    height_cm INTEGER,
                    current_weight_deci INTEGER,
                    target_weight_deci INTEGER,
                    daily_goal INTEGER NOT NULL DEFAULT 2000,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    icon TEXT NOT NULL,
                    calories_per_100g INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_consumption (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    consumed INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, date)
                );

                CREATE TABLE IF NOT EXISTS food_consumption (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    food_id INTEGER NOT NULL REFERENCES foods(id) ON DELETE CASCADE,
                    date TEXT NOT NULL,
                    quantity REAL NOT NULL CHECK (quantity > 0),
                    calories INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);
                CREATE INDEX IF NOT EXISTS idx_food_consumption_user_date
                    ON food_consumption(user_id, date);
                CREATE INDEX IF NOT EXISTS idx_food_consumption_food ON food_consumption(food_id);

                PRAGMA user_version = 1;",
            )?;
            tracing::info!("applied schema version 1");
        }

        Ok(())
    }

    // Row helpers

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let role: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            // The CHECK constraint keeps this column to known values.
            role: Role::parse(&role).unwrap_or(Role::User),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            user_id: row.get(1)?,
            age: row.get(2)?,
            height_cm: row.get(3)?,
            current_weight_deci: row.get(4)?,
            target_weight_deci: row.get(5)?,
            daily_goal: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<Food> {
        Ok(Food {
            id: row.get(0)?,
            name: row.get(1)?,
            icon: row.get(2)?,
            calories_per_100g: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn daily_from_row(row: &rusqlite::Row) -> rusqlite::Result<DailyConsumption> {
        Ok(DailyConsumption {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: row.get(2)?,
            consumed: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    // Expects columns:
    // 0: fc.id, 1: fc.user_id, 2: fc.food_id, 3: fc.date, 4: fc.quantity,
    // 5: fc.calories, 6: fc.created_at, 7: f.name, 8: f.icon
    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodConsumptionEntry> {
        Ok(FoodConsumptionEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            food_id: row.get(2)?,
            date: row.get(3)?,
            quantity: row.get(4)?,
            calories: row.get(5)?,
            created_at: row.get(6)?,
            food_name: row.get(7)?,
            food_icon: row.get(8)?,
        })
    }

    // --- Users ---

    /// Create a user together with a default profile.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        self.insert_user(None, user)
    }

    /// Like [`Database::create_user`] but with a caller-chosen id.
    pub fn create_user_with_id(&self, id: i64, user: &NewUser) -> Result<User> {
        self.insert_user(Some(id), user)
    }

    fn insert_user(&self, id: Option<i64>, user: &NewUser) -> Result<User> {
        let now = Utc::now().to_rfc3339();
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO users (id, name, email, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, user.name, user.email, user.role.as_str(), now],
        )
        .map_err(|e| {
            on_constraint(e, || {
                Error::conflict(format!("A user with email '{}' already exists", user.email))
            })
        })?;
        let user_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO user_profiles
                (user_id, age, height_cm, current_weight_deci, target_weight_deci, daily_goal,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                user_id,
                ProfileDefaults::AGE,
                ProfileDefaults::HEIGHT_CM,
                ProfileDefaults::CURRENT_WEIGHT_DECI,
                ProfileDefaults::TARGET_WEIGHT_DECI,
                ProfileDefaults::DAILY_GOAL,
                now,
            ],
        )?;
        tx.commit()?;
        tracing::debug!(user_id, "created user with default profile");
        self.get_user(user_id)?
            .ok_or_else(|| Error::not_found(format!("User {user_id} not found after insert")))
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, name, email, role, created_at, updated_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // --- Profiles ---

    pub fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, age, height_cm, current_weight_deci, target_weight_deci,
                    daily_goal, created_at, updated_at
             FROM user_profiles WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::profile_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Create or partially update the user's profile. Fields left as `None`
    /// keep their stored value.
    pub fn upsert_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<Profile> {
        update.validate()?;
        let now = Utc::now().to_rfc3339();
        let profile = self
            .conn
            .query_row(
                "INSERT INTO user_profiles
                    (user_id, age, height_cm, current_weight_deci, target_weight_deci, daily_goal,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, ?7), ?8, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                    age = COALESCE(?2, age),
                    height_cm = COALESCE(?3, height_cm),
                    current_weight_deci = COALESCE(?4, current_weight_deci),
                    target_weight_deci = COALESCE(?5, target_weight_deci),
                    daily_goal = COALESCE(?6, daily_goal),
                    updated_at = ?8
                 RETURNING id, user_id, age, height_cm, current_weight_deci, target_weight_deci,
                           daily_goal, created_at, updated_at",
                params![
                    user_id,
                    update.age,
                    update.height_cm,
                    update.current_weight_deci,
                    update.target_weight_deci,
                    update.daily_goal,
                    ProfileDefaults::DAILY_GOAL,
                    now,
                ],
                Self::profile_from_row,
            )
            .map_err(|e| on_constraint(e, || unknown_user(user_id)))?;
        tracing::debug!(user_id, daily_goal = profile.daily_goal, "profile upserted");
        Ok(profile)
    }

    // --- Daily totals ---

    /// Set the total for `(user_id, date)`, replacing any previous value.
    /// Runs as one statement so concurrent writers can never produce two rows.
    pub fn upsert_daily_total(
        &self,
        user_id: i64,
        date: NaiveDate,
        consumed: i64,
    ) -> Result<DailyConsumption> {
        validate_calories("consumed", consumed)?;
        let now = Utc::now().to_rfc3339();
        let row = self
            .conn
            .query_row(
                "INSERT INTO daily_consumption (user_id, date, consumed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(user_id, date) DO UPDATE SET
                    consumed = excluded.consumed,
                    updated_at = excluded.updated_at
                 RETURNING id, user_id, date, consumed, created_at, updated_at",
                params![user_id, date, consumed, now],
                Self::daily_from_row,
            )
            .map_err(|e| on_constraint(e, || unknown_user(user_id)))?;
        tracing::debug!(user_id, %date, consumed, "daily total upserted");
        Ok(row)
    }

    /// Totals in `range`, oldest first. A reversed range yields nothing.
    pub fn get_daily_totals(&self, user_id: i64, range: DateRange) -> Result<Vec<DailyConsumption>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, date, consumed, created_at, updated_at
             FROM daily_consumption
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![user_id, range.start, range.end], Self::daily_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- Foods ---

    pub fn insert_food(&self, food: &NewFood) -> Result<Food> {
        food.validate()?;
        let now = Utc::now().to_rfc3339();
        let icon = food
            .icon
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_ICON);
        self.conn.execute(
            "INSERT INTO foods (name, icon, calories_per_100g, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![food.name.trim(), icon, food.calories_per_100g, now],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(food_id = id, food = %food.name.trim(), "food created");
        self.get_food_by_id(id)
    }

    pub fn get_food_by_id(&self, id: i64) -> Result<Food> {
        self.conn
            .query_row(
                "SELECT id, name, icon, calories_per_100g, created_at, updated_at
                 FROM foods WHERE id = ?1",
                params![id],
                Self::food_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(format!("Food {id} not found")))
    }

    /// The full catalog ordered by name.
    pub fn list_foods(&self) -> Result<Vec<Food>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, icon, calories_per_100g, created_at, updated_at
             FROM foods ORDER BY name COLLATE NOCASE ASC, id ASC",
        )?;
        let foods = stmt
            .query_map([], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Insert every seed food whose name is not already present. Returns the
    /// number of rows inserted, so a second run returns 0.
    pub fn seed_foods(&self, seeds: &[SeedFood]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO foods (name, icon, calories_per_100g, created_at, updated_at)
                 SELECT ?1, ?2, ?3, ?4, ?4
                 WHERE NOT EXISTS (SELECT 1 FROM foods WHERE name = ?1)",
            )?;
            for seed in seeds {
                inserted += stmt.execute(params![seed.name, seed.icon, seed.calories_per_100g, now])?;
            }
        }
        tx.commit()?;
        tracing::info!(inserted, total = seeds.len(), "seeded food catalog");
        Ok(inserted)
    }

    // --- Food consumption entries ---

    /// Record one food consumption event. Does not touch the day's total.
    pub fn add_food_entry(&self, user_id: i64, entry: &NewFoodEntry) -> Result<FoodConsumptionEntry> {
        validate_quantity(entry.quantity)?;
        validate_calories("calories", entry.calories)?;
        let now = Utc::now().to_rfc3339();
        // Selecting from foods makes a missing food insert nothing rather
        // than trip the foreign key.
        let id: Option<i64> = self
            .conn
            .query_row(
                "INSERT INTO food_consumption (user_id, food_id, date, quantity, calories, created_at)
                 SELECT ?1, id, ?3, ?4, ?5, ?6 FROM foods WHERE id = ?2
                 RETURNING id",
                params![user_id, entry.food_id, entry.date, entry.quantity, entry.calories, now],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| on_constraint(e, || unknown_user(user_id)))?;
        let id = id.ok_or_else(|| Error::not_found(format!("Food {} not found", entry.food_id)))?;
        tracing::debug!(user_id, entry_id = id, food_id = entry.food_id, "food entry added");
        self.get_food_entry(user_id, id)?
            .ok_or_else(|| Error::not_found(format!("Food entry {id} not found after insert")))
    }

    pub fn get_food_entry(&self, user_id: i64, id: i64) -> Result<Option<FoodConsumptionEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT fc.id, fc.user_id, fc.food_id, fc.date, fc.quantity, fc.calories,
                        fc.created_at, f.name, f.icon
                 FROM food_consumption fc
                 LEFT JOIN foods f ON f.id = fc.food_id
                 WHERE fc.id = ?1 AND fc.user_id = ?2",
                params![id, user_id],
                Self::entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Entries in `range`, newest first.
    pub fn get_food_entries(
        &self,
        user_id: i64,
        range: DateRange,
    ) -> Result<Vec<FoodConsumptionEntry>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT fc.id, fc.user_id, fc.food_id, fc.date, fc.quantity, fc.calories,
                    fc.created_at, f.name, f.icon
             FROM food_consumption fc
             LEFT JOIN foods f ON f.id = fc.food_id
             WHERE fc.user_id = ?1 AND fc.date >= ?2 AND fc.date <= ?3
             ORDER BY fc.date DESC, fc.id DESC",
        )?;
        let entries = stmt
            .query_map(params![user_id, range.start, range.end], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Delete an entry owned by `user_id`. The day's total is left as is.
    pub fn delete_food_entry(&self, user_id: i64, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_consumption WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Sum of snapshotted calories for one user on one day.
    pub fn sum_entry_calories(&self, user_id: i64, date: NaiveDate) -> Result<i64> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(calories), 0) FROM food_consumption
             WHERE user_id = ?1 AND date = ?2",
            params![user_id, date],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// The most frequently logged foods in `range`. Frequency counts entries,
    /// not grams or calories. Ties go to the alphabetically first name.
    pub fn top_foods(&self, user_id: i64, range: DateRange, limit: i64) -> Result<Vec<TopFood>> {
        validate_limit(limit)?;
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT fc.food_id, f.name, f.icon, COUNT(*) AS count
             FROM food_consumption fc
             JOIN foods f ON f.id = fc.food_id
             WHERE fc.user_id = ?1 AND fc.date >= ?2 AND fc.date <= ?3
             GROUP BY fc.food_id, f.name, f.icon
             ORDER BY count DESC, f.name ASC, fc.food_id ASC
             LIMIT ?4",
        )?;
        let top = stmt
            .query_map(params![user_id, range.start, range.end, limit], |row| {
                Ok(TopFood {
                    food_id: row.get(0)?,
                    food_name: row.get(1)?,
                    food_icon: row.get(2)?,
                    count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(top)
    }

    /// Log several foods for one day and set the day's total to the sum of
    /// all its entries. Either everything is written or nothing is.
    pub fn log_meal(&self, user_id: i64, date: NaiveDate, items: &[MealItem]) -> Result<LoggedMeal> {
        if items.is_empty() {
            return Err(Error::validation("A meal needs at least one food"));
        }
        for item in items {
            validate_quantity(item.quantity_grams)?;
        }

        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let food = self.get_food_by_id(item.food_id)?;
            let calories = catalog::calories_for(&food, item.quantity_grams);
            entries.push(self.add_food_entry(
                user_id,
                &NewFoodEntry {
                    food_id: food.id,
                    date,
                    quantity: item.quantity_grams,
                    calories,
                },
            )?);
        }
        let total = self.sum_entry_calories(user_id, date)?;
        let daily = self.upsert_daily_total(user_id, date, total)?;
        tx.commit()?;

        tracing::info!(user_id, %date, items = entries.len(), total, "meal logged");
        Ok(LoggedMeal { entries, daily })
    }
}

/// Turn a constraint violation into a domain error, keeping every other
/// failure as a storage error.
fn on_constraint(err: rusqlite::Error, domain: impl FnOnce() -> Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
                || e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            domain()
        }
        _ => Error::Storage(err),
    }
}

fn unknown_user(user_id: i64) -> Error {
    Error::not_found(format!("User {user_id} not found"))
}
