//! SqliteRemote - record store backed by a SQLite file
//!
//! ## Tables
//!
//! - `planner_entries` - one row per (user_id, step_id), `data` as JSON
//! - `weekly_plans` - one row per (user_id, id), `wins` as JSON
//! - `goal_scores` - one row per (user_id, goal_id)
//! - `flow_positions` - last step index per user
//! - `accounts` - email -> user id + password digest

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::{RemoteError, RemoteStore};
use crate::domain::{Entries, GoalScores, PlannerEntry, UserId, WeeklyPlan, WeeklyPlans};
use crate::session::{Authenticator, Credentials, SessionError, normalize_email, password_digest};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS planner_entries (
    user_id TEXT NOT NULL,
    step_id TEXT NOT NULL,
    data TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, step_id)
);

CREATE TABLE IF NOT EXISTS weekly_plans (
    user_id TEXT NOT NULL,
    id TEXT NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    week_of_month INTEGER NOT NULL,
    focus TEXT NOT NULL,
    wins TEXT NOT NULL,
    schedule_notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, id)
);

CREATE TABLE IF NOT EXISTS goal_scores (
    user_id TEXT NOT NULL,
    goal_id TEXT NOT NULL,
    score INTEGER NOT NULL,
    PRIMARY KEY (user_id, goal_id)
);

CREATE TABLE IF NOT EXISTS flow_positions (
    user_id TEXT PRIMARY KEY,
    step_index INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS accounts (
    email TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE,
    password_digest TEXT NOT NULL
);
"#;

/// SQLite-backed remote store and authenticator
pub struct SqliteRemote {
    conn: Mutex<Connection>,
}

impl SqliteRemote {
    /// Open or create the database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RemoteError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening planner database");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RemoteError::Unavailable(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, RemoteError> {
        debug!("Opening in-memory planner database");
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RemoteError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RemoteError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RemoteError::Operation(format!("Bad timestamp {:?}: {}", raw, e)))
}

struct WeeklyPlanRow {
    id: String,
    year: i32,
    month: u32,
    week_of_month: u32,
    focus: String,
    wins: String,
    schedule_notes: Option<String>,
    created_at: String,
}

impl WeeklyPlanRow {
    fn into_plan(self) -> Result<WeeklyPlan, RemoteError> {
        Ok(WeeklyPlan {
            id: self.id,
            year: self.year,
            month: self.month,
            week_of_month: self.week_of_month,
            focus: self.focus,
            wins: serde_json::from_str(&self.wins)?,
            schedule_notes: self.schedule_notes,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[async_trait]
impl RemoteStore for SqliteRemote {
    async fn fetch_entries(&self, user: &UserId) -> Result<Entries, RemoteError> {
        debug!(%user, "fetch_entries: called");
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT step_id, data FROM planner_entries WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Entries::new();
        for row in rows {
            let (step_id, data) = row?;
            entries.insert(step_id, serde_json::from_str(&data)?);
        }
        Ok(entries)
    }

    async fn upsert_entry(
        &self,
        user: &UserId,
        step_id: &str,
        data: &PlannerEntry,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RemoteError> {
        debug!(%user, %step_id, "upsert_entry: called");
        let data = serde_json::to_string(data)?;
        self.conn().execute(
            "INSERT INTO planner_entries (user_id, step_id, data, completed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, step_id) DO UPDATE SET
                data = excluded.data,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at",
            params![
                user.as_str(),
                step_id,
                data,
                completed_at.to_rfc3339(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn fetch_weekly_plans(&self, user: &UserId) -> Result<WeeklyPlans, RemoteError> {
        debug!(%user, "fetch_weekly_plans: called");
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, year, month, week_of_month, focus, wins, schedule_notes, created_at
             FROM weekly_plans WHERE user_id = ?1",
        )?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok(WeeklyPlanRow {
                id: row.get(0)?,
                year: row.get(1)?,
                month: row.get(2)?,
                week_of_month: row.get(3)?,
                focus: row.get(4)?,
                wins: row.get(5)?,
                schedule_notes: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;

        let mut plans = WeeklyPlans::new();
        for row in rows {
            let plan = row?.into_plan()?;
            plans.insert(plan.id.clone(), plan);
        }
        Ok(plans)
    }

    async fn upsert_weekly_plan(&self, user: &UserId, plan: &WeeklyPlan) -> Result<(), RemoteError> {
        debug!(%user, plan_id = %plan.id, "upsert_weekly_plan: called");
        let wins = serde_json::to_string(&plan.wins)?;
        self.conn().execute(
            "INSERT INTO weekly_plans
                (user_id, id, year, month, week_of_month, focus, wins, schedule_notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (user_id, id) DO UPDATE SET
                year = excluded.year,
                month = excluded.month,
                week_of_month = excluded.week_of_month,
                focus = excluded.focus,
                wins = excluded.wins,
                schedule_notes = excluded.schedule_notes,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                user.as_str(),
                plan.id,
                plan.year,
                plan.month,
                plan.week_of_month,
                plan.focus,
                wins,
                plan.schedule_notes,
                plan.created_at.to_rfc3339(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn delete_weekly_plan(&self, user: &UserId, plan_id: &str) -> Result<(), RemoteError> {
        debug!(%user, %plan_id, "delete_weekly_plan: called");
        self.conn().execute(
            "DELETE FROM weekly_plans WHERE user_id = ?1 AND id = ?2",
            params![user.as_str(), plan_id],
        )?;
        Ok(())
    }

    async fn fetch_goal_scores(&self, user: &UserId) -> Result<GoalScores, RemoteError> {
        debug!(%user, "fetch_goal_scores: called");
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT goal_id, score FROM goal_scores WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u8>(1)?))
        })?;
        let mut scores = GoalScores::new();
        for row in rows {
            let (goal_id, score) = row?;
            scores.insert(goal_id, score);
        }
        Ok(scores)
    }

    async fn upsert_goal_score(&self, user: &UserId, goal_id: &str, score: u8) -> Result<(), RemoteError> {
        debug!(%user, %goal_id, score, "upsert_goal_score: called");
        self.conn().execute(
            "INSERT INTO goal_scores (user_id, goal_id, score) VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id, goal_id) DO UPDATE SET score = excluded.score",
            params![user.as_str(), goal_id, score],
        )?;
        Ok(())
    }

    async fn fetch_flow_position(&self, user: &UserId) -> Result<Option<usize>, RemoteError> {
        debug!(%user, "fetch_flow_position: called");
        let index: Option<i64> = self
            .conn()
            .query_row(
                "SELECT step_index FROM flow_positions WHERE user_id = ?1",
                params![user.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(index.and_then(|i| usize::try_from(i).ok()))
    }

    async fn upsert_flow_position(&self, user: &UserId, index: usize) -> Result<(), RemoteError> {
        debug!(%user, index, "upsert_flow_position: called");
        let index = i64::try_from(index).map_err(|_| RemoteError::Operation(format!("Step index {} too large", index)))?;
        self.conn().execute(
            "INSERT INTO flow_positions (user_id, step_index) VALUES (?1, ?2)
             ON CONFLICT (user_id) DO UPDATE SET step_index = excluded.step_index",
            params![user.as_str(), index],
        )?;
        Ok(())
    }
}

fn backend_error(e: rusqlite::Error) -> SessionError {
    SessionError::Backend(e.to_string())
}

#[async_trait]
impl Authenticator for SqliteRemote {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserId, SessionError> {
        let email = normalize_email(&credentials.email);
        debug!(%email, "sign_in: called");
        let account: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT user_id, password_digest FROM accounts WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(backend_error)?;

        let (user_id, digest) = account.ok_or(SessionError::InvalidCredentials)?;
        let user_id = UserId::new(user_id);
        if digest != password_digest(&user_id, &credentials.password) {
            return Err(SessionError::InvalidCredentials);
        }
        Ok(user_id)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserId, SessionError> {
        let email = normalize_email(&credentials.email);
        debug!(%email, "sign_up: called");
        let user_id = UserId::new(Uuid::now_v7().to_string());
        let digest = password_digest(&user_id, &credentials.password);
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO accounts (email, user_id, password_digest) VALUES (?1, ?2, ?3)",
                params![email, user_id.as_str(), digest],
            )
            .map_err(backend_error)?;
        if inserted == 0 {
            return Err(SessionError::AccountExists(email));
        }
        Ok(user_id)
    }
}
