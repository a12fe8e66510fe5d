//! MemoryRemote - in-process backend
//!
//! Holds every user's records in maps. Used by tests and as the reference
//! behaviour for conflict keys. Can be switched offline to simulate a
//! failing server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{RemoteError, RemoteStore};
use crate::domain::{Entries, GoalScores, PlannerEntry, UserId, WeeklyPlan, WeeklyPlans};
use crate::session::{Authenticator, Credentials, SessionError, normalize_email, password_digest};

#[derive(Debug, Default, Clone)]
struct UserRecords {
    entries: Entries,
    completed_at: HashMap<String, DateTime<Utc>>,
    weekly_plans: WeeklyPlans,
    goal_scores: GoalScores,
    flow_position: Option<usize>,
}

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    password_digest: String,
}

/// In-memory remote store and authenticator
#[derive(Debug, Default)]
pub struct MemoryRemote {
    users: Mutex<HashMap<UserId, UserRecords>>,
    accounts: Mutex<HashMap<String, Account>>,
    offline: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        debug!(offline, "MemoryRemote::set_offline: called");
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Total stored records across all users
    pub fn record_count(&self) -> usize {
        lock(&self.users)
            .values()
            .map(|r| r.entries.len() + r.weekly_plans.len() + r.goal_scores.len() + usize::from(r.flow_position.is_some()))
            .sum()
    }

    /// When a step was last mirrored for a user
    pub fn completed_at(&self, user: &UserId, step_id: &str) -> Option<DateTime<Utc>> {
        lock(&self.users).get(user).and_then(|r| r.completed_at.get(step_id).copied())
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Operation("server unreachable".to_string()));
        }
        Ok(())
    }

    fn read<T>(&self, user: &UserId, f: impl FnOnce(&UserRecords) -> T) -> Result<T, RemoteError> {
        self.check_online()?;
        let users = lock(&self.users);
        let empty = UserRecords::default();
        Ok(f(users.get(user).unwrap_or(&empty)))
    }

    fn write(&self, user: &UserId, f: impl FnOnce(&mut UserRecords)) -> Result<(), RemoteError> {
        self.check_online()?;
        f(lock(&self.users).entry(user.clone()).or_default());
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_entries(&self, user: &UserId) -> Result<Entries, RemoteError> {
        self.read(user, |r| r.entries.clone())
    }

    async fn upsert_entry(
        &self,
        user: &UserId,
        step_id: &str,
        data: &PlannerEntry,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RemoteError> {
        self.write(user, |r| {
            r.entries.insert(step_id.to_string(), data.clone());
            r.completed_at.insert(step_id.to_string(), completed_at);
        })
    }

    async fn fetch_weekly_plans(&self, user: &UserId) -> Result<WeeklyPlans, RemoteError> {
        self.read(user, |r| r.weekly_plans.clone())
    }

    async fn upsert_weekly_plan(&self, user: &UserId, plan: &WeeklyPlan) -> Result<(), RemoteError> {
        self.write(user, |r| {
            r.weekly_plans.insert(plan.id.clone(), plan.clone());
        })
    }

    async fn delete_weekly_plan(&self, user: &UserId, plan_id: &str) -> Result<(), RemoteError> {
        self.write(user, |r| {
            r.weekly_plans.remove(plan_id);
        })
    }

    async fn fetch_goal_scores(&self, user: &UserId) -> Result<GoalScores, RemoteError> {
        self.read(user, |r| r.goal_scores.clone())
    }

    async fn upsert_goal_score(&self, user: &UserId, goal_id: &str, score: u8) -> Result<(), RemoteError> {
        self.write(user, |r| {
            r.goal_scores.insert(goal_id.to_string(), score);
        })
    }

    async fn fetch_flow_position(&self, user: &UserId) -> Result<Option<usize>, RemoteError> {
        self.read(user, |r| r.flow_position)
    }

    async fn upsert_flow_position(&self, user: &UserId, index: usize) -> Result<(), RemoteError> {
        self.write(user, |r| r.flow_position = Some(index))
    }
}

#[async_trait]
impl Authenticator for MemoryRemote {
    async fn sign_in(&self, credentials: &Credentials) -> Result<UserId, SessionError> {
        let email = normalize_email(&credentials.email);
        let accounts = lock(&self.accounts);
        let account = accounts.get(&email).ok_or(SessionError::InvalidCredentials)?;
        if account.password_digest != password_digest(&account.user_id, &credentials.password) {
            return Err(SessionError::InvalidCredentials);
        }
        Ok(account.user_id.clone())
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<UserId, SessionError> {
        let email = normalize_email(&credentials.email);
        let mut accounts = lock(&self.accounts);
        if accounts.contains_key(&email) {
            return Err(SessionError::AccountExists(email));
        }
        let user_id = UserId::new(Uuid::now_v7().to_string());
        let digest = password_digest(&user_id, &credentials.password);
        accounts.insert(
            email,
            Account {
                user_id: user_id.clone(),
                password_digest: digest,
            },
        );
        Ok(user_id)
    }
}
