//! Gateway - user-scoped, failure-tolerant access to a RemoteStore
//!
//! Without a user, reads return empty maps and writes are skipped. Without a
//! backend the same happens with a warning: the planner keeps working
//! local-only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{RemoteError, RemoteStore};
use crate::domain::{Entries, GoalScores, PlannerEntry, UserId, WeeklyPlan, WeeklyPlans};

/// Result of a mirrored write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Stored remotely
    Persisted,
    /// Skipped: no identified user or no backend
    LocalOnly,
}

/// Façade consumed by hydration, the sync queue and the goal book
#[derive(Clone, Default)]
pub struct Gateway {
    backend: Option<Arc<dyn RemoteStore>>,
}

impl Gateway {
    pub fn new(backend: Arc<dyn RemoteStore>) -> Self {
        Self { backend: Some(backend) }
    }

    /// A gateway with no backend; every call is local-only
    pub fn local_only() -> Self {
        Self { backend: None }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    fn scoped<'a>(&'a self, user: Option<&'a UserId>, what: &str) -> Option<(&'a dyn RemoteStore, &'a UserId)> {
        let Some(backend) = self.backend.as_deref() else {
            warn!(%what, "Remote store not configured; staying local-only");
            return None;
        };
        let Some(user) = user else {
            warn!(%what, "Missing user id; staying local-only");
            return None;
        };
        Some((backend, user))
    }

    pub async fn fetch_entries(&self, user: Option<&UserId>) -> Result<Entries, RemoteError> {
        match self.scoped(user, "fetch_entries") {
            Some((backend, user)) => backend.fetch_entries(user).await,
            None => Ok(Entries::new()),
        }
    }

    pub async fn fetch_weekly_plans(&self, user: Option<&UserId>) -> Result<WeeklyPlans, RemoteError> {
        match self.scoped(user, "fetch_weekly_plans") {
            Some((backend, user)) => backend.fetch_weekly_plans(user).await,
            None => Ok(WeeklyPlans::new()),
        }
    }

    pub async fn fetch_goal_scores(&self, user: Option<&UserId>) -> Result<GoalScores, RemoteError> {
        match self.scoped(user, "fetch_goal_scores") {
            Some((backend, user)) => backend.fetch_goal_scores(user).await,
            None => Ok(GoalScores::new()),
        }
    }

    pub async fn fetch_flow_position(&self, user: Option<&UserId>) -> Result<Option<usize>, RemoteError> {
        match self.scoped(user, "fetch_flow_position") {
            Some((backend, user)) => backend.fetch_flow_position(user).await,
            None => Ok(None),
        }
    }

    pub async fn upsert_entry(
        &self,
        user: Option<&UserId>,
        step_id: &str,
        data: &PlannerEntry,
        completed_at: DateTime<Utc>,
    ) -> Result<WriteOutcome, RemoteError> {
        let Some((backend, user)) = self.scoped(user, "upsert_entry") else {
            return Ok(WriteOutcome::LocalOnly);
        };
        backend.upsert_entry(user, step_id, data, completed_at).await?;
        Ok(WriteOutcome::Persisted)
    }

    pub async fn upsert_weekly_plan(&self, user: Option<&UserId>, plan: &WeeklyPlan) -> Result<WriteOutcome, RemoteError> {
        let Some((backend, user)) = self.scoped(user, "upsert_weekly_plan") else {
            return Ok(WriteOutcome::LocalOnly);
        };
        backend.upsert_weekly_plan(user, plan).await?;
        Ok(WriteOutcome::Persisted)
    }

    pub async fn delete_weekly_plan(&self, user: Option<&UserId>, plan_id: &str) -> Result<WriteOutcome, RemoteError> {
        let Some((backend, user)) = self.scoped(user, "delete_weekly_plan") else {
            return Ok(WriteOutcome::LocalOnly);
        };
        backend.delete_weekly_plan(user, plan_id).await?;
        Ok(WriteOutcome::Persisted)
    }

    pub async fn upsert_goal_score(
        &self,
        user: Option<&UserId>,
        goal_id: &str,
        score: u8,
    ) -> Result<WriteOutcome, RemoteError> {
        let Some((backend, user)) = self.scoped(user, "upsert_goal_score") else {
            return Ok(WriteOutcome::LocalOnly);
        };
        backend.upsert_goal_score(user, goal_id, score).await?;
        Ok(WriteOutcome::Persisted)
    }

    pub async fn upsert_flow_position(&self, user: Option<&UserId>, index: usize) -> Result<WriteOutcome, RemoteError> {
        let Some((backend, user)) = self.scoped(user, "upsert_flow_position") else {
            return Ok(WriteOutcome::LocalOnly);
        };
        backend.upsert_flow_position(user, index).await?;
        Ok(WriteOutcome::Persisted)
    }
}
