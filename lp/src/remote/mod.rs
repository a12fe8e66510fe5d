//! Remote store gateway
//!
//! A thin CRUD façade over a hosted record store, scoped by user identity.
//!
//! - [`RemoteStore`] - backend trait (one record family per method group)
//! - [`Gateway`] - user-scoped façade that degrades to local-only
//! - [`MemoryRemote`] / [`SqliteRemote`] - backends

mod gateway;
mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Entries, GoalScores, PlannerEntry, UserId, WeeklyPlan, WeeklyPlans};

pub use gateway::{Gateway, WriteOutcome};
pub use memory::MemoryRemote;
pub use sqlite::SqliteRemote;

/// Errors from remote store operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote operation failed: {0}")]
    Operation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// The backend is missing or unreachable, as opposed to a single call failing
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

/// Backend for user-scoped planner records
///
/// Upserts are last-write-wins with a full replace of the stored value.
/// Conflict keys: `(user, step_id)`, `(user, plan_id)`, `(user, goal_id)`
/// and `user` for the flow position.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_entries(&self, user: &UserId) -> Result<Entries, RemoteError>;

    async fn upsert_entry(
        &self,
        user: &UserId,
        step_id: &str,
        data: &PlannerEntry,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RemoteError>;

    async fn fetch_weekly_plans(&self, user: &UserId) -> Result<WeeklyPlans, RemoteError>;

    async fn upsert_weekly_plan(&self, user: &UserId, plan: &WeeklyPlan) -> Result<(), RemoteError>;

    async fn delete_weekly_plan(&self, user: &UserId, plan_id: &str) -> Result<(), RemoteError>;

    async fn fetch_goal_scores(&self, user: &UserId) -> Result<GoalScores, RemoteError>;

    async fn upsert_goal_score(&self, user: &UserId, goal_id: &str, score: u8) -> Result<(), RemoteError>;

    async fn fetch_flow_position(&self, user: &UserId) -> Result<Option<usize>, RemoteError>;

    async fn upsert_flow_position(&self, user: &UserId, index: usize) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unavailable() {
        assert!(RemoteError::Unavailable("no client".to_string()).is_unavailable());
        assert!(!RemoteError::Operation("500".to_string()).is_unavailable());
    }
}
