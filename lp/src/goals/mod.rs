//! Goal score book
//!
//! 1-10 ratings for the goal-setting step's goals. Scores are cached in a
//! local JSON file (one map per user scope, `local` when signed out) that is
//! rewritten on every change, and mirrored to the remote store when a user is
//! signed in. Flow resets leave them alone.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use eyre::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    DEFAULT_SCORE, GOAL_STEP_ID, GoalScore, GoalScores, StepCatalog, UserId, is_valid_score,
};
use crate::remote::{Gateway, RemoteError};
use crate::session::SessionContext;
use crate::sync::{SyncQueue, SyncTask, SyncTicket};

/// Cache scope used while no user is signed in
const LOCAL_SCOPE: &str = "local";

#[derive(Debug, Error)]
pub enum GoalError {
    #[error("Score must be between 1 and 10, got {0}")]
    ScoreOutOfRange(u8),

    #[error("Unknown goal: {0}")]
    UnknownGoal(String),
}

type Cache = BTreeMap<String, GoalScores>;

pub struct GoalScoreBook {
    path: Option<PathBuf>,
    catalog: Arc<StepCatalog>,
    session: SessionContext,
    sync: SyncQueue,
    cache: Mutex<Cache>,
}

impl GoalScoreBook {
    /// Open the book backed by `path`
    ///
    /// A missing or unreadable cache starts empty.
    pub fn load(path: impl Into<PathBuf>, catalog: Arc<StepCatalog>, session: SessionContext, sync: SyncQueue) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "GoalScoreBook::load: called");
        let cache = match read_cache(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read goal scores; starting empty");
                Cache::new()
            }
        };
        Self {
            path: Some(path),
            catalog,
            session,
            sync,
            cache: Mutex::new(cache),
        }
    }

    /// A book with no cache file
    pub fn in_memory(catalog: Arc<StepCatalog>, session: SessionContext, sync: SyncQueue) -> Self {
        Self {
            path: None,
            catalog,
            session,
            sync,
            cache: Mutex::new(Cache::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scope(user: Option<&UserId>) -> String {
        user.map_or_else(|| LOCAL_SCOPE.to_string(), |u| u.as_str().to_string())
    }

    /// Goal ids in catalog order
    pub fn goal_ids(&self) -> Vec<String> {
        self.catalog
            .find(GOAL_STEP_ID)
            .map(|step| step.fields.iter().map(|f| f.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored scores for the current user scope
    pub fn scores(&self) -> GoalScores {
        let scope = Self::scope(self.session.current_user().as_ref());
        self.cache().get(&scope).cloned().unwrap_or_default()
    }

    /// Score for one goal, defaulting when unrated
    pub fn get(&self, goal_id: &str) -> u8 {
        self.scores().get(goal_id).copied().unwrap_or(DEFAULT_SCORE)
    }

    /// Every goal with its displayed score
    pub fn ratings(&self) -> Vec<GoalScore> {
        let scores = self.scores();
        self.goal_ids()
            .into_iter()
            .map(|goal_id| {
                let score = scores.get(&goal_id).copied().unwrap_or(DEFAULT_SCORE);
                GoalScore { goal_id, score }
            })
            .collect()
    }

    /// Rate a goal, write the cache and enqueue the remote mirror
    pub fn set(&self, goal_id: &str, score: u8) -> Result<SyncTicket, GoalError> {
        debug!(%goal_id, score, "set: called");
        if !is_valid_score(score) {
            return Err(GoalError::ScoreOutOfRange(score));
        }
        if !self.goal_ids().iter().any(|id| id == goal_id) {
            return Err(GoalError::UnknownGoal(goal_id.to_string()));
        }

        let user = self.session.current_user();
        {
            let mut cache = self.cache();
            cache
                .entry(Self::scope(user.as_ref()))
                .or_default()
                .insert(goal_id.to_string(), score);
            self.persist(&cache);
        }

        Ok(self.sync.enqueue(SyncTask::UpsertGoalScore {
            user,
            goal_id: goal_id.to_string(),
            score,
        }))
    }

    /// Merge the signed-in user's remote scores over the cached ones
    ///
    /// Returns how many scores came from the remote.
    pub async fn hydrate(&self, gateway: &Gateway) -> Result<usize, RemoteError> {
        let Some(user) = self.session.current_user() else {
            return Ok(0);
        };
        debug!(%user, "hydrate: called");
        let remote = gateway.fetch_goal_scores(Some(&user)).await?;
        let count = remote.len();

        let mut cache = self.cache();
        cache
            .entry(Self::scope(Some(&user)))
            .or_default()
            .extend(remote.into_iter().filter(|(_, score)| is_valid_score(*score)));
        self.persist(&cache);
        info!(%user, count, "Hydrated goal scores");
        Ok(count)
    }

    fn persist(&self, cache: &Cache) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_cache(path, cache) {
            warn!(path = %path.display(), error = %e, "Failed to persist goal scores");
        }
    }
}

fn read_cache(path: &Path) -> Result<Cache> {
    if !path.exists() {
        return Ok(Cache::new());
    }
    let content = fs::read_to_string(path).context("Failed to read goal score cache")?;
    serde_json::from_str(&content).context("Failed to parse goal score cache")
}

fn write_cache(path: &Path, cache: &Cache) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create goal score cache directory")?;
    }
    let content = serde_json::to_string_pretty(cache).context("Failed to serialize goal scores")?;
    fs::write(path, content).context("Failed to write goal score cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteStore};
    use std::time::Duration;
    use tempfile::tempdir;

    fn parts(remote: Arc<MemoryRemote>) -> (Arc<StepCatalog>, SessionContext, SyncQueue) {
        let sync = SyncQueue::spawn(Gateway::new(remote), 16, Duration::from_millis(100));
        (Arc::new(StepCatalog::builtin()), SessionContext::anonymous(), sync)
    }

    #[tokio::test]
    async fn test_defaults_and_validation() {
        let (catalog, session, sync) = parts(Arc::new(MemoryRemote::new()));
        let book = GoalScoreBook::in_memory(catalog, session, sync);

        assert_eq!(book.get("goal_self"), DEFAULT_SCORE);
        assert_eq!(book.ratings().len(), 4);
        assert!(matches!(book.set("goal_self", 0), Err(GoalError::ScoreOutOfRange(0))));
        assert!(matches!(book.set("goal_self", 11), Err(GoalError::ScoreOutOfRange(11))));
        assert!(matches!(book.set("vision_self", 5), Err(GoalError::UnknownGoal(_))));
        assert!(book.scores().is_empty());
    }

    #[tokio::test]
    async fn test_cache_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores").join("goal-scores.json");
        let remote = Arc::new(MemoryRemote::new());

        let (catalog, session, sync) = parts(remote.clone());
        let book = GoalScoreBook::load(&path, catalog, session, sync);
        book.set("goal_body", 9).unwrap().settled().await.unwrap();
        assert!(path.exists());

        let (catalog, session, sync) = parts(remote.clone());
        let reloaded = GoalScoreBook::load(&path, catalog, session, sync);
        assert_eq!(reloaded.get("goal_body"), 9);
        // Signed out, so nothing reached the remote
        assert_eq!(remote.record_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_cache_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("goal-scores.json");
        fs::write(&path, "{not json").unwrap();

        let (catalog, session, sync) = parts(Arc::new(MemoryRemote::new()));
        let book = GoalScoreBook::load(&path, catalog, session, sync);
        assert!(book.scores().is_empty());
    }

    #[tokio::test]
    async fn test_scores_are_scoped_by_user() {
        let remote = Arc::new(MemoryRemote::new());
        let (catalog, session, sync) = parts(remote.clone());
        let book = GoalScoreBook::in_memory(catalog, session.clone(), sync);

        book.set("goal_self", 3).unwrap();
        session.set_user(Some(UserId::new("u1")));
        assert_eq!(book.get("goal_self"), DEFAULT_SCORE);

        book.set("goal_self", 8).unwrap().settled().await.unwrap();
        let stored = remote.fetch_goal_scores(&UserId::new("u1")).await.unwrap();
        assert_eq!(stored["goal_self"], 8);
    }

    #[tokio::test]
    async fn test_hydrate_prefers_remote() {
        let remote = Arc::new(MemoryRemote::new());
        let user = UserId::new("u1");

        let (catalog, session, sync) = parts(remote.clone());
        let book = GoalScoreBook::in_memory(catalog, session.clone(), sync.clone());
        session.set_user(Some(user.clone()));
        book.set("goal_family", 2).unwrap();
        book.set("goal_body", 4).unwrap();
        sync.flush().await;

        // Another device rated the family goal since
        remote.upsert_goal_score(&user, "goal_family", 10).await.unwrap();

        let count = book.hydrate(&Gateway::new(remote)).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(book.get("goal_family"), 10);
        assert_eq!(book.get("goal_body"), 4);
    }
}
