//! Hydration coordinator
//!
//! Pulls a user's remote records into the store whenever the session identity
//! changes and publishes a readiness flag. Each dispatch takes a token from a
//! monotonically increasing epoch; a fetch whose token is no longer current
//! when it settles is discarded.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{Entries, StepCatalog, UserId, WeeklyPlans};
use crate::remote::Gateway;
use crate::state::StateHandle;

/// Identity the store was last dispatched for, and whether that dispatch settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub user: Option<UserId>,
    pub ready: bool,
}

impl Readiness {
    fn settled(user: Option<UserId>) -> Self {
        Self { user, ready: true }
    }
}

struct Inner {
    epoch: Mutex<u64>,
    ready_tx: watch::Sender<Readiness>,
}

#[derive(Clone)]
pub struct HydrationCoordinator {
    state: StateHandle,
    gateway: Gateway,
    catalog: Arc<StepCatalog>,
    resume_position: bool,
    inner: Arc<Inner>,
}

impl HydrationCoordinator {
    /// `catalog` filters hydrated entries and bounds a restored flow position
    pub fn new(state: StateHandle, gateway: Gateway, catalog: Arc<StepCatalog>, resume_position: bool) -> Self {
        debug!(steps = catalog.len(), resume_position, "HydrationCoordinator::new: called");
        let (ready_tx, _) = watch::channel(Readiness::settled(None));
        Self {
            state,
            gateway,
            catalog,
            resume_position,
            inner: Arc::new(Inner {
                epoch: Mutex::new(0),
                ready_tx,
            }),
        }
    }

    /// Ready when no user is present or the latest fetch has settled
    pub fn is_ready(&self) -> bool {
        self.inner.ready_tx.borrow().ready
    }

    pub fn readiness(&self) -> Readiness {
        self.inner.ready_tx.borrow().clone()
    }

    pub fn subscribe_ready(&self) -> watch::Receiver<Readiness> {
        self.inner.ready_tx.subscribe()
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.subscribe_ready();
        // Sender lives in self, so this cannot close while we wait
        let _ = rx.wait_for(|r| r.ready).await;
    }

    /// Wait until the store has settled for exactly this identity
    pub async fn wait_ready_for(&self, user: Option<&UserId>) {
        let mut rx = self.subscribe_ready();
        let _ = rx.wait_for(|r| r.ready && r.user.as_ref() == user).await;
    }

    /// Invalidate any in-flight fetch without dispatching a new one
    pub fn teardown(&self) {
        let mut epoch = self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        debug!(epoch = *epoch, "teardown: pending hydration invalidated");
    }

    /// React to a new identity
    ///
    /// Returns the spawned fetch task when a user is present.
    pub fn identity_changed(&self, user: Option<UserId>) -> Option<JoinHandle<()>> {
        debug!(?user, "identity_changed: called");
        let mut epoch = self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        let token = *epoch;

        let Some(user) = user else {
            self.state.replace_all(Entries::new(), WeeklyPlans::new());
            self.state.set_step_index(0);
            self.inner.ready_tx.send_replace(Readiness::settled(None));
            info!("No user; planner state cleared");
            return None;
        };

        self.inner.ready_tx.send_replace(Readiness {
            user: Some(user.clone()),
            ready: false,
        });
        drop(epoch);

        let this = self.clone();
        Some(tokio::spawn(async move { this.hydrate(user, token).await }))
    }

    async fn hydrate(&self, user: UserId, token: u64) {
        debug!(%user, token, "hydrate: called");
        let position = async {
            if self.resume_position {
                self.gateway.fetch_flow_position(Some(&user)).await
            } else {
                Ok(None)
            }
        };
        let (entries, plans, position) = tokio::join!(
            self.gateway.fetch_entries(Some(&user)),
            self.gateway.fetch_weekly_plans(Some(&user)),
            position,
        );

        let epoch = self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *epoch != token {
            debug!(%user, token, current = *epoch, "hydrate: superseded, discarding result");
            return;
        }

        match (entries, plans) {
            (Ok(mut entries), Ok(plans)) => {
                entries.retain(|step_id, _| {
                    let known = self.catalog.contains(step_id);
                    if !known {
                        debug!(%user, %step_id, "hydrate: dropping entry for unknown step");
                    }
                    known
                });
                info!(%user, entries = entries.len(), plans = plans.len(), "Hydrated planner state");
                self.state.replace_all(entries, plans);
                let index = match position {
                    Ok(Some(index)) => self.catalog.clamp_index(index),
                    Ok(None) => 0,
                    Err(e) => {
                        error!(%user, error = %e, "Failed to fetch flow position");
                        0
                    }
                };
                self.state.set_step_index(index);
            }
            (entries, plans) => {
                if let Err(e) = entries {
                    error!(%user, error = %e, "Failed to fetch planner entries");
                }
                if let Err(e) = plans {
                    error!(%user, error = %e, "Failed to fetch weekly plans");
                }
                // Fail open with empty state rather than another identity's data
                self.state.replace_all(Entries::new(), WeeklyPlans::new());
                self.state.set_step_index(0);
            }
        }
        self.inner.ready_tx.send_replace(Readiness::settled(Some(user)));
    }

    /// Hydrate for the watcher's current value, then follow its changes
    pub fn follow(&self, mut rx: watch::Receiver<Option<UserId>>) -> JoinHandle<()> {
        let initial = rx.borrow_and_update().clone();
        self.identity_changed(initial);

        let this = self.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let user = rx.borrow_and_update().clone();
                this.identity_changed(user);
            }
            debug!("follow: session closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GoalScores, PlannerEntry, WeeklyPlan};
    use crate::flow::can_navigate_to;
    use crate::remote::{MemoryRemote, RemoteError, RemoteStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use tokio::sync::Notify;

    /// Holds entry fetches for gated users until released
    struct GatedRemote {
        inner: MemoryRemote,
        gates: HashMap<UserId, Arc<Notify>>,
    }

    #[async_trait]
    impl RemoteStore for GatedRemote {
        async fn fetch_entries(&self, user: &UserId) -> Result<Entries, RemoteError> {
            if let Some(gate) = self.gates.get(user) {
                gate.notified().await;
            }
            self.inner.fetch_entries(user).await
        }

        async fn upsert_entry(
            &self,
            user: &UserId,
            step_id: &str,
            data: &PlannerEntry,
            completed_at: DateTime<Utc>,
        ) -> Result<(), RemoteError> {
            self.inner.upsert_entry(user, step_id, data, completed_at).await
        }

        async fn fetch_weekly_plans(&self, user: &UserId) -> Result<WeeklyPlans, RemoteError> {
            self.inner.fetch_weekly_plans(user).await
        }

        async fn upsert_weekly_plan(&self, user: &UserId, plan: &WeeklyPlan) -> Result<(), RemoteError> {
            self.inner.upsert_weekly_plan(user, plan).await
        }

        async fn delete_weekly_plan(&self, user: &UserId, plan_id: &str) -> Result<(), RemoteError> {
            self.inner.delete_weekly_plan(user, plan_id).await
        }

        async fn fetch_goal_scores(&self, user: &UserId) -> Result<GoalScores, RemoteError> {
            self.inner.fetch_goal_scores(user).await
        }

        async fn upsert_goal_score(&self, user: &UserId, goal_id: &str, score: u8) -> Result<(), RemoteError> {
            self.inner.upsert_goal_score(user, goal_id, score).await
        }

        async fn fetch_flow_position(&self, user: &UserId) -> Result<Option<usize>, RemoteError> {
            self.inner.fetch_flow_position(user).await
        }

        async fn upsert_flow_position(&self, user: &UserId, index: usize) -> Result<(), RemoteError> {
            self.inner.upsert_flow_position(user, index).await
        }
    }

    fn catalog() -> Arc<StepCatalog> {
        Arc::new(StepCatalog::builtin())
    }

    fn entry(field: &str, value: &str) -> PlannerEntry {
        [(field.to_string(), value.to_string())].into()
    }

    async fn seed(remote: &MemoryRemote, user: &UserId, step_id: &str) {
        remote
            .upsert_entry(user, step_id, &entry("x", user.as_str()), Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hydrates_full_replace() {
        let remote = Arc::new(MemoryRemote::new());
        let user = UserId::new("u1");
        seed(&remote, &user, "vision").await;

        let state = StateHandle::new();
        state.save_step_data("commitment", entry("stale", "1"));
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), catalog(), false);

        coordinator.identity_changed(Some(user)).unwrap().await.unwrap();
        assert!(coordinator.is_ready());
        let entries = state.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("vision"));
    }

    #[tokio::test]
    async fn test_hydration_drops_entries_for_unknown_steps() {
        let remote = Arc::new(MemoryRemote::new());
        let user = UserId::new("u1");
        seed(&remote, &user, "vision").await;
        seed(&remote, &user, "retired-step").await;

        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), catalog(), false);

        coordinator.identity_changed(Some(user)).unwrap().await.unwrap();
        let entries = state.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("vision"));
        assert!(!entries.contains_key("retired-step"));
    }

    #[tokio::test]
    async fn test_switch_to_user_without_position_starts_at_first_step() {
        let remote = Arc::new(MemoryRemote::new());
        let (u1, u2) = (UserId::new("u1"), UserId::new("u2"));
        let steps = catalog();
        for step in &steps.steps()[..5] {
            seed(&remote, &u1, &step.id).await;
        }
        remote.upsert_flow_position(&u1, 5).await.unwrap();

        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), steps.clone(), true);

        coordinator.identity_changed(Some(u1)).unwrap().await.unwrap();
        assert_eq!(state.current_step_index(), 5);

        coordinator.identity_changed(Some(u2)).unwrap().await.unwrap();
        assert!(state.entries().is_empty());
        assert_eq!(state.current_step_index(), 0);
        assert!(!can_navigate_to(&steps, &state.entries(), state.current_step_index(), 5));
    }

    #[tokio::test]
    async fn test_fail_open_resets_step_index() {
        let remote = Arc::new(MemoryRemote::new());
        let state = StateHandle::new();
        state.set_step_index(4);
        remote.set_offline(true);
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), catalog(), true);

        coordinator.identity_changed(Some(UserId::new("u1"))).unwrap().await.unwrap();
        assert!(state.entries().is_empty());
        assert_eq!(state.current_step_index(), 0);
    }

    #[tokio::test]
    async fn test_no_user_clears_and_is_ready() {
        let state = StateHandle::new();
        state.save_step_data("commitment", entry("a", "1"));
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::local_only(), catalog(), false);

        assert!(coordinator.identity_changed(None).is_none());
        assert!(coordinator.is_ready());
        assert!(state.entries().is_empty());
    }

    #[tokio::test]
    async fn test_fail_open_when_remote_fails() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_offline(true);
        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), catalog(), false);

        coordinator.identity_changed(Some(UserId::new("u1"))).unwrap().await.unwrap();
        assert!(coordinator.is_ready());
        assert!(state.entries().is_empty());
    }

    #[tokio::test]
    async fn test_stale_fetch_is_discarded() {
        let memory = MemoryRemote::new();
        let (u1, u2) = (UserId::new("u1"), UserId::new("u2"));
        seed(&memory, &u1, "commitment").await;
        seed(&memory, &u2, "vision").await;

        let gate = Arc::new(Notify::new());
        let remote = GatedRemote {
            inner: memory,
            gates: [(u1.clone(), gate.clone())].into(),
        };
        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(Arc::new(remote)), catalog(), false);

        let first = coordinator.identity_changed(Some(u1)).unwrap();
        assert!(!coordinator.is_ready());
        let second = coordinator.identity_changed(Some(u2)).unwrap();
        second.await.unwrap();
        assert!(coordinator.is_ready());

        gate.notify_one();
        first.await.unwrap();

        let entries = state.entries();
        assert!(entries.contains_key("vision"));
        assert!(!entries.contains_key("commitment"));
    }

    #[tokio::test]
    async fn test_teardown_discards_pending_fetch() {
        let memory = MemoryRemote::new();
        let user = UserId::new("u1");
        seed(&memory, &user, "commitment").await;
        let gate = Arc::new(Notify::new());
        let remote = GatedRemote {
            inner: memory,
            gates: [(user.clone(), gate.clone())].into(),
        };
        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(Arc::new(remote)), catalog(), false);

        let pending = coordinator.identity_changed(Some(user)).unwrap();
        coordinator.teardown();
        gate.notify_one();
        pending.await.unwrap();

        assert!(state.entries().is_empty());
    }

    #[tokio::test]
    async fn test_restores_clamped_position() {
        let remote = Arc::new(MemoryRemote::new());
        let user = UserId::new("u1");
        remote.upsert_flow_position(&user, 42).await.unwrap();
        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), catalog(), true);

        coordinator.identity_changed(Some(user)).unwrap().await.unwrap();
        assert_eq!(state.current_step_index(), 7);
    }

    #[tokio::test]
    async fn test_follow_tracks_session() {
        let remote = Arc::new(MemoryRemote::new());
        let user = UserId::new("u1");
        seed(&remote, &user, "purpose").await;
        let state = StateHandle::new();
        let coordinator = HydrationCoordinator::new(state.clone(), Gateway::new(remote), catalog(), false);

        let (tx, rx) = watch::channel(None);
        let follower = coordinator.follow(rx);
        tx.send_replace(Some(user.clone()));
        coordinator.wait_ready_for(Some(&user)).await;
        assert!(state.entries().contains_key("purpose"));
        assert_eq!(coordinator.readiness(), Readiness::settled(Some(user)));

        drop(tx);
        follower.await.unwrap();
    }
}
