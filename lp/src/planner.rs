//! Planner - wires the store, session, remote mirror and features together
//!
//! One `Planner` per process. Construction spawns the sync actor and the
//! hydration follower, so it must run inside a tokio runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dashboard::DashboardSummary;
use crate::domain::{StepCatalog, UserId};
use crate::flow::FlowController;
use crate::goals::GoalScoreBook;
use crate::remote::{Gateway, RemoteStore};
use crate::session::{Authenticator, Credentials, SessionContext, SessionError, SignUp};
use crate::state::StateHandle;
use crate::sync::{HydrationCoordinator, Notice, SyncQueue};
use crate::weekly::WeeklyLog;

/// Runtime options, usually derived from [`Config`]
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub resume_position: bool,
    pub queue_capacity: usize,
    pub notice_ttl: Duration,
    /// No cache file when absent
    pub goal_cache_path: Option<PathBuf>,
}

impl PlannerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resume_position: config.flow.resume_position,
            queue_capacity: config.sync.queue_capacity,
            notice_ttl: config.sync.notice_ttl(),
            goal_cache_path: Some(PathBuf::from(&config.storage.goal_cache_path)),
        }
    }
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct Planner {
    catalog: Arc<StepCatalog>,
    state: StateHandle,
    session: SessionContext,
    gateway: Gateway,
    sync: SyncQueue,
    hydration: HydrationCoordinator,
    flow: FlowController,
    weekly: WeeklyLog,
    goals: GoalScoreBook,
    follower: JoinHandle<()>,
}

impl Planner {
    pub fn new(
        catalog: StepCatalog,
        remote: Option<Arc<dyn RemoteStore>>,
        auth: Option<Arc<dyn Authenticator>>,
        options: PlannerOptions,
    ) -> Self {
        debug!(steps = catalog.len(), remote = remote.is_some(), ?options, "Planner::new: called");
        let catalog = Arc::new(catalog);
        let state = StateHandle::new();
        let session = SessionContext::new(auth);
        let gateway = remote.map(Gateway::new).unwrap_or_default();
        let sync = SyncQueue::spawn(gateway.clone(), options.queue_capacity, options.notice_ttl);

        let hydration = HydrationCoordinator::new(
            state.clone(),
            gateway.clone(),
            catalog.clone(),
            options.resume_position,
        );
        let follower = hydration.follow(session.subscribe());

        let flow = FlowController::new(
            catalog.clone(),
            state.clone(),
            session.clone(),
            sync.clone(),
            options.resume_position,
        );
        let weekly = WeeklyLog::new(state.clone(), session.clone(), sync.clone());
        let goals = match &options.goal_cache_path {
            Some(path) => GoalScoreBook::load(path, catalog.clone(), session.clone(), sync.clone()),
            None => GoalScoreBook::in_memory(catalog.clone(), session.clone(), sync.clone()),
        };

        info!("Planner initialized");
        Self {
            catalog,
            state,
            session,
            gateway,
            sync,
            hydration,
            flow,
            weekly,
            goals,
            follower,
        }
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn hydration(&self) -> &HydrationCoordinator {
        &self.hydration
    }

    pub fn flow(&self) -> &FlowController {
        &self.flow
    }

    pub fn weekly(&self) -> &WeeklyLog {
        &self.weekly
    }

    pub fn goals(&self) -> &GoalScoreBook {
        &self.goals
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.sync.subscribe_notices()
    }

    /// Wait until the store reflects the current identity, then pull goal scores
    pub async fn ready(&self) {
        let user = self.session.current_user();
        self.hydration.wait_ready_for(user.as_ref()).await;
        if let Err(e) = self.goals.hydrate(&self.gateway).await {
            warn!(error = %e, "Failed to hydrate goal scores");
        }
    }

    /// Resume a previously signed-in identity
    pub async fn restore(&self, user: UserId) {
        debug!(%user, "restore: called");
        self.session.set_user(Some(user));
        self.ready().await;
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<UserId, SessionError> {
        let user = self.session.sign_in(credentials).await?;
        self.ready().await;
        Ok(user)
    }

    pub async fn sign_up(&self, form: &SignUp) -> Result<UserId, SessionError> {
        let user = self.session.sign_up(form).await?;
        self.ready().await;
        Ok(user)
    }

    /// Sign out and reset the flow to an empty first step
    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        self.weekly.cancel_edit();
        self.weekly.cancel_delete();
        self.state.reset_flow();
        self.hydration.wait_ready_for(None).await;
        info!("Signed out; planner state reset");
    }

    pub fn dashboard(&self) -> DashboardSummary {
        let scores = self.goals.scores();
        self.state
            .read(|s| DashboardSummary::compute(&self.catalog, s, &scores))
    }

    /// Let queued remote writes settle, then stop background tasks
    pub async fn shutdown(self) {
        debug!("shutdown: called");
        self.sync.shutdown().await;
        self.hydration.teardown();
        self.follower.abort();
    }
}
