//! SyncQueue - actor that mirrors local commits to the remote store
//!
//! Callers commit to the [`StateHandle`](crate::state::StateHandle) first,
//! then enqueue the matching [`SyncTask`]. Tasks run in arrival order; each
//! yields a [`SyncTicket`] that may be awaited or dropped. Outcomes are
//! broadcast as [`Notice`]s. Nothing is retried automatically.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::notice::Notice;
use crate::domain::{PlannerEntry, UserId, WeeklyPlan};
use crate::remote::{Gateway, RemoteError, WriteOutcome};

const NOTICE_CHANNEL_CAPACITY: usize = 32;

/// Result delivered to a ticket
pub type SyncResult = Result<WriteOutcome, RemoteError>;

/// One remote mirror operation
#[derive(Debug, Clone)]
pub enum SyncTask {
    UpsertEntry {
        user: Option<UserId>,
        step_id: String,
        data: PlannerEntry,
        completed_at: DateTime<Utc>,
    },
    UpsertWeeklyPlan {
        user: Option<UserId>,
        plan: WeeklyPlan,
        /// Editing an existing plan rather than logging a new one
        editing: bool,
    },
    DeleteWeeklyPlan {
        user: Option<UserId>,
        plan_id: String,
    },
    UpsertGoalScore {
        user: Option<UserId>,
        goal_id: String,
        score: u8,
    },
    UpsertFlowPosition {
        user: Option<UserId>,
        index: usize,
    },
}

impl SyncTask {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpsertEntry { .. } => "upsert_entry",
            Self::UpsertWeeklyPlan { .. } => "upsert_weekly_plan",
            Self::DeleteWeeklyPlan { .. } => "delete_weekly_plan",
            Self::UpsertGoalScore { .. } => "upsert_goal_score",
            Self::UpsertFlowPosition { .. } => "upsert_flow_position",
        }
    }

    async fn run(&self, gateway: &Gateway) -> SyncResult {
        match self {
            Self::UpsertEntry {
                user,
                step_id,
                data,
                completed_at,
            } => gateway.upsert_entry(user.as_ref(), step_id, data, *completed_at).await,
            Self::UpsertWeeklyPlan { user, plan, .. } => gateway.upsert_weekly_plan(user.as_ref(), plan).await,
            Self::DeleteWeeklyPlan { user, plan_id } => gateway.delete_weekly_plan(user.as_ref(), plan_id).await,
            Self::UpsertGoalScore { user, goal_id, score } => {
                gateway.upsert_goal_score(user.as_ref(), goal_id, *score).await
            }
            Self::UpsertFlowPosition { user, index } => gateway.upsert_flow_position(user.as_ref(), *index).await,
        }
    }

    /// User-facing message for an outcome; position updates stay silent
    fn notice(&self, result: &SyncResult, ttl: Duration) -> Option<Notice> {
        let ok = result.is_ok();
        match self {
            Self::UpsertEntry { .. } if ok => Some(Notice::success("Saved successfully.", ttl)),
            Self::UpsertEntry { .. } => Some(Notice::error(
                "Something went wrong while saving. Please try again.",
                ttl,
            )),
            Self::UpsertWeeklyPlan { editing: true, .. } if ok => Some(Notice::success("Weekly plan updated.", ttl)),
            Self::UpsertWeeklyPlan { .. } if ok => Some(Notice::success("Saved successfully.", ttl)),
            Self::UpsertWeeklyPlan { .. } => Some(Notice::error("Could not save weekly plan. Please try again.", ttl)),
            Self::DeleteWeeklyPlan { .. } if ok => Some(Notice::success("Weekly plan deleted.", ttl)),
            Self::DeleteWeeklyPlan { .. } => {
                Some(Notice::error("Could not delete weekly plan. Please try again.", ttl))
            }
            Self::UpsertGoalScore { .. } if ok => None,
            Self::UpsertGoalScore { .. } => Some(Notice::error("Could not save goal score. Please try again.", ttl)),
            Self::UpsertFlowPosition { .. } => None,
        }
    }
}

/// Handle to one enqueued task's outcome
///
/// Dropping the ticket does not cancel the task.
pub struct SyncTicket {
    rx: oneshot::Receiver<SyncResult>,
}

impl SyncTicket {
    fn resolved(result: SyncResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }

    /// Wait for the remote operation to finish
    pub async fn settled(self) -> SyncResult {
        self.rx
            .await
            .unwrap_or_else(|_| Err(RemoteError::Operation("sync queue stopped".to_string())))
    }
}

enum SyncCommand {
    Run {
        task: SyncTask,
        reply: oneshot::Sender<SyncResult>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to send tasks to the sync actor
#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::Sender<SyncCommand>,
    notice_tx: broadcast::Sender<Notice>,
    notice_ttl: Duration,
}

impl SyncQueue {
    /// Spawn the actor on the current runtime
    pub fn spawn(gateway: Gateway, capacity: usize, notice_ttl: Duration) -> Self {
        debug!(capacity, ?notice_ttl, "SyncQueue::spawn: called");
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);

        tokio::spawn(actor_loop(gateway, rx, notice_tx.clone(), notice_ttl));

        info!("SyncQueue spawned");
        Self {
            tx,
            notice_tx,
            notice_ttl,
        }
    }

    /// Subscribe to outcome notices
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Enqueue a task without waiting for it
    pub fn enqueue(&self, task: SyncTask) -> SyncTicket {
        debug!(kind = task.kind(), "enqueue: called");
        let (reply, rx) = oneshot::channel();
        match self.tx.try_send(SyncCommand::Run { task, reply }) {
            Ok(()) => SyncTicket { rx },
            Err(e) => {
                let err = RemoteError::Operation(format!("sync queue rejected task: {}", e));
                warn!(error = %err, "enqueue: task not queued");
                if let SyncCommand::Run { task, .. } = e.into_inner() {
                    let result = Err(err);
                    if let Some(notice) = task.notice(&result, self.notice_ttl) {
                        let _ = self.notice_tx.send(notice);
                    }
                    return SyncTicket::resolved(result);
                }
                SyncTicket::resolved(Err(RemoteError::Operation("sync queue rejected task".to_string())))
            }
        }
    }

    /// Wait until every task enqueued so far has settled
    pub async fn flush(&self) {
        debug!("flush: called");
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SyncCommand::Flush { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Drain queued tasks, then stop the actor
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SyncCommand::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn actor_loop(
    gateway: Gateway,
    mut rx: mpsc::Receiver<SyncCommand>,
    notice_tx: broadcast::Sender<Notice>,
    notice_ttl: Duration,
) {
    debug!("SyncQueue actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SyncCommand::Run { task, reply } => {
                debug!(kind = task.kind(), "actor_loop: Run command");
                let result = task.run(&gateway).await;
                match &result {
                    Ok(outcome) => debug!(kind = task.kind(), ?outcome, "actor_loop: task settled"),
                    Err(e) if e.is_unavailable() => warn!(kind = task.kind(), error = %e, "Remote unavailable"),
                    Err(e) => error!(kind = task.kind(), error = %e, "Remote operation failed"),
                }
                if let Some(notice) = task.notice(&result, notice_ttl) {
                    let _ = notice_tx.send(notice);
                }
                // Caller may have dropped the ticket
                let _ = reply.send(result);
            }
            SyncCommand::Flush { reply } => {
                debug!("actor_loop: Flush command");
                let _ = reply.send(());
            }
            SyncCommand::Shutdown { reply } => {
                info!("SyncQueue shutting down");
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("SyncQueue actor stopped");
}
