//! Weekly plan log
//!
//! Save, edit and delete weekly plans. Saving commits to the store and
//! enqueues the remote upsert; deleting is two-phase (request, then confirm)
//! and goes to the remote first, removing the local copy only on success.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{WeeklyPlan, newest_first, parse_wins};
use crate::remote::RemoteError;
use crate::session::SessionContext;
use crate::state::StateHandle;
use crate::sync::{SyncQueue, SyncTask, SyncTicket};

pub const MAX_WEEK_OF_MONTH: u32 = 5;

#[derive(Debug, Error)]
pub enum WeeklyError {
    #[error("Month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("Week of month must be between 1 and 5, got {0}")]
    InvalidWeek(u32),

    #[error("Weekly focus is required")]
    FocusRequired,

    #[error("Weekly plan not found: {0}")]
    NotFound(String),

    #[error("Sign in to delete saved plans.")]
    SignInRequired,

    #[error("No delete is pending")]
    NoPendingDelete,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl WeeklyError {
    /// Rejected before any state change or remote call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WeeklyError::InvalidMonth(_) | WeeklyError::InvalidWeek(_) | WeeklyError::FocusRequired
        )
    }
}

/// Raw form input for one week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlanForm {
    pub year: i32,
    pub month: u32,
    pub week_of_month: u32,
    pub focus: String,
    /// Newline-delimited free text
    pub wins: String,
    pub schedule_notes: String,
}

impl WeeklyPlanForm {
    /// Blank form for the first week of `today`'s month
    pub fn for_date(today: NaiveDate) -> Self {
        Self {
            year: today.year(),
            month: today.month(),
            week_of_month: 1,
            focus: String::new(),
            wins: String::new(),
            schedule_notes: String::new(),
        }
    }

    pub fn for_today() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    pub fn validate(&self) -> Result<(), WeeklyError> {
        if !(1..=12).contains(&self.month) {
            return Err(WeeklyError::InvalidMonth(self.month));
        }
        if !(1..=MAX_WEEK_OF_MONTH).contains(&self.week_of_month) {
            return Err(WeeklyError::InvalidWeek(self.week_of_month));
        }
        if self.focus.trim().is_empty() {
            return Err(WeeklyError::FocusRequired);
        }
        Ok(())
    }

    pub fn to_plan(&self, created_at: DateTime<Utc>) -> Result<WeeklyPlan, WeeklyError> {
        self.validate()?;
        Ok(
            WeeklyPlan::new(self.year, self.month, self.week_of_month, self.focus.clone(), created_at)
                .with_wins(parse_wins(&self.wins))
                .with_schedule_notes(self.schedule_notes.clone()),
        )
    }

    pub fn from_plan(plan: &WeeklyPlan) -> Self {
        Self {
            year: plan.year,
            month: plan.month,
            week_of_month: plan.week_of_month,
            focus: plan.focus.clone(),
            wins: plan.wins.join("\n"),
            schedule_notes: plan.schedule_notes.clone().unwrap_or_default(),
        }
    }
}

/// A locally committed plan and its pending remote mirror
pub struct SavedPlan {
    pub plan: WeeklyPlan,
    pub updated: bool,
    pub ticket: SyncTicket,
}

#[derive(Default)]
struct Pending {
    editing: Option<String>,
    delete: Option<String>,
}

#[derive(Clone)]
pub struct WeeklyLog {
    state: StateHandle,
    session: SessionContext,
    sync: SyncQueue,
    pending: Arc<Mutex<Pending>>,
}

impl WeeklyLog {
    pub fn new(state: StateHandle, session: SessionContext, sync: SyncQueue) -> Self {
        Self {
            state,
            session,
            sync,
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All plans, newest first
    pub fn list(&self) -> Vec<WeeklyPlan> {
        self.state
            .read(|s| newest_first(s.weekly_plans.values()).into_iter().cloned().collect())
    }

    pub fn editing(&self) -> Option<String> {
        self.pending().editing.clone()
    }

    pub fn pending_delete(&self) -> Option<String> {
        self.pending().delete.clone()
    }

    /// Commit a plan locally and enqueue its remote upsert
    ///
    /// Any plan already stored under the same week is replaced.
    pub fn save(&self, form: &WeeklyPlanForm) -> Result<SavedPlan, WeeklyError> {
        debug!(year = form.year, month = form.month, week = form.week_of_month, "save: called");
        let plan = form.to_plan(Utc::now())?;
        let updated = self.pending().editing.take().is_some();

        self.state.save_weekly_plan(plan.clone());
        let ticket = self.sync.enqueue(SyncTask::UpsertWeeklyPlan {
            user: self.session.current_user(),
            plan: plan.clone(),
            editing: updated,
        });
        info!(plan_id = %plan.id, updated, "Weekly plan saved");

        Ok(SavedPlan { plan, updated, ticket })
    }

    /// Load a stored plan into a form and mark it as being edited
    pub fn edit(&self, plan_id: &str) -> Result<WeeklyPlanForm, WeeklyError> {
        debug!(%plan_id, "edit: called");
        let plan = self
            .state
            .weekly_plan(plan_id)
            .ok_or_else(|| WeeklyError::NotFound(plan_id.to_string()))?;
        self.pending().editing = Some(plan_id.to_string());
        Ok(WeeklyPlanForm::from_plan(&plan))
    }

    pub fn cancel_edit(&self) {
        self.pending().editing = None;
    }

    /// First phase of delete; requires a signed-in user
    pub fn request_delete(&self, plan_id: &str) -> Result<(), WeeklyError> {
        debug!(%plan_id, "request_delete: called");
        if self.session.current_user().is_none() {
            return Err(WeeklyError::SignInRequired);
        }
        if self.state.weekly_plan(plan_id).is_none() {
            return Err(WeeklyError::NotFound(plan_id.to_string()));
        }
        self.pending().delete = Some(plan_id.to_string());
        Ok(())
    }

    pub fn cancel_delete(&self) {
        self.pending().delete = None;
    }

    /// Second phase of delete
    ///
    /// The pending request is consumed whatever the outcome. On remote
    /// failure the local plan is kept.
    pub async fn confirm_delete(&self) -> Result<WeeklyPlan, WeeklyError> {
        let plan_id = self.pending().delete.take().ok_or(WeeklyError::NoPendingDelete)?;
        debug!(%plan_id, "confirm_delete: called");
        let user = self.session.current_user().ok_or(WeeklyError::SignInRequired)?;

        let ticket = self.sync.enqueue(SyncTask::DeleteWeeklyPlan {
            user: Some(user),
            plan_id: plan_id.clone(),
        });
        if let Err(e) = ticket.settled().await {
            warn!(%plan_id, error = %e, "Weekly plan kept after failed delete");
            return Err(e.into());
        }

        let removed = self
            .state
            .remove_weekly_plan(&plan_id)
            .ok_or_else(|| WeeklyError::NotFound(plan_id.clone()))?;
        {
            let mut pending = self.pending();
            if pending.editing.as_deref() == Some(plan_id.as_str()) {
                pending.editing = None;
            }
        }
        info!(%plan_id, "Weekly plan deleted");
        Ok(removed)
    }
}
