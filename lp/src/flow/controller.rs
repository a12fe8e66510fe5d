//! FlowController - submit / back / navigate against the shared store
//!
//! Every command commits locally first and then enqueues the remote mirror.
//! Advancement never waits on the remote.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use super::sequencer::{FlowProgress, Transition, back_index, transition_after_submit};
use crate::domain::{PlannerEntry, PlannerStep, StepCatalog};
use crate::session::SessionContext;
use crate::state::StateHandle;
use crate::sync::{SyncQueue, SyncTask, SyncTicket};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("Step {index} is locked; furthest reachable step is {max_reachable}")]
    Locked { index: usize, max_reachable: usize },

    #[error("Step index {0} is out of range")]
    OutOfRange(usize),
}

/// Result of submitting the current step
pub struct SubmitOutcome {
    pub step_id: String,
    pub transition: Transition,
    /// Remote mirror of the saved entry
    pub ticket: SyncTicket,
}

impl SubmitOutcome {
    pub fn is_complete(&self) -> bool {
        self.transition == Transition::Complete
    }
}

#[derive(Clone)]
pub struct FlowController {
    catalog: Arc<StepCatalog>,
    state: StateHandle,
    session: SessionContext,
    sync: SyncQueue,
    resume_position: bool,
}

impl FlowController {
    pub fn new(
        catalog: Arc<StepCatalog>,
        state: StateHandle,
        session: SessionContext,
        sync: SyncQueue,
        resume_position: bool,
    ) -> Self {
        Self {
            catalog,
            state,
            session,
            sync,
            resume_position,
        }
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    /// Derived gating values, recomputed from the current state
    pub fn progress(&self) -> FlowProgress {
        self.state
            .read(|s| FlowProgress::compute(&self.catalog, &s.entries, s.current_step_index))
    }

    pub fn current_step(&self) -> &PlannerStep {
        let index = self.catalog.clamp_index(self.state.current_step_index());
        &self.catalog.steps()[index]
    }

    /// Stored values for a step, falling back to field defaults
    pub fn form_values(&self, step: &PlannerStep) -> PlannerEntry {
        self.state.read(|s| self.catalog.form_values(step, &s.entries))
    }

    /// Save the current step's values and move on
    ///
    /// The index advances as soon as the local save returns; the remote
    /// upsert settles on the returned ticket.
    pub fn submit(&self, values: PlannerEntry) -> SubmitOutcome {
        let index = self.catalog.clamp_index(self.state.current_step_index());
        let step_id = self.catalog.steps()[index].id.clone();
        debug!(index, %step_id, fields = values.len(), "submit: called");

        self.state.save_step_data(&step_id, values.clone());
        // The remote replaces the whole entry, so mirror the merged result
        let data = self
            .state
            .read(|s| s.entries.get(&step_id).cloned())
            .unwrap_or(values);
        let ticket = self.sync.enqueue(SyncTask::UpsertEntry {
            user: self.session.current_user(),
            step_id: step_id.clone(),
            data,
            completed_at: Utc::now(),
        });

        let transition = transition_after_submit(&self.catalog, index);
        match transition {
            Transition::Advance(next) => self.move_to(next),
            Transition::Complete => info!("Planner flow complete"),
        }

        SubmitOutcome {
            step_id,
            transition,
            ticket,
        }
    }

    /// Step back one; a no-op at the first step
    pub fn back(&self) -> usize {
        let current = self.state.current_step_index();
        let target = back_index(current);
        debug!(current, target, "back: called");
        if target != current {
            self.move_to(target);
        }
        target
    }

    /// Jump to `index` if the gating rules allow it
    pub fn navigate(&self, index: usize) -> Result<(), FlowError> {
        debug!(index, "navigate: called");
        if index >= self.catalog.len() {
            return Err(FlowError::OutOfRange(index));
        }
        let progress = self.progress();
        if !progress.can_navigate_to(index) {
            return Err(FlowError::Locked {
                index,
                max_reachable: progress.max_reachable_index,
            });
        }
        if index != progress.current_index {
            self.move_to(index);
        }
        Ok(())
    }

    fn move_to(&self, index: usize) {
        self.state.set_step_index(index);
        if self.resume_position {
            // Position updates are silent; the ticket is not needed
            drop(self.sync.enqueue(SyncTask::UpsertFlowPosition {
                user: self.session.current_user(),
                index,
            }));
        }
    }
}
