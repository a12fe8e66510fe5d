//! PlannerStore - synchronous, validation-free state container
//!
//! Gating is the flow sequencer's job; the store only applies transitions.
//! No operation performs I/O.

use tracing::debug;

use crate::domain::{Entries, PlannerEntry, WeeklyPlan, WeeklyPlans};

/// Snapshot of everything the planner holds in memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannerState {
    pub current_step_index: usize,
    pub entries: Entries,
    pub weekly_plans: WeeklyPlans,
}

/// In-memory planner state with atomic mutation operations
#[derive(Debug, Default)]
pub struct PlannerStore {
    state: PlannerState,
}

impl PlannerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn current_step_index(&self) -> usize {
        self.state.current_step_index
    }

    pub fn entries(&self) -> &Entries {
        &self.state.entries
    }

    pub fn weekly_plans(&self) -> &WeeklyPlans {
        &self.state.weekly_plans
    }

    /// Set the current step unconditionally
    pub fn set_step_index(&mut self, index: usize) {
        debug!(index, "set_step_index: called");
        self.state.current_step_index = index;
    }

    /// Shallow-merge `data` into the entry for `step_id`, creating it if absent
    ///
    /// New values overwrite old ones with the same field id; fields absent
    /// from `data` are preserved.
    pub fn save_step_data(&mut self, step_id: &str, data: PlannerEntry) {
        debug!(%step_id, field_count = data.len(), "save_step_data: called");
        self.state.entries.entry(step_id.to_string()).or_default().extend(data);
    }

    /// Insert or fully replace a weekly plan by id
    pub fn save_weekly_plan(&mut self, plan: WeeklyPlan) {
        debug!(plan_id = %plan.id, "save_weekly_plan: called");
        self.state.weekly_plans.insert(plan.id.clone(), plan);
    }

    /// Remove a weekly plan; no-op if absent
    pub fn remove_weekly_plan(&mut self, plan_id: &str) -> Option<WeeklyPlan> {
        debug!(%plan_id, "remove_weekly_plan: called");
        self.state.weekly_plans.remove(plan_id)
    }

    /// Replace all entries (hydration only)
    pub fn set_entries(&mut self, entries: Entries) {
        debug!(count = entries.len(), "set_entries: called");
        self.state.entries = entries;
    }

    /// Replace all weekly plans (hydration only)
    pub fn set_weekly_plans(&mut self, plans: WeeklyPlans) {
        debug!(count = plans.len(), "set_weekly_plans: called");
        self.state.weekly_plans = plans;
    }

    /// Back to step 0 with nothing captured
    pub fn reset_flow(&mut self) {
        debug!("reset_flow: called");
        self.state = PlannerState::default();
    }
}
