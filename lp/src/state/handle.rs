//! StateHandle - shared access to one PlannerStore
//!
//! Every mutation runs under the lock and computes its next state from the
//! stored state, never from a caller-held copy. Subscribers are notified
//! after the lock is released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use super::store::{PlannerState, PlannerStore};
use crate::domain::{Entries, PlannerEntry, WeeklyPlan, WeeklyPlans};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast after each store mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    StepIndexChanged { index: usize },
    StepSaved { step_id: String },
    WeeklyPlanSaved { plan_id: String },
    WeeklyPlanRemoved { plan_id: String },
    EntriesReplaced { count: usize },
    WeeklyPlansReplaced { count: usize },
    FlowReset,
}

/// Cloneable handle to the planner store
#[derive(Clone)]
pub struct StateHandle {
    store: Arc<Mutex<PlannerStore>>,
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self::from_store(PlannerStore::new())
    }

    pub fn from_store(store: PlannerStore) -> Self {
        debug!("StateHandle::from_store: called");
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: Arc::new(Mutex::new(store)),
            event_tx,
        }
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    // A panicked writer can only have left a fully applied state behind, since
    // each operation assigns whole values.
    fn lock(&self) -> MutexGuard<'_, PlannerStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Run a read-only closure against the current state
    pub fn read<T>(&self, f: impl FnOnce(&PlannerState) -> T) -> T {
        f(self.lock().state())
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> PlannerState {
        self.read(Clone::clone)
    }

    pub fn current_step_index(&self) -> usize {
        self.read(|s| s.current_step_index)
    }

    pub fn entries(&self) -> Entries {
        self.read(|s| s.entries.clone())
    }

    pub fn weekly_plans(&self) -> WeeklyPlans {
        self.read(|s| s.weekly_plans.clone())
    }

    pub fn weekly_plan(&self, plan_id: &str) -> Option<WeeklyPlan> {
        self.read(|s| s.weekly_plans.get(plan_id).cloned())
    }

    pub fn set_step_index(&self, index: usize) {
        self.lock().set_step_index(index);
        self.notify(StateEvent::StepIndexChanged { index });
    }

    pub fn save_step_data(&self, step_id: &str, data: PlannerEntry) {
        self.lock().save_step_data(step_id, data);
        self.notify(StateEvent::StepSaved {
            step_id: step_id.to_string(),
        });
    }

    pub fn save_weekly_plan(&self, plan: WeeklyPlan) {
        let plan_id = plan.id.clone();
        self.lock().save_weekly_plan(plan);
        self.notify(StateEvent::WeeklyPlanSaved { plan_id });
    }

    pub fn remove_weekly_plan(&self, plan_id: &str) -> Option<WeeklyPlan> {
        let removed = self.lock().remove_weekly_plan(plan_id);
        if removed.is_some() {
            self.notify(StateEvent::WeeklyPlanRemoved {
                plan_id: plan_id.to_string(),
            });
        }
        removed
    }

    pub fn set_entries(&self, entries: Entries) {
        let count = entries.len();
        self.lock().set_entries(entries);
        self.notify(StateEvent::EntriesReplaced { count });
    }

    pub fn set_weekly_plans(&self, plans: WeeklyPlans) {
        let count = plans.len();
        self.lock().set_weekly_plans(plans);
        self.notify(StateEvent::WeeklyPlansReplaced { count });
    }

    /// Replace entries and weekly plans under one lock
    pub fn replace_all(&self, entries: Entries, plans: WeeklyPlans) {
        let (entry_count, plan_count) = (entries.len(), plans.len());
        {
            let mut store = self.lock();
            store.set_entries(entries);
            store.set_weekly_plans(plans);
        }
        self.notify(StateEvent::EntriesReplaced { count: entry_count });
        self.notify(StateEvent::WeeklyPlansReplaced { count: plan_count });
    }

    pub fn reset_flow(&self) {
        self.lock().reset_flow();
        self.notify(StateEvent::FlowReset);
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mutations_broadcast_events() {
        let handle = StateHandle::new();
        let mut events = handle.subscribe();

        handle.set_step_index(2);
        handle.save_step_data("A", PlannerEntry::new());
        handle.remove_weekly_plan("missing");
        handle.reset_flow();

        assert_eq!(events.recv().await.unwrap(), StateEvent::StepIndexChanged { index: 2 });
        assert_eq!(
            events.recv().await.unwrap(),
            StateEvent::StepSaved {
                step_id: "A".to_string()
            }
        );
        // Removing an absent plan is silent
        assert_eq!(events.recv().await.unwrap(), StateEvent::FlowReset);
    }

    #[test]
    fn test_clones_share_one_store() {
        let a = StateHandle::new();
        let b = a.clone();
        let mut data = PlannerEntry::new();
        data.insert("x".to_string(), "1".to_string());
        a.save_step_data("A", data.clone());

        let mut more = PlannerEntry::new();
        more.insert("y".to_string(), "2".to_string());
        b.save_step_data("A", more);

        let entry = a.entries().remove("A").unwrap();
        assert_eq!(entry.len(), 2);
    }

    #[test]
    fn test_replace_all_discards_stale_state() {
        let handle = StateHandle::new();
        handle.save_step_data("stale", PlannerEntry::new());
        handle.replace_all(Entries::new(), WeeklyPlans::new());
        assert_eq!(handle.snapshot().entries, Entries::new());
    }
}
