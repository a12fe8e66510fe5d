//! Flow sequencer - pure gating derivations
//!
//! Everything here is recomputed from `entries`, the current index and the
//! catalog on every read. Nothing is cached.

use crate::domain::{Entries, StepCatalog};

/// Catalog indices whose step id has a captured entry, ascending
pub fn completed_indices(catalog: &StepCatalog, entries: &Entries) -> Vec<usize> {
    catalog
        .steps()
        .iter()
        .enumerate()
        .filter(|(_, step)| entries.contains_key(&step.id))
        .map(|(index, _)| index)
        .collect()
}

/// Highest completed index, `None` when nothing is captured
pub fn highest_completed(catalog: &StepCatalog, entries: &Entries) -> Option<usize> {
    completed_indices(catalog, entries).into_iter().max()
}

/// Furthest step earned by completion: one past the highest completed, capped at the last step
pub fn unlocked_index(catalog: &StepCatalog, entries: &Entries) -> usize {
    match highest_completed(catalog, entries) {
        Some(highest) => (highest + 1).min(catalog.last_index()),
        None => 0,
    }
}

/// Furthest step the user may jump to directly
///
/// Never below the current index, so backing up and coming forward again
/// does not require resubmitting.
pub fn max_reachable_index(catalog: &StepCatalog, entries: &Entries, current: usize) -> usize {
    unlocked_index(catalog, entries).max(current)
}

pub fn can_navigate_to(catalog: &StepCatalog, entries: &Entries, current: usize, index: usize) -> bool {
    index <= max_reachable_index(catalog, entries, current)
}

/// Index after pressing back (floor 0)
pub fn back_index(current: usize) -> usize {
    current.saturating_sub(1)
}

/// What submitting the step at `index` leads to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given step
    Advance(usize),
    /// The last step was submitted; the flow is finished
    Complete,
}

pub fn transition_after_submit(catalog: &StepCatalog, index: usize) -> Transition {
    if index >= catalog.last_index() {
        Transition::Complete
    } else {
        Transition::Advance(index + 1)
    }
}

/// All derived flow values for one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowProgress {
    pub current_index: usize,
    pub step_count: usize,
    pub completed: Vec<usize>,
    pub highest_completed: Option<usize>,
    pub unlocked_index: usize,
    pub max_reachable_index: usize,
}

impl FlowProgress {
    pub fn compute(catalog: &StepCatalog, entries: &Entries, current: usize) -> Self {
        let completed = completed_indices(catalog, entries);
        let highest_completed = completed.iter().copied().max();
        let unlocked_index = match highest_completed {
            Some(highest) => (highest + 1).min(catalog.last_index()),
            None => 0,
        };
        Self {
            current_index: current,
            step_count: catalog.len(),
            completed,
            highest_completed,
            unlocked_index,
            max_reachable_index: unlocked_index.max(current),
        }
    }

    pub fn can_navigate_to(&self, index: usize) -> bool {
        index <= self.max_reachable_index
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    pub fn is_last_step(&self) -> bool {
        self.current_index + 1 >= self.step_count
    }
}
