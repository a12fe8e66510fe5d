//! Planner flow
//!
//! - [`sequencer`] - pure gating rules over entries and the current index
//! - [`controller`] - submit / back / navigate against the shared store

pub mod controller;
pub mod sequencer;

pub use controller::{FlowController, FlowError, SubmitOutcome};
pub use sequencer::{
    FlowProgress, Transition, back_index, can_navigate_to, completed_indices, highest_completed, max_reachable_index,
    transition_after_submit, unlocked_index,
};
