//! Planner state
//!
//! [`PlannerStore`] is the single in-memory source of truth: current step
//! pointer, captured entries and weekly plans. [`StateHandle`] shares one
//! store between the flow, the weekly log and hydration, and broadcasts a
//! [`StateEvent`] after every mutation.

mod handle;
mod store;

pub use handle::{StateEvent, StateHandle};
pub use store::{PlannerState, PlannerStore};
