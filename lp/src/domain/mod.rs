//! Domain types for the life planner
//!
//! Static step catalog, captured step entries, weekly plans and goal scores.
//! Everything here is plain data; mutation lives in [`crate::state`].

mod catalog;
mod entry;
mod goal;
mod step;
mod user;
mod weekly;

pub use catalog::{CatalogError, StepCatalog};
pub use entry::{Entries, PlannerEntry};
pub use goal::{DEFAULT_SCORE, GOAL_STEP_ID, GoalScore, GoalScores, MAX_SCORE, MIN_SCORE, is_valid_score};
pub use step::{CustomLayout, FieldOption, FieldType, PlannerField, PlannerStep};
pub use user::UserId;
pub use weekly::{WeeklyPlan, WeeklyPlans, newest_first, parse_wins, plan_key};
