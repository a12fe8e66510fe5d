//! Captured step data
//!
//! A step is "completed" exactly when its id has a key in [`Entries`];
//! there is no partial-completion state.

use std::collections::BTreeMap;

/// Field id -> captured string value for one step
pub type PlannerEntry = BTreeMap<String, String>;

/// Step id -> captured entry
pub type Entries = BTreeMap<String, PlannerEntry>;
