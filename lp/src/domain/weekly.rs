//! WeeklyPlan domain type
//!
//! One calendar week's focus and notes, keyed by `year-month-weekOfMonth`.
//! Two plans for the same week share a key, so saving the second replaces
//! the first.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Plan id -> plan
pub type WeeklyPlans = BTreeMap<String, WeeklyPlan>;

/// A single weekly log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    /// Composite key: {year}-{month}-{week_of_month}
    pub id: String,
    pub year: i32,
    pub month: u32,
    pub week_of_month: u32,
    pub focus: String,
    /// Ordered wins, one per non-blank line of the raw input
    pub wins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_notes: Option<String>,
    /// Set at save time
    pub created_at: DateTime<Utc>,
}

impl WeeklyPlan {
    pub fn new(year: i32, month: u32, week_of_month: u32, focus: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let id = plan_key(year, month, week_of_month);
        debug!(%id, "WeeklyPlan::new: called");
        Self {
            id,
            year,
            month,
            week_of_month,
            focus: focus.into(),
            wins: Vec::new(),
            schedule_notes: None,
            created_at,
        }
    }

    /// Builder: set wins
    pub fn with_wins(mut self, wins: Vec<String>) -> Self {
        self.wins = wins;
        self
    }

    /// Builder: set schedule notes, treating blank text as absent
    pub fn with_schedule_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.schedule_notes = if notes.trim().is_empty() { None } else { Some(notes) };
        self
    }
}

/// Deterministic plan id for a calendar week
pub fn plan_key(year: i32, month: u32, week_of_month: u32) -> String {
    format!("{}-{}-{}", year, month, week_of_month)
}

/// Split newline-delimited free text into trimmed, non-blank lines
pub fn parse_wins(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Plans ordered by `created_at`, newest first
pub fn newest_first<'a>(plans: impl IntoIterator<Item = &'a WeeklyPlan>) -> Vec<&'a WeeklyPlan> {
    let mut sorted: Vec<&WeeklyPlan> = plans.into_iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
}
