//! Dashboard aggregation
//!
//! Read-only summary of flow completion, the latest weekly plan and the goal
//! spotlight, recomputed from the current state on every call.

use serde::Serialize;

use crate::domain::{DEFAULT_SCORE, GOAL_STEP_ID, GoalScores, StepCatalog, WeeklyPlan, newest_first};
use crate::state::PlannerState;

const SUMMARY_LIMIT: usize = 180;
const SUMMARY_CUT: usize = 177;

/// Step groups shown as "completed/total"
pub const BUCKETS: &[(&str, &[&str])] = &[
    ("Foundations", &["commitment", "vision", "wheel-of-life", "purpose"]),
    ("Reflection", &["past-year", "year-ahead"]),
    ("Execution", &["goal-setting", "quarterly-planning"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketProgress {
    pub title: String,
    pub completed: usize,
    pub total: usize,
}

impl BucketProgress {
    pub fn status(&self) -> String {
        format!("{}/{}", self.completed, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepStatus {
    Captured,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSummary {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub status: StepStatus,
}

/// One captured goal with its current rating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpotlightGoal {
    pub id: String,
    pub label: String,
    pub summary: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub completed_steps: usize,
    pub total_steps: usize,
    pub progress_percent: u32,
    pub is_complete: bool,
    pub buckets: Vec<BucketProgress>,
    pub latest_weekly_plan: Option<WeeklyPlan>,
    pub spotlight: Vec<SpotlightGoal>,
    pub steps: Vec<StepSummary>,
}

impl DashboardSummary {
    pub fn compute(catalog: &StepCatalog, state: &PlannerState, scores: &GoalScores) -> Self {
        let entries = &state.entries;
        let steps: Vec<StepSummary> = catalog
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| StepSummary {
                index,
                id: step.id.clone(),
                title: step.title.clone(),
                status: if entries.contains_key(&step.id) {
                    StepStatus::Captured
                } else {
                    StepStatus::Pending
                },
            })
            .collect();

        let completed_steps = steps.iter().filter(|s| s.status == StepStatus::Captured).count();
        let total_steps = catalog.len();
        let progress_percent = progress_percent(completed_steps, total_steps);

        let buckets = BUCKETS
            .iter()
            .map(|(title, ids)| BucketProgress {
                title: title.to_string(),
                completed: ids.iter().filter(|id| entries.contains_key(**id)).count(),
                total: ids.len(),
            })
            .collect();

        Self {
            completed_steps,
            total_steps,
            progress_percent,
            is_complete: progress_percent >= 100,
            buckets,
            latest_weekly_plan: newest_first(state.weekly_plans.values()).first().map(|p| (*p).clone()),
            spotlight: spotlight(catalog, state, scores),
            steps,
        }
    }
}

pub fn progress_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

fn spotlight(catalog: &StepCatalog, state: &PlannerState, scores: &GoalScores) -> Vec<SpotlightGoal> {
    let (Some(step), Some(entry)) = (catalog.find(GOAL_STEP_ID), state.entries.get(GOAL_STEP_ID)) else {
        return Vec::new();
    };
    step.fields
        .iter()
        .filter_map(|field| {
            let raw = entry.get(&field.id).map(|v| v.trim()).unwrap_or_default();
            if raw.is_empty() {
                return None;
            }
            Some(SpotlightGoal {
                id: field.id.clone(),
                label: goal_label(&field.label),
                summary: truncate_summary(raw),
                score: scores.get(&field.id).copied().unwrap_or(DEFAULT_SCORE),
            })
        })
        .collect()
}

/// Drop a trailing " goal", ignoring case
pub fn goal_label(label: &str) -> String {
    const SUFFIX: &str = " goal";
    match label.len().checked_sub(SUFFIX.len()).and_then(|cut| label.get(cut..).map(|tail| (cut, tail))) {
        Some((cut, tail)) if tail.eq_ignore_ascii_case(SUFFIX) => label[..cut].to_string(),
        _ => label.to_string(),
    }
}

pub fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() > SUMMARY_LIMIT {
        let cut: String = summary.chars().take(SUMMARY_CUT).collect();
        format!("{}…", cut)
    } else {
        summary.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlannerEntry;
    use chrono::{TimeZone, Utc};

    fn entry(pairs: &[(&str, &str)]) -> PlannerEntry {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_empty_state() {
        let summary = DashboardSummary::compute(&StepCatalog::builtin(), &PlannerState::default(), &GoalScores::new());
        assert_eq!(summary.completed_steps, 0);
        assert_eq!(summary.total_steps, 8);
        assert_eq!(summary.progress_percent, 0);
        assert!(!summary.is_complete);
        assert!(summary.latest_weekly_plan.is_none());
        assert!(summary.spotlight.is_empty());
        assert!(summary.steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(summary.buckets[0].status(), "0/4");
    }

    #[test]
    fn test_progress_and_buckets() {
        let mut state = PlannerState::default();
        for id in ["commitment", "vision", "past-year"] {
            state.entries.insert(id.to_string(), entry(&[("x", "1")]));
        }
        let summary = DashboardSummary::compute(&StepCatalog::builtin(), &state, &GoalScores::new());
        assert_eq!(summary.completed_steps, 3);
        // 3/8 = 37.5%
        assert_eq!(summary.progress_percent, 38);
        let statuses: Vec<String> = summary.buckets.iter().map(|b| b.status()).collect();
        assert_eq!(statuses, vec!["2/4", "1/2", "0/2"]);
        assert_eq!(summary.steps[1].status, StepStatus::Captured);
    }

    #[test]
    fn test_complete_flow() {
        let catalog = StepCatalog::builtin();
        let mut state = PlannerState::default();
        for step in catalog.steps() {
            state.entries.insert(step.id.clone(), PlannerEntry::new());
        }
        let summary = DashboardSummary::compute(&catalog, &state, &GoalScores::new());
        assert_eq!(summary.progress_percent, 100);
        assert!(summary.is_complete);
    }

    #[test]
    fn test_latest_weekly_plan() {
        let mut state = PlannerState::default();
        for (week, day) in [(1, 3), (2, 10), (3, 7)] {
            let plan = WeeklyPlan::new(2025, 3, week, "f", Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap());
            state.weekly_plans.insert(plan.id.clone(), plan);
        }
        let summary = DashboardSummary::compute(&StepCatalog::builtin(), &state, &GoalScores::new());
        assert_eq!(summary.latest_weekly_plan.unwrap().id, "2025-3-2");
    }

    #[test]
    fn test_spotlight() {
        let mut state = PlannerState::default();
        let long = "x".repeat(200);
        state.entries.insert(
            GOAL_STEP_ID.to_string(),
            entry(&[("goal_self", "  Read more  "), ("goal_body", "   "), ("goal_professional", long.as_str())]),
        );
        let scores: GoalScores = [("goal_self".to_string(), 9)].into();

        let spotlight = DashboardSummary::compute(&StepCatalog::builtin(), &state, &scores).spotlight;
        assert_eq!(spotlight.len(), 2);
        assert_eq!(spotlight[0].label, "Self");
        assert_eq!(spotlight[0].summary, "Read more");
        assert_eq!(spotlight[0].score, 9);
        assert_eq!(spotlight[1].label, "Professional");
        assert_eq!(spotlight[1].score, DEFAULT_SCORE);
        assert_eq!(spotlight[1].summary.chars().count(), 178);
        assert!(spotlight[1].summary.ends_with('…'));
    }

    #[test]
    fn test_goal_label() {
        assert_eq!(goal_label("Body GOAL"), "Body");
        assert_eq!(goal_label("Goalkeeper"), "Goalkeeper");
        assert_eq!(goal_label("goal"), "goal");
        assert_eq!(truncate_summary(&"y".repeat(180)).len(), 180);
    }
}
