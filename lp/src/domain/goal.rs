//! Goal scores
//!
//! Integer 1-10 ratings keyed by the field ids of the goal-setting step.
//! Scores live independently of step completion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Step whose fields define the goal identifiers
pub const GOAL_STEP_ID: &str = "goal-setting";

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Score shown for a goal nobody has rated yet
pub const DEFAULT_SCORE: u8 = 7;

/// Goal id -> score
pub type GoalScores = BTreeMap<String, u8>;

/// A single goal rating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalScore {
    pub goal_id: String,
    pub score: u8,
}

pub fn is_valid_score(score: u8) -> bool {
    (MIN_SCORE..=MAX_SCORE).contains(&score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(!is_valid_score(0));
        assert!(is_valid_score(1));
        assert!(is_valid_score(DEFAULT_SCORE));
        assert!(is_valid_score(10));
        assert!(!is_valid_score(11));
    }
}
