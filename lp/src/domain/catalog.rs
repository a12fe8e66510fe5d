//! Ordered step catalog
//!
//! Order defines the flow sequence and therefore the gating rules. A catalog
//! is never empty and never contains duplicate step ids.

use std::collections::HashSet;
use std::path::Path;

use eyre::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use super::entry::{Entries, PlannerEntry};
use super::step::{CustomLayout, FieldOption, FieldType, PlannerField, PlannerStep};

/// Errors from catalog construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog must contain at least one step")]
    Empty,

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Duplicate field id {field} in step {step}")]
    DuplicateField { step: String, field: String },
}

/// Immutable, ordered sequence of planner steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCatalog {
    steps: Vec<PlannerStep>,
}

impl StepCatalog {
    /// Build a catalog, rejecting empty or ambiguous step lists
    pub fn new(steps: Vec<PlannerStep>) -> Result<Self, CatalogError> {
        debug!(step_count = steps.len(), "StepCatalog::new: called");
        if steps.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut step_ids = HashSet::new();
        for step in &steps {
            if !step_ids.insert(step.id.as_str()) {
                return Err(CatalogError::DuplicateStep(step.id.clone()));
            }
            let mut field_ids = HashSet::new();
            for field in &step.fields {
                if !field_ids.insert(field.id.as_str()) {
                    return Err(CatalogError::DuplicateField {
                        step: step.id.clone(),
                        field: field.id.clone(),
                    });
                }
            }
        }

        Ok(Self { steps })
    }

    /// Load a catalog from a YAML list of steps
    pub fn load_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(format!("Failed to read catalog {}", path.display()))?;
        let steps: Vec<PlannerStep> = serde_yaml::from_str(&content).context("Failed to parse catalog")?;
        let catalog = Self::new(steps).context(format!("Invalid catalog {}", path.display()))?;
        info!(path = %path.display(), steps = catalog.len(), "Loaded step catalog");
        Ok(catalog)
    }

    pub fn steps(&self) -> &[PlannerStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; kept for API symmetry with collections
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the final step
    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&PlannerStep> {
        self.steps.get(index)
    }

    pub fn find(&self, step_id: &str) -> Option<&PlannerStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn index_of(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.index_of(step_id).is_some()
    }

    /// Clamp an arbitrary index into `[0, len - 1]`
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.last_index())
    }

    /// Values to seed a step's form: stored value, else field default, else empty
    pub fn form_values(&self, step: &PlannerStep, entries: &Entries) -> PlannerEntry {
        let stored = entries.get(&step.id);
        step.fields
            .iter()
            .map(|field| {
                let value = stored
                    .and_then(|entry| entry.get(&field.id))
                    .cloned()
                    .or_else(|| field.default_value.clone())
                    .unwrap_or_default();
                (field.id.clone(), value)
            })
            .collect()
    }

    /// The built-in eight step life planning journey
    pub fn builtin() -> Self {
        Self {
            steps: builtin_steps(),
        }
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn textarea(id: &str, label: &str, placeholder: &str) -> PlannerField {
    PlannerField::new(id, label, FieldType::Textarea).with_placeholder(placeholder)
}

fn rating(id: &str, label: &str) -> PlannerField {
    PlannerField::new(id, label, FieldType::Number)
        .with_default("5")
        .with_helper("Rate from 1 to 10")
}

fn builtin_steps() -> Vec<PlannerStep> {
    vec![
        PlannerStep::new(
            "commitment",
            "Commitment",
            "Anchor into why this promise matters before planning anything else.",
        )
        .with_layout(CustomLayout::CommitmentLetter)
        .field(PlannerField::new("commitment_author", "Your name", FieldType::Text).with_placeholder("your name"))
        .field(textarea(
            "commitment_letter",
            "Commitment letter",
            "Describe how you will show up for yourself and the support you will call in.",
        )),
        PlannerStep::new("vision", "Vision", "Describe what vividly alive looks like in each area.")
            .with_layout(CustomLayout::VisionQuadrants)
            .field(textarea("vision_self", "Self", "Inner world, learning, spirituality, expression."))
            .field(textarea("vision_body", "Body", "Movement, nourishment, recovery, vitality."))
            .field(textarea("vision_family", "Family", "Relationships, rituals, shared traditions."))
            .field(textarea("vision_professional", "Professional", "Craft, leadership, impact, wealth.")),
        PlannerStep::new("wheel-of-life", "Wheel of Life", "Rate each quadrant to spot balance or tension.")
            .with_layout(CustomLayout::WheelOfLife)
            .field(rating("wheel_self", "Self"))
            .field(rating("wheel_body", "Body"))
            .field(rating("wheel_family", "Family"))
            .field(rating("wheel_professional", "Professional")),
        PlannerStep::new("purpose", "Purpose", "Name the thread that ties your choices together.")
            .field(textarea("purpose_statement", "Purpose statement", "I exist to..."))
            .field(PlannerField::new("core_values", "Core values", FieldType::Text).with_placeholder("three to five words")),
        PlannerStep::new("past-year", "Past Year", "Look back before looking forward.")
            .field(textarea("past_highlights", "Highlights", "What went well?"))
            .field(textarea("past_lessons", "Lessons", "What would you do differently?")),
        PlannerStep::new("year-ahead", "Year Ahead", "Set the tone for the coming year.")
            .field(PlannerField::new("year_theme", "Theme", FieldType::Text).with_placeholder("one word or phrase"))
            .field(
                PlannerField::new("year_pace", "Pace", FieldType::Select)
                    .with_placeholder("Choose an option")
                    .with_options(vec![
                        FieldOption::new("Restorative", "restorative"),
                        FieldOption::new("Steady", "steady"),
                        FieldOption::new("Ambitious", "ambitious"),
                    ]),
            ),
        PlannerStep::new("goal-setting", "Goal Setting", "One meaningful goal per area of life.")
            .field(textarea("goal_self", "Self goal", "What will you grow in yourself?"))
            .field(textarea("goal_body", "Body goal", "How will you care for your body?"))
            .field(textarea("goal_family", "Family goal", "How will you invest in family?"))
            .field(textarea("goal_professional", "Professional goal", "What will you build at work?")),
        PlannerStep::new("quarterly-planning", "Quarterly Planning", "Break the year into four focused sprints.")
            .field(PlannerField::new("q1_focus", "Q1 focus", FieldType::Text))
            .field(PlannerField::new("q2_focus", "Q2 focus", FieldType::Text))
            .field(PlannerField::new("q3_focus", "Q3 focus", FieldType::Text))
            .field(PlannerField::new("q4_focus", "Q4 focus", FieldType::Text)),
    ]
}
