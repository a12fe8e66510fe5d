//! Step definitions for the planner flow

use serde::{Deserialize, Serialize};

/// Input kind of a planner field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Select,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Textarea => write!(f, "textarea"),
            Self::Number => write!(f, "number"),
            Self::Select => write!(f, "select"),
        }
    }
}

/// Specialized rendering scheme for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CustomLayout {
    CommitmentLetter,
    VisionQuadrants,
    WheelOfLife,
}

/// One choice of a `select` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub label: String,
    pub value: String,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A single input captured by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlannerField {
    pub id: String,
    pub label: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl PlannerField {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            placeholder: None,
            helper_text: None,
            options: Vec::new(),
            default_value: None,
        }
    }

    /// Builder: set placeholder text
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Builder: set helper text
    pub fn with_helper(mut self, helper: impl Into<String>) -> Self {
        self.helper_text = Some(helper.into());
        self
    }

    /// Builder: set select options
    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    /// Builder: set default value
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// One unit of the linear planning flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlannerStep {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub fields: Vec<PlannerField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_layout: Option<CustomLayout>,
}

impl PlannerStep {
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            fields: Vec::new(),
            custom_layout: None,
        }
    }

    /// Builder: append a field
    pub fn field(mut self, field: PlannerField) -> Self {
        self.fields.push(field);
        self
    }

    /// Builder: select a custom layout
    pub fn with_layout(mut self, layout: CustomLayout) -> Self {
        self.custom_layout = Some(layout);
        self
    }

    pub fn find_field(&self, id: &str) -> Option<&PlannerField> {
        self.fields.iter().find(|f| f.id == id)
    }
}
