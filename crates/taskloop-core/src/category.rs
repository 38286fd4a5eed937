//! Task categories.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::Priority;

/// Name of a task category, e.g. `data_collection`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryName(String);

impl CategoryName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CategoryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CategoryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// One row of a catalog table: how many tasks a category contributes and at
/// which priority they run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Category name, also the prefix of every task id in it.
    pub name: CategoryName,

    /// Number of tasks generated for this category.
    pub count: u32,

    /// Priority assigned to every task in the category.
    pub priority: Priority,

    /// Human-readable prefix for task names. Falls back to the category name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Description template. `{n}` expands to the task's sequence number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parameter template copied onto every task of the category. `{n}`
    /// inside a string expands to the sequence number; a string that is
    /// exactly `"{n}"` becomes the number itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl CategorySpec {
    /// Create a new CategorySpec.
    pub fn new(name: impl Into<CategoryName>, count: u32, priority: Priority) -> Self {
        Self {
            name: name.into(),
            count,
            priority,
            display_name: None,
            description: None,
            parameters: None,
        }
    }

    /// Builder method to set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, template: impl Into<String>) -> Self {
        self.description = Some(template.into());
        self
    }

    pub fn with_parameters(mut self, template: Value) -> Self {
        self.parameters = Some(template);
        self
    }

    /// Description of the `sequence`-th task, if the category has a template.
    pub fn description_for(&self, sequence: u32) -> Option<String> {
        self.description
            .as_deref()
            .map(|template| template.replace(SEQUENCE_PLACEHOLDER, &sequence.to_string()))
    }

    /// Parameters of the `sequence`-th task. Empty object without a template.
    pub fn parameters_for(&self, sequence: u32) -> Value {
        match &self.parameters {
            Some(template) => expand(template, sequence),
            None => Value::Object(Map::new()),
        }
    }

    /// Name used when labelling tasks of this category.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .unwrap_or_else(|| self.name.as_str())
    }
}

const SEQUENCE_PLACEHOLDER: &str = "{n}";

fn expand(template: &Value, sequence: u32) -> Value {
    match template {
        Value::String(s) if s == SEQUENCE_PLACEHOLDER => Value::from(sequence),
        Value::String(s) => Value::String(s.replace(SEQUENCE_PLACEHOLDER, &sequence.to_string())),
        Value::Array(items) => Value::Array(items.iter().map(|v| expand(v, sequence)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand(v, sequence)))
                .collect(),
        ),
        other => other.clone(),
    }
}
