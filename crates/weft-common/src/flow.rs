use crate::selector::normalize_selector;
use crate::substitution::{ParamMap, substitute};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, ordered test scenario loaded from a flow file.
///
/// Flows are templates: the interpreter derives a per-run copy of each step
/// (substitution, normalization) and never mutates the definition itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Dot path `category.flow_name`, filled in by the library on load.
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// One atomic browser action with its target and options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Click {
        target: String,
        #[serde(default)]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Type {
        target: String,
        value: String,
        #[serde(default)]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Fill {
        target: String,
        value: String,
        #[serde(default)]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Clear {
        target: String,
        #[serde(default)]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        #[serde(default)]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Verify {
        target: String,
        #[serde(flatten)]
        checks: VerifyChecks,
        #[serde(default)]
        optional: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// Assertions a `verify` step can carry. At least one must be set, which the
/// library checks at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerifyChecks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Case-sensitive substring of the element's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Case-insensitive substring of the element's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_includes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl VerifyChecks {
    pub fn is_empty(&self) -> bool {
        self.exists.is_none()
            && self.visible.is_none()
            && self.contains.is_none()
            && self.text_includes.is_none()
            && self.count.is_none()
            && self.min_count.is_none()
            && self.enabled.is_none()
    }
}

/// The action kind of a step, used in solution ids and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Navigate,
    Click,
    Type,
    Fill,
    Clear,
    Wait,
    Verify,
    Screenshot,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepAction::Navigate => "navigate",
            StepAction::Click => "click",
            StepAction::Type => "type",
            StepAction::Fill => "fill",
            StepAction::Clear => "clear",
            StepAction::Wait => "wait",
            StepAction::Verify => "verify",
            StepAction::Screenshot => "screenshot",
        };
        write!(f, "{}", s)
    }
}

impl Step {
    pub fn action(&self) -> StepAction {
        match self {
            Step::Navigate { .. } => StepAction::Navigate,
            Step::Click { .. } => StepAction::Click,
            Step::Type { .. } => StepAction::Type,
            Step::Fill { .. } => StepAction::Fill,
            Step::Clear { .. } => StepAction::Clear,
            Step::Wait { .. } => StepAction::Wait,
            Step::Verify { .. } => StepAction::Verify,
            Step::Screenshot { .. } => StepAction::Screenshot,
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Step::Navigate { target, .. }
            | Step::Click { target, .. }
            | Step::Type { target, .. }
            | Step::Fill { target, .. }
            | Step::Clear { target, .. }
            | Step::Verify { target, .. } => Some(target),
            Step::Wait { target, .. } => target.as_deref(),
            Step::Screenshot { .. } => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Step::Click { optional, .. }
            | Step::Type { optional, .. }
            | Step::Fill { optional, .. }
            | Step::Clear { optional, .. }
            | Step::Wait { optional, .. }
            | Step::Verify { optional, .. } => *optional,
            Step::Navigate { .. } | Step::Screenshot { .. } => false,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Step::Navigate { description, .. }
            | Step::Click { description, .. }
            | Step::Type { description, .. }
            | Step::Fill { description, .. }
            | Step::Clear { description, .. }
            | Step::Wait { description, .. }
            | Step::Verify { description, .. }
            | Step::Screenshot { description, .. } => description.as_deref(),
        }
    }

    /// Human label for logs and reports: the description when present,
    /// otherwise "action target".
    pub fn label(&self) -> String {
        if let Some(desc) = self.description() {
            return desc.to_string();
        }
        match self.target() {
            Some(target) => format!("{} {}", self.action(), target),
            None => self.action().to_string(),
        }
    }

    /// Derived copy with `{key}` / `${key}` tokens replaced in target and
    /// value fields. The template step is left untouched.
    pub fn substituted(&self, params: &ParamMap) -> Step {
        let mut step = self.clone();
        match &mut step {
            Step::Navigate { target, .. }
            | Step::Click { target, .. }
            | Step::Clear { target, .. } => {
                *target = substitute(target, params);
            }
            Step::Type { target, value, .. } | Step::Fill { target, value, .. } => {
                *target = substitute(target, params);
                *value = substitute(value, params);
            }
            Step::Wait { target, .. } => {
                if let Some(t) = target {
                    *t = substitute(t, params);
                }
            }
            Step::Verify { target, checks, .. } => {
                *target = substitute(target, params);
                if let Some(text) = &mut checks.contains {
                    *text = substitute(text, params);
                }
                if let Some(text) = &mut checks.text_includes {
                    *text = substitute(text, params);
                }
            }
            Step::Screenshot { .. } => {}
        }
        step
    }

    /// Derived copy with the selector rewritten into the driver dialect.
    /// Navigation targets are URLs, not selectors, and pass through.
    pub fn normalized(&self) -> Step {
        let mut step = self.clone();
        match &mut step {
            Step::Click { target, .. }
            | Step::Type { target, .. }
            | Step::Fill { target, .. }
            | Step::Clear { target, .. }
            | Step::Verify { target, .. } => {
                *target = normalize_selector(target);
            }
            Step::Wait { target, .. } => {
                if let Some(t) = target {
                    *t = normalize_selector(t);
                }
            }
            Step::Navigate { .. } | Step::Screenshot { .. } => {}
        }
        step
    }
}
