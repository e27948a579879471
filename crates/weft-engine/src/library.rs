//! Loading and indexing flow definitions.
//!
//! Flow files are YAML mappings of `category -> name -> flow`, with an
//! optional `flows:` wrapper key at the top. Flows are addressed by dot
//! path (`auth.login`). A flow that fails validation is skipped with a
//! warning so one broken definition never blocks the rest of the suite.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};
use weft_common::{FlowDefinition, Step};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Failed to read flow file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse flow file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid flow glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to walk flow files: {0}")]
    Glob(#[from] glob::GlobError),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Flow '{0}' has no steps")]
    NoSteps(String),

    #[error("Flow '{flow}' step {step} has an empty target")]
    EmptyTarget { flow: String, step: usize },

    #[error("Flow '{flow}' step {step} waits for nothing (no target, no ms)")]
    WaitWithoutCondition { flow: String, step: usize },

    #[error("Flow '{flow}' step {step} verifies nothing")]
    VerifyWithoutChecks { flow: String, step: usize },

    #[error("Flow '{flow}' lists required parameter '{name}' twice")]
    DuplicateParameter { flow: String, name: String },
}

pub trait Validatable {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validatable for FlowDefinition {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.steps.is_empty() {
            return Err(ValidationError::NoSteps(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for param in &self.required_params {
            if !seen.insert(param.as_str()) {
                return Err(ValidationError::DuplicateParameter {
                    flow: self.name.clone(),
                    name: param.clone(),
                });
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            match step {
                Step::Wait {
                    target: None,
                    ms: None,
                    ..
                } => {
                    return Err(ValidationError::WaitWithoutCondition {
                        flow: self.name.clone(),
                        step: number,
                    });
                }
                Step::Verify { checks, .. } if checks.is_empty() => {
                    return Err(ValidationError::VerifyWithoutChecks {
                        flow: self.name.clone(),
                        step: number,
                    });
                }
                _ => {}
            }
            if let Some(target) = step.target()
                && target.trim().is_empty()
            {
                return Err(ValidationError::EmptyTarget {
                    flow: self.name.clone(),
                    step: number,
                });
            }
        }
        Ok(())
    }
}

/// What a dry-run pass over the flow files found.
#[derive(Debug, Default)]
pub struct CheckOutcome {
    pub files: usize,
    pub flows: usize,
    pub problems: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FlowLibrary {
    flows: BTreeMap<String, FlowDefinition>,
}

impl FlowLibrary {
    pub fn new() -> Self {
        FlowLibrary::default()
    }

    /// Load every flow file matching the glob.
    pub async fn load_glob(pattern: &str) -> Result<FlowLibrary, LibraryError> {
        let mut library = FlowLibrary::new();
        let mut files = 0;
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            files += 1;
            let loaded = library.load_file(&path).await?;
            debug!("Loaded {} flows from {}", loaded, path.display());
        }
        if files == 0 {
            warn!("No flow files matched '{}'", pattern);
        }
        Ok(library)
    }

    pub async fn load_file(&mut self, path: &Path) -> Result<usize, LibraryError> {
        let content = tokio::fs::read_to_string(path).await?;
        self.load_str(&content, &path.display().to_string())
    }

    /// Parse flows out of one YAML document, skipping unusable entries
    /// with a warning. Only unreadable YAML fails the whole document.
    pub fn load_str(&mut self, content: &str, source: &str) -> Result<usize, LibraryError> {
        let (flows, problems) = parse_flows(content, source)?;
        for problem in &problems {
            warn!("Skipping flow: {}", problem);
        }
        let count = flows.len();
        for flow in flows {
            let name = flow.name.clone();
            if self.flows.insert(name.clone(), flow).is_some() {
                warn!("Flow {} defined more than once, keeping the later copy", name);
            }
        }
        Ok(count)
    }

    /// Validate every matching file without building a library. Used by
    /// the `check` command.
    pub async fn check_glob(pattern: &str) -> Result<CheckOutcome, LibraryError> {
        let mut outcome = CheckOutcome::default();
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            outcome.files += 1;
            let source = path.display().to_string();
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match parse_flows(&content, &source) {
                    Ok((flows, problems)) => {
                        outcome.flows += flows.len();
                        outcome.problems.extend(problems);
                    }
                    Err(e) => outcome.problems.push(format!("{}: {}", source, e)),
                },
                Err(e) => outcome.problems.push(format!("{}: {}", source, e)),
            }
        }
        Ok(outcome)
    }

    /// Look up a flow by dot path, e.g. `auth.login`.
    pub fn resolve(&self, path: &str) -> Option<&FlowDefinition> {
        self.flows.get(path)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Every flow, highest priority first, name as tie-break.
    pub fn all(&self) -> Vec<&FlowDefinition> {
        let mut flows: Vec<&FlowDefinition> = self.flows.values().collect();
        flows.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        flows
    }

    /// Flows under one category prefix, same ordering as [`all`].
    ///
    /// [`all`]: FlowLibrary::all
    pub fn category(&self, category: &str) -> Vec<&FlowDefinition> {
        let prefix = format!("{}.", category);
        let mut flows: Vec<&FlowDefinition> = self
            .flows
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(_, flow)| flow)
            .collect();
        flows.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        flows
    }
}

fn parse_flows(
    content: &str,
    source: &str,
) -> Result<(Vec<FlowDefinition>, Vec<String>), LibraryError> {
    let root: serde_yaml::Value = serde_yaml::from_str(content)?;
    let categories = match root.get("flows") {
        Some(inner) => inner.clone(),
        None => root,
    };

    let mut flows = Vec::new();
    let mut problems = Vec::new();

    let serde_yaml::Value::Mapping(categories) = categories else {
        problems.push(format!("{}: top level is not a mapping of categories", source));
        return Ok((flows, problems));
    };

    for (category_key, flows_value) in categories {
        let Some(category) = category_key.as_str().map(str::to_owned) else {
            problems.push(format!("{}: category keys must be strings", source));
            continue;
        };
        let serde_yaml::Value::Mapping(flow_map) = flows_value else {
            problems.push(format!(
                "{}: category '{}' is not a mapping of flows",
                source, category
            ));
            continue;
        };
        for (name_key, flow_value) in flow_map {
            let Some(name) = name_key.as_str().map(str::to_owned) else {
                problems.push(format!(
                    "{}: flow names under '{}' must be strings",
                    source, category
                ));
                continue;
            };
            let path = format!("{}.{}", category, name);
            match serde_yaml::from_value::<FlowDefinition>(flow_value) {
                Ok(mut flow) => {
                    flow.name = path;
                    match flow.validate() {
                        Ok(()) => flows.push(flow),
                        Err(e) => problems.push(format!("{}: {}", source, e)),
                    }
                }
                Err(e) => problems.push(format!("{}: flow '{}': {}", source, path, e)),
            }
        }
    }

    Ok((flows, problems))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_common::VerifyChecks;

    fn flow(steps: Vec<Step>) -> FlowDefinition {
        FlowDefinition {
            name: "auth.login".to_string(),
            steps,
            ..FlowDefinition::default()
        }
    }

    #[test]
    fn empty_flow_is_rejected() {
        assert!(matches!(
            flow(vec![]).validate(),
            Err(ValidationError::NoSteps(_))
        ));
    }

    #[test]
    fn wait_needs_target_or_ms() {
        let bad = flow(vec![Step::Wait {
            target: None,
            ms: None,
            timeout_ms: None,
            optional: false,
            description: None,
        }]);
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::WaitWithoutCondition { step: 1, .. })
        ));

        let ok = flow(vec![Step::Wait {
            target: None,
            ms: Some(500),
            timeout_ms: None,
            optional: false,
            description: None,
        }]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn verify_needs_at_least_one_check() {
        let bad = flow(vec![Step::Verify {
            target: ".banner".to_string(),
            checks: VerifyChecks::default(),
            optional: false,
            description: None,
        }]);
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::VerifyWithoutChecks { step: 1, .. })
        ));
    }

    #[test]
    fn empty_target_is_rejected() {
        let bad = flow(vec![Step::Click {
            target: "  ".to_string(),
            optional: false,
            description: None,
        }]);
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::EmptyTarget { step: 1, .. })
        ));
    }

    #[test]
    fn duplicate_required_params_are_rejected() {
        let mut bad = flow(vec![Step::Navigate {
            target: "/".to_string(),
            description: None,
        }]);
        bad.required_params = vec!["email".to_string(), "email".to_string()];
        assert!(matches!(
            bad.validate(),
            Err(ValidationError::DuplicateParameter { .. })
        ));
    }
}
