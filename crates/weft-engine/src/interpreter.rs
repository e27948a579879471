//! The flow interpreter.
//!
//! Walks a flow's steps strictly in order. Each step is substituted and
//! normalized, then either handled directly (navigation, plain sleeps,
//! screenshots) or handed to the resolver ladder. A failed optional step
//! is recorded and skipped; a failed required step ends the run with a
//! failed report rather than an `Err`, so the caller still gets the
//! partial step trail.

use crate::config::WeftConfig;
use crate::context::ExecutionContext;
use crate::driver::{DriverError, PageDriver};
use crate::knowledge::KnowledgeBase;
use crate::library::FlowLibrary;
use crate::oracle::SelectorOracle;
use crate::resolver::{ResolutionStats, ResolutionTier, ResolverError, StrategyResolver};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use weft_common::substitution::mask_value;
use weft_common::{FlowDefinition, ParamMap, Step, StepAction};

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    NotFound(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
}

#[derive(Error, Debug)]
enum StepError {
    #[error("{0}")]
    Driver(#[from] DriverError),

    #[error("{0}")]
    Resolution(#[from] ResolverError),

    #[error("Could not write artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Zero-based position in the flow.
    pub index: usize,
    pub label: String,
    pub action: StepAction,
    pub status: StepStatus,
    /// Which tier resolved the step; `None` for directly handled steps
    /// and for failures.
    pub tier: Option<ResolutionTier>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub flow_path: String,
    pub status: FlowStatus,
    pub steps: Vec<StepReport>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stats: ResolutionStats,
}

pub struct FlowInterpreter {
    config: WeftConfig,
    resolver: StrategyResolver,
}

impl FlowInterpreter {
    pub fn new(config: WeftConfig, oracle: Option<Arc<dyn SelectorOracle>>) -> Self {
        let resolver = StrategyResolver::new(
            Duration::from_millis(config.timeouts.interaction_ms),
            config.oracle.cost_per_call,
            oracle,
        );
        FlowInterpreter { config, resolver }
    }

    /// Run a flow addressed by dot path.
    pub async fn run_path<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        library: &FlowLibrary,
        path: &str,
        params: &ParamMap,
        knowledge: &mut KnowledgeBase,
    ) -> Result<FlowReport, FlowError> {
        let flow = library
            .resolve(path)
            .ok_or_else(|| FlowError::NotFound(path.to_string()))?;
        self.run(driver, flow, params, knowledge).await
    }

    /// Run one flow to completion against an already-launched driver.
    ///
    /// `Err` only for problems that prevent the run from starting at
    /// all; step failures come back inside the report.
    pub async fn run<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        flow: &FlowDefinition,
        params: &ParamMap,
        knowledge: &mut KnowledgeBase,
    ) -> Result<FlowReport, FlowError> {
        let merged = self.merge_params(params);
        for name in &flow.required_params {
            if !merged.contains_key(name) {
                return Err(FlowError::MissingParameter(name.clone()));
            }
        }
        for (key, value) in &merged {
            debug!("Param {} = {}", key, mask_value(key, value));
        }

        let mut context =
            ExecutionContext::new(flow.name.clone(), self.config.base_url.clone(), merged);
        self.resolver.reset_stats();

        info!("Running flow {} ({} steps)", flow.name, flow.steps.len());
        let started = Instant::now();
        let mut steps = Vec::with_capacity(flow.steps.len());
        let mut failed_step = None;
        let mut flow_error = None;

        for (index, template) in flow.steps.iter().enumerate() {
            let step = template.substituted(&context.params).normalized();
            let label = step.label();
            debug!("Step {}/{}: {}", index + 1, flow.steps.len(), label);

            let step_started = Instant::now();
            let outcome = self
                .execute_step(driver, knowledge, &mut context, &step)
                .await;
            let duration_ms = step_started.elapsed().as_millis() as u64;

            match outcome {
                Ok(tier) => {
                    steps.push(StepReport {
                        index,
                        label,
                        action: step.action(),
                        status: StepStatus::Passed,
                        tier,
                        duration_ms,
                        error: None,
                    });
                    self.capture_step_artifact(driver, &flow.name, index, &step)
                        .await;
                }
                Err(e) => {
                    let message = e.to_string();
                    if step.is_optional() {
                        warn!("Optional step {} failed, continuing: {}", index + 1, message);
                        steps.push(StepReport {
                            index,
                            label,
                            action: step.action(),
                            status: StepStatus::Skipped,
                            tier: None,
                            duration_ms,
                            error: Some(message),
                        });
                    } else {
                        steps.push(StepReport {
                            index,
                            label,
                            action: step.action(),
                            status: StepStatus::Failed,
                            tier: None,
                            duration_ms,
                            error: Some(message.clone()),
                        });
                        failed_step = Some(index);
                        flow_error = Some(message);
                        break;
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let status = if failed_step.is_some() {
            FlowStatus::Failed
        } else {
            FlowStatus::Passed
        };

        if let Some(expected) = flow.expected_duration_ms
            && duration_ms > expected
        {
            warn!(
                "Flow {} took {}ms, expected at most {}ms",
                flow.name, duration_ms, expected
            );
        }

        match status {
            FlowStatus::Passed => info!("Flow {} passed in {}ms", flow.name, duration_ms),
            _ => warn!(
                "Flow {} failed at step {} in {}ms",
                flow.name,
                failed_step.map(|i| i + 1).unwrap_or(0),
                duration_ms
            ),
        }

        Ok(FlowReport {
            flow_path: flow.name.clone(),
            status,
            steps,
            duration_ms,
            failed_step,
            error: flow_error,
            stats: self.resolver.stats(),
        })
    }

    async fn execute_step<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        knowledge: &mut KnowledgeBase,
        context: &mut ExecutionContext,
        step: &Step,
    ) -> Result<Option<ResolutionTier>, StepError> {
        match step {
            Step::Navigate { target, .. } => {
                let url = context.absolute_url(target);
                let limit = Duration::from_millis(self.config.timeouts.navigation_ms);
                match tokio::time::timeout(limit, driver.goto(&url)).await {
                    Ok(result) => result?,
                    Err(_) => return Err(StepError::Driver(DriverError::Timeout(limit))),
                }
                // Track where we actually landed so page-type scoping
                // follows redirects.
                match driver.current_url().await {
                    Ok(current) => context.observe_url(&current),
                    Err(_) => context.observe_url(&url),
                }
                Ok(None)
            }
            Step::Wait { target: None, ms, .. } => {
                tokio::time::sleep(Duration::from_millis(ms.unwrap_or(0))).await;
                Ok(None)
            }
            Step::Screenshot { name, .. } => {
                if self.config.artifacts_dir.is_none() {
                    debug!("No artifacts dir configured, skipping screenshot");
                    return Ok(None);
                }
                let bytes = driver.screenshot().await?;
                let name = name.as_deref().unwrap_or("screenshot");
                self.write_artifact(&context.flow_path, name, &bytes)?;
                Ok(None)
            }
            _ => {
                let tier = self
                    .resolver
                    .resolve_step(driver, knowledge, context, step)
                    .await?;
                Ok(Some(tier))
            }
        }
    }

    /// Best-effort screenshot after visually meaningful steps. Never
    /// fails the run.
    async fn capture_step_artifact<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        flow: &str,
        index: usize,
        step: &Step,
    ) {
        if self.config.artifacts_dir.is_none() {
            return;
        }
        if !matches!(
            step.action(),
            StepAction::Navigate | StepAction::Click | StepAction::Verify
        ) {
            return;
        }
        match driver.screenshot().await {
            Ok(bytes) => {
                let name = format!("{:02}-{}", index + 1, step.action());
                if let Err(e) = self.write_artifact(flow, &name, &bytes) {
                    warn!("Could not save step screenshot: {}", e);
                }
            }
            Err(e) => warn!("Screenshot after step {} failed: {}", index + 1, e),
        }
    }

    fn write_artifact(&self, flow: &str, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        let Some(dir) = &self.config.artifacts_dir else {
            return Ok(());
        };
        let dir = dir.join(flow);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.png", name));
        std::fs::write(&path, bytes)?;
        debug!("Saved screenshot to {}", path.display());
        Ok(())
    }

    /// Precedence, lowest to highest: test data, credentials, the base
    /// URL, caller overrides.
    fn merge_params(&self, overrides: &ParamMap) -> ParamMap {
        let mut merged = self.config.test_data.clone();
        for (key, value) in &self.config.credentials {
            merged.insert(key.clone(), value.clone());
        }
        merged.insert("base_url".to_string(), self.config.base_url.clone());
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}
