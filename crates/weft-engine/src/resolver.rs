//! Three-tier selector resolution.
//!
//! Every selector-bearing step goes through the same ladder: try the
//! step's own selector, then a learned replacement from the knowledge
//! base, then one oracle consultation. Tiers run strictly in order, the
//! first success wins, and a tier is never retried within a step.

use crate::context::ExecutionContext;
use crate::driver::{DriverError, PageDriver};
use crate::knowledge::KnowledgeBase;
use crate::oracle::{
    DOM_SNAPSHOT_JS, OracleError, OracleRequest, OracleSuggestion, SelectorOracle,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use weft_common::knowledge::{PageContext, Solution, SolutionFate};
use weft_common::{Step, StepAction, VerifyChecks};

/// Which tier satisfied a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Direct,
    Learned,
    Oracle,
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionTier::Direct => "direct",
            ResolutionTier::Learned => "learned",
            ResolutionTier::Oracle => "oracle",
        };
        write!(f, "{}", name)
    }
}

/// Per-run counters, reset at the start of each flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResolutionStats {
    pub direct_hits: u32,
    pub learned_hits: u32,
    pub oracle_hits: u32,
    pub failures: u32,
    pub oracle_calls: u32,
    pub oracle_cost: f64,
}

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("all strategies failed for {action} '{selector}': {last_error}")]
    AllStrategiesFailed {
        action: StepAction,
        selector: String,
        last_error: String,
    },
}

pub struct StrategyResolver {
    oracle: Option<Arc<dyn SelectorOracle>>,
    interaction_timeout: Duration,
    oracle_cost_per_call: f64,
    stats: ResolutionStats,
}

impl StrategyResolver {
    pub fn new(
        interaction_timeout: Duration,
        oracle_cost_per_call: f64,
        oracle: Option<Arc<dyn SelectorOracle>>,
    ) -> Self {
        StrategyResolver {
            oracle,
            interaction_timeout,
            oracle_cost_per_call,
            stats: ResolutionStats::default(),
        }
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn stats(&self) -> ResolutionStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ResolutionStats::default();
    }

    /// Run one selector-bearing step through the ladder.
    ///
    /// The step must already be substituted and normalized. A learned
    /// entry that works is reinforced; one that fails is penalized and
    /// possibly dropped. An oracle suggestion that works becomes a new
    /// entry at the initial confidence.
    pub async fn resolve_step<D: PageDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        knowledge: &mut KnowledgeBase,
        context: &ExecutionContext,
        step: &Step,
    ) -> Result<ResolutionTier, ResolverError> {
        let action = step.action();
        let selector = step.target().unwrap_or_default().to_string();

        let mut last_error = match self.attempt(driver, step, &selector).await {
            Ok(()) => {
                debug!("Selector '{}' worked directly", selector);
                self.stats.direct_hits += 1;
                return Ok(ResolutionTier::Direct);
            }
            Err(e) => {
                debug!("Direct attempt on '{}' failed: {}", selector, e);
                e.to_string()
            }
        };

        if let Some((id, learned_selector)) = knowledge
            .lookup(action, &selector, context.page_type)
            .map(|s| (s.id.clone(), s.learned_selector.clone()))
        {
            debug!("Trying learned selector '{}' for '{}'", learned_selector, selector);
            match self.attempt(driver, step, &learned_selector).await {
                Ok(()) => {
                    if let Some(confidence) = knowledge.record_success(&id) {
                        info!(
                            "Learned selector '{}' healed '{}' (confidence {:.2})",
                            learned_selector, selector, confidence
                        );
                    }
                    self.stats.learned_hits += 1;
                    return Ok(ResolutionTier::Learned);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if knowledge.record_failure(&id) == Some(SolutionFate::Discard) {
                        info!(
                            "Dropped learned selector '{}' after repeated failures",
                            learned_selector
                        );
                    } else {
                        debug!("Learned selector '{}' failed: {}", learned_selector, e);
                    }
                }
            }
        } else {
            debug!("No learned solution for {} '{}'", action, selector);
        }

        if let Some(oracle) = self.oracle.clone() {
            self.stats.oracle_calls += 1;
            self.stats.oracle_cost += self.oracle_cost_per_call;
            match consult_oracle(driver, context, step, &selector, oracle.as_ref()).await {
                Ok(suggestion) => {
                    info!(
                        "Oracle suggested '{}' for '{}' (confidence {:.2})",
                        suggestion.selector, selector, suggestion.confidence
                    );
                    match self.attempt(driver, step, &suggestion.selector).await {
                        Ok(()) => {
                            knowledge.insert(Solution::learned(
                                action,
                                &selector,
                                &suggestion.selector,
                                PageContext {
                                    url: context.current_url.clone(),
                                    page_type: context.page_type,
                                },
                            ));
                            self.stats.oracle_hits += 1;
                            return Ok(ResolutionTier::Oracle);
                        }
                        Err(e) => {
                            warn!("Oracle suggestion '{}' did not work: {}", suggestion.selector, e);
                            last_error = e.to_string();
                        }
                    }
                }
                Err(e) => {
                    warn!("Oracle consultation failed: {}", e);
                    last_error = e.to_string();
                }
            }
        } else {
            debug!("No oracle configured, giving up on '{}'", selector);
        }

        self.stats.failures += 1;
        Err(ResolverError::AllStrategiesFailed {
            action,
            selector,
            last_error,
        })
    }

    /// One attempt of one step with one selector, bounded by the
    /// interaction timeout. Waits get their own deadline plus a grace
    /// second, since the driver enforces the wait internally.
    async fn attempt<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        step: &Step,
        selector: &str,
    ) -> Result<(), DriverError> {
        let limit = match step {
            Step::Wait { timeout_ms, .. } => {
                let wait = timeout_ms.unwrap_or(self.interaction_timeout.as_millis() as u64);
                Duration::from_millis(wait) + Duration::from_secs(1)
            }
            _ => self.interaction_timeout,
        };
        match tokio::time::timeout(limit, self.perform(driver, step, selector)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(limit)),
        }
    }

    async fn perform<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        step: &Step,
        selector: &str,
    ) -> Result<(), DriverError> {
        match step {
            Step::Click { .. } => driver.click(selector).await,
            Step::Type { value, .. } => driver.type_text(selector, value).await,
            Step::Fill { value, .. } => driver.fill(selector, value).await,
            Step::Clear { .. } => driver.clear(selector).await,
            Step::Wait { timeout_ms, .. } => {
                let timeout = Duration::from_millis(
                    timeout_ms.unwrap_or(self.interaction_timeout.as_millis() as u64),
                );
                driver.wait_for(selector, timeout).await
            }
            Step::Verify { checks, .. } => verify(driver, selector, checks).await,
            Step::Navigate { .. } | Step::Screenshot { .. } => Err(DriverError::NotSupported(
                format!("{} does not take a selector", step.action()),
            )),
        }
    }
}

async fn consult_oracle<D: PageDriver + ?Sized>(
    driver: &mut D,
    context: &ExecutionContext,
    step: &Step,
    failed_selector: &str,
    oracle: &dyn SelectorOracle,
) -> Result<OracleSuggestion, OracleError> {
    let screenshot = driver
        .screenshot()
        .await
        .map_err(|e| OracleError::Snapshot(e.to_string()))?;
    let dom_value = driver
        .evaluate(DOM_SNAPSHOT_JS)
        .await
        .map_err(|e| OracleError::Snapshot(e.to_string()))?;
    let dom_snapshot = match dom_value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };

    oracle
        .suggest(OracleRequest {
            screenshot,
            dom_snapshot,
            failed_selector: failed_selector.to_string(),
            action_description: step.label(),
            page_url: context.current_url.clone(),
        })
        .await
}

/// Evaluate every requested check against the page; the first miss fails
/// the whole verify. `contains` is case-sensitive, `text_includes` is
/// not.
async fn verify<D: PageDriver + ?Sized>(
    driver: &mut D,
    selector: &str,
    checks: &VerifyChecks,
) -> Result<(), DriverError> {
    if let Some(expected) = checks.exists {
        let found = driver.count(selector).await? > 0;
        if found != expected {
            return Err(check_failed(
                selector,
                format!("exists: expected {}, found {}", expected, found),
            ));
        }
    }
    if let Some(expected) = checks.visible {
        let visible = driver.is_visible(selector).await?;
        if visible != expected {
            return Err(check_failed(
                selector,
                format!("visible: expected {}, found {}", expected, visible),
            ));
        }
    }
    if let Some(expected) = checks.enabled {
        let enabled = driver.is_enabled(selector).await?;
        if enabled != expected {
            return Err(check_failed(
                selector,
                format!("enabled: expected {}, found {}", expected, enabled),
            ));
        }
    }
    if let Some(expected) = &checks.contains {
        let text = driver.text_content(selector).await?;
        if !text.contains(expected.as_str()) {
            return Err(check_failed(
                selector,
                format!("text does not contain '{}'", expected),
            ));
        }
    }
    if let Some(expected) = &checks.text_includes {
        let text = driver.text_content(selector).await?;
        if !text.to_lowercase().contains(&expected.to_lowercase()) {
            return Err(check_failed(
                selector,
                format!("text does not include '{}'", expected),
            ));
        }
    }
    if let Some(expected) = checks.count {
        let actual = driver.count(selector).await? as usize;
        if actual != expected {
            return Err(check_failed(
                selector,
                format!("count: expected {}, found {}", expected, actual),
            ));
        }
    }
    if let Some(expected) = checks.min_count {
        let actual = driver.count(selector).await? as usize;
        if actual < expected {
            return Err(check_failed(
                selector,
                format!("count: expected at least {}, found {}", expected, actual),
            ));
        }
    }
    Ok(())
}

fn check_failed(selector: &str, check: String) -> DriverError {
    DriverError::Verification {
        selector: selector.to_string(),
        check,
    }
}
