//! The learned-selector data model: `Solution` records, id derivation, and
//! the confidence arithmetic shared by the engine and its tests.

use crate::flow::StepAction;
use crate::page::PageType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Confidence a solution starts with when the oracle discovers it.
pub const INITIAL_CONFIDENCE: f64 = 0.7;
/// Ceiling confidence can reach through repeated successes.
pub const MAX_CONFIDENCE: f64 = 0.99;
/// Floor confidence is clamped to on failure.
pub const MIN_CONFIDENCE: f64 = 0.3;
/// Added on every successful reuse.
pub const SUCCESS_INCREMENT: f64 = 0.02;
/// Subtracted on every failed reuse.
pub const FAILURE_DECREMENT: f64 = 0.1;
/// A failure landing below this deletes the entry outright.
pub const DISCARD_THRESHOLD: f64 = 0.4;
/// An exact-id lookup is trusted only above this.
pub const EXACT_MATCH_THRESHOLD: f64 = 0.8;
/// A same-action, same-page-type fallback match is trusted only above this.
pub const CONTEXT_MATCH_THRESHOLD: f64 = 0.75;

/// Where a solution was learned, used to scope fallback matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub page_type: PageType,
}

/// One learned selector: the mapping from an originally failing selector to
/// the replacement the oracle found, plus the trust bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub id: String,
    pub step_action: StepAction,
    pub original_selector: String,
    pub learned_selector: String,
    pub confidence: f64,
    pub success_count: u32,
    pub failure_count: u32,
    pub page_context: PageContext,
    /// Epoch milliseconds.
    pub learned_at: u64,
    /// Epoch milliseconds.
    pub last_used: u64,
}

/// What a confidence update decided about the entry's future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionFate {
    Keep,
    Discard,
}

impl Solution {
    /// A freshly oracle-discovered solution. Starts at the fixed initial
    /// confidence with one success on the books.
    pub fn learned(
        action: StepAction,
        original_selector: &str,
        learned_selector: &str,
        page_context: PageContext,
    ) -> Self {
        let now = epoch_ms();
        Solution {
            id: solution_id(action, original_selector),
            step_action: action,
            original_selector: original_selector.to_string(),
            learned_selector: learned_selector.to_string(),
            confidence: INITIAL_CONFIDENCE,
            success_count: 1,
            failure_count: 0,
            page_context,
            learned_at: now,
            last_used: now,
        }
    }

    /// Reuse succeeded: bump the counters and raise confidence, capped.
    pub fn record_success(&mut self, now_ms: u64) {
        self.success_count += 1;
        self.confidence = round2((self.confidence + SUCCESS_INCREMENT).min(MAX_CONFIDENCE));
        self.last_used = now_ms;
    }

    /// Reuse failed: lower confidence and report whether the entry should
    /// survive. Anything landing below the discard threshold is deleted by
    /// the caller, never demoted and kept.
    pub fn record_failure(&mut self, now_ms: u64) -> SolutionFate {
        self.failure_count += 1;
        self.confidence = round2((self.confidence - FAILURE_DECREMENT).max(MIN_CONFIDENCE));
        self.last_used = now_ms;
        if self.confidence < DISCARD_THRESHOLD {
            SolutionFate::Discard
        } else {
            SolutionFate::Keep
        }
    }
}

/// Solution identity: the action name joined with the first 12 hex chars of
/// the sha256 of the (substituted, normalized) selector. Explicit so tests
/// can assert exact ids for known inputs.
pub fn solution_id(action: StepAction, selector: &str) -> String {
    let digest = Sha256::digest(selector.as_bytes());
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("{}:{}", action, hex)
}

pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Confidence is stored rounded to two decimals so threshold comparisons
/// stay exact across increments and decrements.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
