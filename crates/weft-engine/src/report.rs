//! Plain-text rendering of run results for the terminal.

use crate::interpreter::{FlowReport, FlowStatus, StepStatus};
use crate::resolver::ResolutionStats;

pub fn format_flow_report(report: &FlowReport) -> String {
    let mut output = String::new();
    let verdict = match report.status {
        FlowStatus::Passed => "PASS",
        FlowStatus::Failed => "FAIL",
        FlowStatus::Pending | FlowStatus::Running => "....",
    };
    output.push_str(&format!(
        "{} {} - {} steps in {}ms\n",
        verdict,
        report.flow_path,
        report.steps.len(),
        report.duration_ms
    ));

    for step in &report.steps {
        let mark = match step.status {
            StepStatus::Passed => "ok",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "FAILED",
        };
        let via = match step.tier {
            Some(tier) => format!(" via {}", tier),
            None => String::new(),
        };
        output.push_str(&format!(
            "  [{}] {} - {}{} ({}ms)\n",
            step.index + 1,
            step.label,
            mark,
            via,
            step.duration_ms
        ));
        if let Some(error) = &step.error {
            output.push_str(&format!("      {}\n", error));
        }
    }

    output.push_str(&format_stats(&report.stats));
    output
}

pub fn format_suite_summary(reports: &[FlowReport]) -> String {
    let passed = reports
        .iter()
        .filter(|r| r.status == FlowStatus::Passed)
        .count();
    let failed = reports.len() - passed;
    let total_ms: u64 = reports.iter().map(|r| r.duration_ms).sum();

    let mut output = String::new();
    output.push_str(&format!(
        "Suite: {} passed, {} failed ({} flows in {}ms)\n",
        passed,
        failed,
        reports.len(),
        total_ms
    ));

    if failed > 0 {
        output.push_str("Failed:\n");
        for report in reports.iter().filter(|r| r.status == FlowStatus::Failed) {
            let at = report
                .failed_step
                .map(|i| format!(" at step {}", i + 1))
                .unwrap_or_default();
            let why = report.error.as_deref().unwrap_or("unknown error");
            output.push_str(&format!("  - {}{}: {}\n", report.flow_path, at, why));
        }
    }

    let mut stats = ResolutionStats::default();
    for report in reports {
        stats.direct_hits += report.stats.direct_hits;
        stats.learned_hits += report.stats.learned_hits;
        stats.oracle_hits += report.stats.oracle_hits;
        stats.failures += report.stats.failures;
        stats.oracle_calls += report.stats.oracle_calls;
        stats.oracle_cost += report.stats.oracle_cost;
    }
    output.push_str(&format_stats(&stats));
    output
}

fn format_stats(stats: &ResolutionStats) -> String {
    format!(
        "Strategies: direct {}, learned {}, oracle {}, failed {}\nOracle: {} calls (${:.2})\n",
        stats.direct_hits,
        stats.learned_hits,
        stats.oracle_hits,
        stats.failures,
        stats.oracle_calls,
        stats.oracle_cost
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::StepReport;
    use crate::resolver::ResolutionTier;
    use weft_common::StepAction;

    fn sample() -> FlowReport {
        FlowReport {
            flow_path: "auth.login".to_string(),
            status: FlowStatus::Failed,
            steps: vec![
                StepReport {
                    index: 0,
                    label: "navigate /login".to_string(),
                    action: StepAction::Navigate,
                    status: StepStatus::Passed,
                    tier: None,
                    duration_ms: 120,
                    error: None,
                },
                StepReport {
                    index: 1,
                    label: "click #login-button".to_string(),
                    action: StepAction::Click,
                    status: StepStatus::Passed,
                    tier: Some(ResolutionTier::Learned),
                    duration_ms: 45,
                    error: None,
                },
                StepReport {
                    index: 2,
                    label: "verify .welcome".to_string(),
                    action: StepAction::Verify,
                    status: StepStatus::Failed,
                    tier: None,
                    duration_ms: 10_000,
                    error: Some("Verification failed on '.welcome': visible".to_string()),
                },
            ],
            duration_ms: 10_165,
            failed_step: Some(2),
            error: Some("Verification failed on '.welcome': visible".to_string()),
            stats: ResolutionStats {
                direct_hits: 0,
                learned_hits: 1,
                oracle_hits: 0,
                failures: 1,
                oracle_calls: 1,
                oracle_cost: 0.01,
            },
        }
    }

    #[test]
    fn flow_report_shows_verdict_tier_and_error() {
        let text = format_flow_report(&sample());
        assert!(text.starts_with("FAIL auth.login"));
        assert!(text.contains("via learned"));
        assert!(text.contains("[3] verify .welcome - FAILED"));
        assert!(text.contains("Verification failed on '.welcome'"));
        assert!(text.contains("Oracle: 1 calls ($0.01)"));
    }

    #[test]
    fn suite_summary_lists_failures() {
        let text = format_suite_summary(&[sample()]);
        assert!(text.contains("Suite: 0 passed, 1 failed"));
        assert!(text.contains("auth.login at step 3"));
    }
}
