//! The scan pipeline and its fail-safe wrapper.
//!
//! Control flow: normalize → rule engine → scorer → decision engine
//! (± external escalation) → report → persistence. The wrapper encloses
//! every step that can fail; its two terminal outcomes are a completed
//! report or a forced safe-block report. The caller always gets a
//! structured, parseable decision artifact, never a raw fault.

use tracing::{error, info, warn};

use crate::ai::{AiAssessor, AiOutcome};
use crate::audit::AuditLog;
use crate::config::Config;
use crate::decision;
use crate::error::GatewayError;
use crate::normalizer::normalize_text;
use crate::report::{self, AiAssessment, Report};
use crate::rules;
use crate::scorer;

/// Terminal state of one wrapped scan.
#[derive(Debug)]
pub enum ScanOutcome {
    /// Pipeline ran to completion (non-fatal errors may still be recorded
    /// in the report).
    Completed(Report),
    /// Pipeline faulted; the report is a forced safe block.
    Failed(Report),
}

impl ScanOutcome {
    pub fn report(&self) -> &Report {
        match self {
            ScanOutcome::Completed(report) | ScanOutcome::Failed(report) => report,
        }
    }

    pub fn into_report(self) -> Report {
        match self {
            ScanOutcome::Completed(report) | ScanOutcome::Failed(report) => report,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScanOutcome::Failed(_))
    }
}

/// Run one scan under the fail-safe wrapper.
///
/// Single attempt, no retries: this is a safety net, not a resilience
/// layer.
pub async fn run_scan(raw_text: &str, config: &Config, audit: &AuditLog) -> ScanOutcome {
    match scan(raw_text, config, audit).await {
        Ok(report) => ScanOutcome::Completed(report),
        Err(err) => {
            error!(category = err.category(), "scan faulted; emitting fail-safe block");
            let report = report::failsafe_report(err.category(), err.sanitized());
            // Best effort: the fail-safe artifact goes to the audit trail
            // too, but a second fault here must not escape the wrapper.
            if audit.append_jsonl(&report).is_err() {
                warn!("could not persist fail-safe report");
            }
            let _ = audit.save_decision(&report);
            ScanOutcome::Failed(report)
        }
    }
}

async fn scan(raw_text: &str, config: &Config, audit: &AuditLog) -> Result<Report, GatewayError> {
    let char_count = raw_text.chars().count();
    if char_count > config.max_input_chars {
        return Err(GatewayError::Input(format!(
            "input exceeds max_input_chars={}",
            config.max_input_chars
        )));
    }

    let normalized = normalize_text(raw_text);
    let (overrides, mut errors) = config.merged_overrides();
    let evaluation = rules::evaluate(
        &normalized,
        rules::catalog(),
        &config.severity_weights,
        &overrides,
        config.active_rules.as_deref(),
    );
    errors.extend(evaluation.errors);

    let score = scorer::score_risk(&evaluation.hits);
    let base = decision::decide(score, &config.decision_thresholds);
    let mut report = report::build_report(raw_text, &normalized, evaluation.hits, score, base, errors);

    if config.ai.enabled {
        match AiAssessor::new(&config.ai) {
            Ok(assessor) => match assessor.assess(raw_text, &report).await {
                AiOutcome::Skipped(None) => {}
                AiOutcome::Skipped(Some(reason)) => {
                    report.errors.push(format!("ai assessment skipped: {reason}"));
                }
                AiOutcome::Completed(assessment) => report.apply_assessment(assessment),
            },
            Err(err) => report.apply_assessment(AiAssessment::invalid(err.sanitized())),
        }
    }

    // Persistence runs after the verdict is final. A failure here is
    // recorded alongside the decision; it never invalidates it.
    if let Err(err) = audit
        .append_jsonl(&report)
        .and_then(|()| audit.save_decision(&report))
    {
        warn!(category = err.category(), "could not persist report");
        report.errors.push(err.sanitized());
    }

    info!(
        decision = report.decision.as_str(),
        score = report.score,
        hits = report.hits.len(),
        "scan complete"
    );
    Ok(report)
}
