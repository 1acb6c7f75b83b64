//! Report assembly.
//!
//! The report is the sole output artifact of a scan: every hit, weight,
//! error, and escalation that fed the decision is recorded so a human can
//! replay the verdict from the record alone. Field names are stable for
//! downstream tooling; treat the serialized shape as a wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::decision::{self, Decision};
use crate::rules::Hit;

/// Verdict returned by the external assessor after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiVerdict {
    Allow,
    Warn,
    Block,
    /// The response was malformed, timed out, or failed validation. Never
    /// affects the decision; recorded for the audit trail only.
    InvalidResponse,
}

impl AiVerdict {
    /// The decision this verdict escalates toward, if it is a valid one.
    pub fn as_decision(&self) -> Option<Decision> {
        match self {
            AiVerdict::Allow => Some(Decision::Allow),
            AiVerdict::Warn => Some(Decision::Warn),
            AiVerdict::Block => Some(Decision::Block),
            AiVerdict::InvalidResponse => None,
        }
    }
}

/// Validated output of the external assessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiAssessment {
    pub verdict: AiVerdict,
    /// Clamped to [0, 1].
    pub confidence: f64,
    pub raw_reason: String,
}

impl AiAssessment {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            verdict: AiVerdict::InvalidResponse,
            confidence: 0.0,
            raw_reason: reason.into(),
        }
    }
}

/// Digest of the raw input; the raw text itself never enters the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDigest {
    pub sha256: String,
    pub length: usize,
}

/// Human-oriented summary of how the decision came about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub reasons: Vec<String>,
}

/// The explainable decision record. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub input: InputDigest,
    pub normalized_length: usize,
    pub hits: Vec<Hit>,
    pub score: f64,
    pub decision: Decision,
    pub ai_assessment: Option<AiAssessment>,
    pub errors: Vec<String>,
    pub explanation: Explanation,
}

impl Report {
    /// Record an assessment and apply the escalation-only contract:
    /// a valid verdict raises the decision to `max(base, verdict)`; an
    /// invalid response leaves the decision untouched and adds an error
    /// entry.
    pub fn apply_assessment(&mut self, assessment: AiAssessment) {
        match assessment.verdict.as_decision() {
            Some(verdict) => {
                let escalated = decision::escalate(self.decision, verdict);
                if escalated > self.decision {
                    self.decision = escalated;
                    self.explanation.summary = format!(
                        "{} Escalated to '{}' by external assessor.",
                        self.explanation.summary,
                        escalated.as_str()
                    );
                }
            }
            None => {
                self.errors.push(format!(
                    "ai assessment invalid_response: {}",
                    assessment.raw_reason
                ));
            }
        }
        self.ai_assessment = Some(assessment);
    }
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Assemble a report from the scan's computed pieces.
pub fn build_report(
    raw_text: &str,
    normalized: &str,
    hits: Vec<Hit>,
    score: f64,
    decision: Decision,
    errors: Vec<String>,
) -> Report {
    let reasons: Vec<String> = hits.iter().map(|h| h.reason.clone()).collect();
    let summary = format!(
        "Decision '{}' from score {} based on {} hit(s).",
        decision.as_str(),
        score,
        hits.len()
    );
    Report {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        input: InputDigest {
            sha256: sha256_hex(raw_text),
            length: raw_text.chars().count(),
        },
        normalized_length: normalized.chars().count(),
        hits,
        score,
        decision,
        ai_assessment: None,
        errors,
        explanation: Explanation { summary, reasons },
    }
}

/// Sentinel score carried by fail-safe reports; well above any threshold.
pub const FAILSAFE_SCORE: f64 = 999.0;

/// The safe-block artifact produced when the pipeline faults: same shape
/// as a normal report, decision forced to `block`, with a sanitized
/// description of the failure category instead of raw fault details.
pub fn failsafe_report(category: &str, description: String) -> Report {
    Report {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        input: InputDigest {
            sha256: "unavailable".to_string(),
            length: 0,
        },
        normalized_length: 0,
        hits: Vec::new(),
        score: FAILSAFE_SCORE,
        decision: Decision::Block,
        ai_assessment: None,
        errors: vec![description],
        explanation: Explanation {
            summary: format!("Fail-safe block due to {category} error."),
            reasons: Vec::new(),
        },
    }
}
