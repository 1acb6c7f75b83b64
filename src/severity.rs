//! Severity levels, weights, and override resolution.
//!
//! The override table is untrusted config input. A misspelled or wrongly
//! typed override must fall back to the rule's default severity and be
//! recorded as an error; it must never resolve to a zero weight or abort
//! the scan. A bypass here defeats the whole gateway.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Severity label attached to a rule, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse an untrusted severity label. Trims and lowercases; anything
    /// outside `{low, medium, high}` is rejected.
    pub fn parse(label: &str) -> Option<Severity> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Numeric weight for each severity level.
///
/// Invariant (enforced at config load): all weights > 0 and strictly
/// ordered `low < medium < high`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            low: 0.33,
            medium: 0.55,
            high: 1.75,
        }
    }
}

impl SeverityWeights {
    pub fn weight_for(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
        }
    }
}

/// One entry of the `rule_overrides` config table, keyed by rule id.
/// Both fields are untrusted and validated at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Effective severity and reason for one rule after overrides are applied.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub severity: Severity,
    pub reason: String,
    /// Set when an override was present but failed validation.
    pub error: Option<String>,
}

/// Resolve the effective severity label and reason text for a rule.
///
/// A valid override replaces the default severity; unlike the AI verdict,
/// the operator-supplied table may raise or lower it. An invalid override
/// keeps the default and reports the rejection.
pub fn resolve(
    rule_id: &str,
    default_severity: Severity,
    default_reason: &str,
    overrides: &HashMap<String, RuleOverride>,
) -> Resolved {
    let Some(entry) = overrides.get(rule_id) else {
        return Resolved {
            severity: default_severity,
            reason: default_reason.to_string(),
            error: None,
        };
    };

    let mut error = None;
    let severity = match &entry.severity {
        None => default_severity,
        Some(label) => match Severity::parse(label) {
            Some(sev) => sev,
            None => {
                error = Some(format!(
                    "invalid severity override {:?} for rule {}; using default {}",
                    label,
                    rule_id,
                    default_severity.as_str()
                ));
                default_severity
            }
        },
    };

    let reason = entry
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(default_reason)
        .to_string();

    Resolved {
        severity,
        reason,
        error,
    }
}
