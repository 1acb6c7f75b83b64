//! Rule catalog types and the rule engine.
//!
//! The catalog is a flat, ordered collection of immutable pattern rules;
//! matching is data, not behavior. Evaluation walks the catalog in order
//! and yields at most one [`Hit`] per rule, so a rule matching ten times
//! contributes its weight exactly once and reports stay reproducible.

pub mod catalog;

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::severity::{self, RuleOverride, Severity, SeverityWeights};

pub use catalog::catalog;

/// How a rule's patterns are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    /// Hit when any pattern matches (attack signatures).
    Detect,
    /// Hit when no pattern matches (format validation, opt-in).
    Allowlist,
}

/// One immutable pattern rule.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Rule {
    pub id: &'static str,
    pub patterns: &'static [&'static str],
    pub default_severity: Severity,
    pub reason: &'static str,
    /// Optional MITRE ATT&CK technique annotation for explainability.
    pub technique_id: Option<&'static str>,
    pub tags: &'static [&'static str],
    pub mode: RuleMode,
}

/// A rule with its patterns compiled. Patterns that fail to compile are
/// dropped and counted; a rule left with no usable pattern is skipped at
/// scan time with an error entry rather than aborting the scan.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    regexes: Vec<(Regex, &'static str)>,
    invalid_patterns: usize,
}

impl CompiledRule {
    pub fn compile(rule: Rule) -> Self {
        let mut regexes = Vec::with_capacity(rule.patterns.len());
        let mut invalid_patterns = 0;
        for pattern in rule.patterns {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => regexes.push((re, *pattern)),
                Err(_) => invalid_patterns += 1,
            }
        }
        Self {
            rule,
            regexes,
            invalid_patterns,
        }
    }

    /// Load-time strict check: any malformed pattern is a config error.
    pub fn verify(&self) -> Result<(), String> {
        if self.invalid_patterns > 0 {
            return Err(format!(
                "rule {} has {} malformed pattern(s)",
                self.rule.id, self.invalid_patterns
            ));
        }
        Ok(())
    }

    /// Source text of the first pattern matching `text`, if any.
    fn first_match(&self, text: &str) -> Option<&'static str> {
        self.regexes
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, pattern)| *pattern)
    }
}

/// One rule's positive match against one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub rule_id: String,
    pub severity: Severity,
    pub weight: f64,
    pub reason: String,
    pub matched: String,
    pub technique_id: Option<String>,
    pub tags: Vec<String>,
}

/// Output of one catalog evaluation: ordered hits plus non-fatal errors
/// (skipped rules, rejected overrides, unknown rule selections).
#[derive(Debug, Default)]
pub struct Evaluation {
    pub hits: Vec<Hit>,
    pub errors: Vec<String>,
}

fn make_hit(
    rule_id: &str,
    severity: Severity,
    reason: &str,
    matched: String,
    technique_id: Option<&str>,
    tags: &[&str],
    weights: &SeverityWeights,
) -> Hit {
    Hit {
        rule_id: rule_id.to_string(),
        severity,
        weight: weights.weight_for(severity),
        reason: reason.to_string(),
        matched,
        technique_id: technique_id.map(str::to_string),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Evaluate the catalog against one normalized input.
///
/// When `active_rules` is `None` the default detect-mode catalog runs,
/// followed by the heuristic checks. An explicit selection runs exactly the
/// named rules (including allowlist format rules) and skips the heuristics.
pub fn evaluate(
    text: &str,
    compiled: &[CompiledRule],
    weights: &SeverityWeights,
    overrides: &HashMap<String, RuleOverride>,
    active_rules: Option<&[String]>,
) -> Evaluation {
    let mut eval = Evaluation::default();

    let selected: Vec<&CompiledRule> = match active_rules {
        None => compiled
            .iter()
            .filter(|c| c.rule.mode == RuleMode::Detect)
            .collect(),
        Some(names) => {
            let mut rules = Vec::with_capacity(names.len());
            for name in names {
                match compiled.iter().find(|c| c.rule.id == name) {
                    Some(rule) => rules.push(rule),
                    None => eval
                        .errors
                        .push(format!("unknown rule {:?} in active_rules; skipped", name)),
                }
            }
            rules
        }
    };

    for compiled_rule in selected {
        let rule = &compiled_rule.rule;
        if compiled_rule.regexes.is_empty() && !rule.patterns.is_empty() {
            eval.errors.push(format!(
                "rule {} skipped for this scan: no valid patterns",
                rule.id
            ));
            continue;
        }

        let resolved =
            severity::resolve(rule.id, rule.default_severity, rule.reason, overrides);
        if let Some(err) = resolved.error {
            eval.errors.push(err);
        }

        let matched = compiled_rule.first_match(text);
        let hit = match (rule.mode, matched) {
            (RuleMode::Detect, Some(pattern)) => Some(make_hit(
                rule.id,
                resolved.severity,
                &resolved.reason,
                pattern.to_string(),
                rule.technique_id,
                rule.tags,
                weights,
            )),
            (RuleMode::Allowlist, None) => Some(make_hit(
                rule.id,
                resolved.severity,
                &resolved.reason,
                "<no allowlist pattern match>".to_string(),
                rule.technique_id,
                rule.tags,
                weights,
            )),
            _ => None,
        };
        if let Some(hit) = hit {
            debug!(rule = rule.id, severity = hit.severity.as_str(), "rule hit");
            eval.hits.push(hit);
        }
    }

    if active_rules.is_none() {
        heuristic_hits(text, weights, &mut eval.hits);
    }
    eval
}

// ---------------------------------------------------------------------------
// Heuristic checks (default catalog only)
// ---------------------------------------------------------------------------

const LENGTH_ANOMALY_CHARS: usize = 5000;
const SPECIAL_CHAR_DENSITY_LIMIT: f64 = 0.3;
const REPETITION_TOKENS: [&str; 5] = ["../", "<script", "or 1=1", "\\x", "%"];
const REPETITION_LIMIT: usize = 3;

fn heuristic_hits(text: &str, weights: &SeverityWeights, hits: &mut Vec<Hit>) {
    let char_count = text.chars().count();
    if char_count > LENGTH_ANOMALY_CHARS {
        hits.push(make_hit(
            "LENGTH_ANOMALY",
            Severity::Medium,
            "Input length is unusually large.",
            format!("length={char_count}"),
            None,
            &["resource-abuse"],
            weights,
        ));
    }

    if char_count > 0 {
        let special = text
            .chars()
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .count();
        let density = special as f64 / char_count as f64;
        if density > SPECIAL_CHAR_DENSITY_LIMIT {
            hits.push(make_hit(
                "SPECIAL_CHAR_DENSITY",
                Severity::Medium,
                "High special-character density can indicate obfuscation.",
                format!("density={density:.2}"),
                Some("T1027"),
                &["obfuscation"],
                weights,
            ));
        }
    }

    for token in REPETITION_TOKENS {
        let count = text.matches(token).count();
        if count >= REPETITION_LIMIT {
            hits.push(make_hit(
                "REPETITION_PATTERN",
                Severity::Low,
                "Suspicious pattern repetition detected.",
                format!("{token} repeated {count} times"),
                Some("T1027"),
                &["obfuscation"],
                weights,
            ));
            break;
        }
    }
}
