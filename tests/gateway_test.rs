//! End-to-end gateway properties: the scan pipeline, escalation contract,
//! and fail-safe guarantees exercised through the public API.

use std::collections::HashMap;

use palisade::audit::AuditLog;
use palisade::config::{load_config, Config};
use palisade::decision::{decide, escalate, Decision, Thresholds};
use palisade::pipeline::run_scan;
use palisade::report::{build_report, AiAssessment, AiVerdict};
use palisade::rules::{catalog, evaluate};
use palisade::scorer::score_risk;
use palisade::severity::SeverityWeights;

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.log_path = dir.join("audit.jsonl");
    config.db_path = dir.join("gateway.db");
    config
}

async fn scan(text: &str, config: &Config) -> palisade::pipeline::ScanOutcome {
    let audit = AuditLog::new(config);
    run_scan(text, config, &audit).await
}

// ==================== Worked examples ====================

#[tokio::test]
async fn sqli_input_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = scan("SELECT * FROM users", &config_in(dir.path())).await;
    let report = outcome.report();
    assert_eq!(report.score, 1.75);
    assert_eq!(report.decision, Decision::Block);
}

#[tokio::test]
async fn benign_input_allows() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = scan("hello world", &config_in(dir.path())).await;
    let report = outcome.report();
    assert_eq!(report.score, 0.0);
    assert_eq!(report.decision, Decision::Allow);
    assert!(report.hits.is_empty());
}

#[tokio::test]
async fn medium_hit_warns_on_inclusive_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = scan("onload = run()", &config_in(dir.path())).await;
    let report = outcome.report();
    assert_eq!(report.score, 0.55);
    assert_eq!(report.decision, Decision::Warn);
}

// ==================== Deterministic scoring ====================

#[test]
fn score_is_invariant_to_hit_order() {
    let weights = SeverityWeights::default();
    let eval = evaluate(
        "select 1; cat /etc/passwd ../ <script>",
        catalog(),
        &weights,
        &HashMap::new(),
        None,
    );
    assert!(eval.hits.len() >= 3);
    let forward = score_risk(&eval.hits);
    let mut reversed = eval.hits.clone();
    reversed.reverse();
    assert_eq!(forward, score_risk(&reversed));
}

#[test]
fn decision_is_monotonic_in_score() {
    let thresholds = Thresholds::default();
    let mut last = Decision::Allow;
    for step in 0..1000 {
        let d = decide(step as f64 * 0.005, &thresholds);
        assert!(d >= last);
        last = d;
    }
}

// ==================== Escalation contract ====================

#[test]
fn ai_verdict_is_max_merge_over_all_pairs() {
    let all = [Decision::Allow, Decision::Warn, Decision::Block];
    for base in all {
        for verdict in all {
            let merged = escalate(base, verdict);
            assert!(merged >= base, "ai must never lower a decision");
            assert_eq!(merged, base.max(verdict));
        }
    }
}

#[test]
fn ai_warn_raises_allow_but_ai_allow_never_lowers_block() {
    let mut report = build_report("x", "x", vec![], 0.0, Decision::Allow, vec![]);
    report.apply_assessment(AiAssessment {
        verdict: AiVerdict::Warn,
        confidence: 0.8,
        raw_reason: "unsure".into(),
    });
    assert_eq!(report.decision, Decision::Warn);

    let mut report = build_report("x", "x", vec![], 2.0, Decision::Block, vec![]);
    report.apply_assessment(AiAssessment {
        verdict: AiVerdict::Allow,
        confidence: 1.0,
        raw_reason: "fine".into(),
    });
    assert_eq!(report.decision, Decision::Block);
}

#[test]
fn invalid_ai_response_never_changes_base_decision() {
    for base in [Decision::Allow, Decision::Warn, Decision::Block] {
        let mut report = build_report("x", "x", vec![], 0.0, base, vec![]);
        report.apply_assessment(AiAssessment::invalid("timeout"));
        assert_eq!(report.decision, base);
        assert!(!report.errors.is_empty());
    }
}

// ==================== Fail-safe guarantees ====================

#[tokio::test]
async fn oversized_input_yields_structured_block() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.max_input_chars = 5;
    let outcome = scan("definitely longer than five", &config).await;
    assert!(outcome.is_failed());
    let report = outcome.report();
    assert_eq!(report.decision, Decision::Block);
    assert!(!report.errors.is_empty());
    // the artifact is still fully serializable for downstream tooling
    let value = serde_json::to_value(report).unwrap();
    assert_eq!(value["decision"], "block");
    assert!(value["errors"].as_array().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn logging_failure_keeps_verdict_and_records_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.log_path = dir.path().to_path_buf(); // collides with a directory
    let outcome = scan("SELECT * FROM users", &config).await;
    assert!(!outcome.is_failed());
    let report = outcome.report();
    assert_eq!(report.decision, Decision::Block);
    assert!(report.errors.iter().any(|e| e.contains("persistence")));
}

#[test]
fn malformed_config_is_rejected_at_load() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "severity_weights": {{ "low": 2.0, "medium": 1.0, "high": 0.5 }} }}"#
    )
    .unwrap();
    let err = load_config(Some(file.path())).unwrap_err();
    assert_eq!(err.category(), "config");
}

// ==================== Audit trail ====================

#[tokio::test]
async fn history_returns_scans_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let audit = AuditLog::new(&config);

    run_scan("hello world", &config, &audit).await;
    run_scan("SELECT * FROM users", &config, &audit).await;

    let rows = audit.fetch_recent(10).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].decision, "block");
    assert_eq!(rows[1].decision, "allow");
}

#[tokio::test]
async fn audit_log_lines_are_self_contained_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let audit = AuditLog::new(&config);
    run_scan("SELECT * FROM users", &config, &audit).await;

    let log = std::fs::read_to_string(dir.path().join("audit.jsonl")).unwrap();
    let line: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(line["decision"], "block");
    assert_eq!(line["hits"][0]["rule_id"], "SQLI_KEYWORD");
    assert_eq!(line["hits"][0]["severity"], "high");
    assert_eq!(line["hits"][0]["technique_id"], "T1190");
    assert!(line["explanation"]["summary"].as_str().is_some());
}
