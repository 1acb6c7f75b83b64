//! Typed gateway configuration.
//!
//! Loaded once per invocation from a JSON/JSON5 file (missing fields fall
//! back to defaults field by field) and validated before the pipeline ever
//! runs. After load the structure is read-only; nothing in the scan path
//! mutates it, so it can be shared freely across parallel scans.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decision::Thresholds;
use crate::error::GatewayError;
use crate::severity::{RuleOverride, SeverityWeights};

/// Environment variables consulted when `ai.api_key` is not configured.
const API_KEY_ENV_VARS: [&str; 2] = ["PALISADE_AI_API_KEY", "OPENAI_API_KEY"];

/// External assessor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider: String,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_s: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai-compatible".to_string(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_s: 30,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub decision_thresholds: Thresholds,
    pub severity_weights: SeverityWeights,
    pub max_input_chars: usize,
    pub log_path: PathBuf,
    pub db_path: PathBuf,
    pub rule_overrides: HashMap<String, RuleOverride>,
    /// Legacy alias for `rule_overrides`; merged underneath it at scan
    /// time, with `rule_overrides` winning on conflicts.
    pub mitre_overrides: HashMap<String, RuleOverride>,
    /// Explicit rule selection (including allowlist format rules). `None`
    /// runs the default detect catalog plus heuristics.
    pub active_rules: Option<Vec<String>>,
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decision_thresholds: Thresholds::default(),
            severity_weights: SeverityWeights::default(),
            max_input_chars: 100_000,
            log_path: PathBuf::from("logs/audit.jsonl"),
            db_path: PathBuf::from("logs/gateway.db"),
            rule_overrides: HashMap::new(),
            mitre_overrides: HashMap::new(),
            active_rules: None,
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Validate invariants the pipeline relies on. Any violation is a
    /// load-time `ConfigError`; nothing here is silently repaired.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let w = &self.severity_weights;
        if w.low <= 0.0 || !w.low.is_finite() {
            return Err(config_err("severity_weights.low must be > 0"));
        }
        if !(w.low < w.medium && w.medium < w.high) || !w.medium.is_finite() || !w.high.is_finite()
        {
            return Err(config_err(
                "severity_weights must be strictly ordered low < medium < high",
            ));
        }

        let t = &self.decision_thresholds;
        if !t.warn.is_finite() || !t.block.is_finite() || t.warn <= 0.0 {
            return Err(config_err("decision_thresholds.warn must be > 0"));
        }
        if t.block <= t.warn {
            return Err(config_err(
                "decision_thresholds.block must be greater than decision_thresholds.warn",
            ));
        }

        if self.max_input_chars == 0 {
            return Err(config_err("max_input_chars must be > 0"));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(config_err("log_path must be a non-empty path"));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(config_err("db_path must be a non-empty path"));
        }

        if self.ai.timeout_s == 0 || self.ai.timeout_s > 120 {
            return Err(config_err("ai.timeout_s must be between 1 and 120"));
        }
        if self.ai.enabled {
            if self.ai.endpoint.trim().is_empty() {
                return Err(config_err("ai.endpoint is required when ai.enabled is true"));
            }
            if self.ai.model.trim().is_empty() {
                return Err(config_err("ai.model is required when ai.enabled is true"));
            }
            if self.ai.api_key.trim().is_empty() {
                return Err(config_err("ai.api_key is required when ai.enabled is true"));
            }
        }
        Ok(())
    }

    /// Merge the legacy `mitre_overrides` table beneath `rule_overrides`.
    /// A rule id defined differently in both tables is reported as a
    /// warning (surfaced in the scan's error list), never silently
    /// deduplicated.
    pub fn merged_overrides(&self) -> (HashMap<String, RuleOverride>, Vec<String>) {
        let mut merged = self.mitre_overrides.clone();
        let mut warnings = Vec::new();
        for (rule_id, entry) in &self.rule_overrides {
            if let Some(previous) = merged.get(rule_id) {
                if previous != entry {
                    warnings.push(format!(
                        "conflicting override definitions for rule {rule_id}; rule_overrides entry wins"
                    ));
                }
            }
            merged.insert(rule_id.clone(), entry.clone());
        }
        (merged, warnings)
    }

    fn resolve_api_key_from_env(&mut self) {
        if !self.ai.api_key.trim().is_empty() {
            return;
        }
        for name in API_KEY_ENV_VARS {
            if let Ok(value) = std::env::var(name) {
                let value = value.trim();
                if !value.is_empty() {
                    self.ai.api_key = value.to_string();
                    return;
                }
            }
        }
    }

    /// Serialized view with secrets redacted, for `config show`.
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(key) = value.pointer_mut("/ai/api_key") {
            if key.as_str().is_some_and(|k| !k.is_empty()) {
                *key = serde_json::Value::String("***REDACTED***".to_string());
            }
        }
        value
    }
}

fn config_err(msg: &str) -> GatewayError {
    GatewayError::Config(msg.to_string())
}

/// Load configuration from an optional JSON/JSON5 file, fill the AI key
/// from the environment if absent, and validate.
pub fn load_config(path: Option<&Path>) -> Result<Config, GatewayError> {
    let mut config = match path {
        None => Config::default(),
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                GatewayError::Config(format!("cannot read config {}: {e}", path.display()))
            })?;
            json5::from_str(&raw).map_err(|e| {
                GatewayError::Config(format!("cannot parse config {}: {e}", path.display()))
            })?
        }
    };
    config.resolve_api_key_from_env();
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn unordered_weights_are_rejected() {
        let mut cfg = Config::default();
        cfg.severity_weights.medium = cfg.severity_weights.high + 1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("strictly ordered"));
    }

    #[test]
    fn equal_weights_are_rejected() {
        let mut cfg = Config::default();
        cfg.severity_weights.medium = cfg.severity_weights.low;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_or_negative_weight_is_rejected() {
        let mut cfg = Config::default();
        cfg.severity_weights.low = 0.0;
        assert!(cfg.validate().is_err());
        cfg.severity_weights.low = -0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn threshold_ordering_is_enforced() {
        let mut cfg = Config::default();
        cfg.decision_thresholds.warn = cfg.decision_thresholds.block;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.decision_thresholds.warn = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ai_timeout_bounds_are_enforced() {
        let mut cfg = Config::default();
        cfg.ai.timeout_s = 0;
        assert!(cfg.validate().is_err());
        cfg.ai.timeout_s = 121;
        assert!(cfg.validate().is_err());
        cfg.ai.timeout_s = 120;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn enabled_ai_requires_endpoint_model_and_key() {
        let mut cfg = Config::default();
        cfg.ai.enabled = true;
        cfg.ai.endpoint = "https://api.example.com/v1/chat".to_string();
        cfg.ai.model = "test-model".to_string();
        cfg.ai.api_key = String::new();
        assert!(cfg.validate().is_err());
        cfg.ai.api_key = "k".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "max_input_chars": 500 }}"#).unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.max_input_chars, 500);
        assert_eq!(cfg.decision_thresholds.block, 1.75);
        assert_eq!(cfg.log_path, PathBuf::from("logs/audit.jsonl"));
    }

    #[test]
    fn json5_syntax_is_accepted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{{ decision_thresholds: {{ warn: 0.4, block: 2.0 }}, // tuned\n }}"
        )
        .unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.decision_thresholds.warn, 0.4);
        assert_eq!(cfg.decision_thresholds.block, 2.0);
    }

    #[test]
    fn invalid_file_contents_are_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not even close to json").unwrap();
        let err = load_config(Some(file.path())).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_config(Some(Path::new("/no/such/palisade.json5"))).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn merged_overrides_prefers_rule_overrides_and_warns_on_conflict() {
        let mut cfg = Config::default();
        cfg.mitre_overrides.insert(
            "SQLI_KEYWORD".to_string(),
            RuleOverride {
                severity: Some("low".into()),
                description: None,
            },
        );
        cfg.rule_overrides.insert(
            "SQLI_KEYWORD".to_string(),
            RuleOverride {
                severity: Some("high".into()),
                description: None,
            },
        );
        let (merged, warnings) = cfg.merged_overrides();
        assert_eq!(
            merged["SQLI_KEYWORD"].severity.as_deref(),
            Some("high")
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("SQLI_KEYWORD"));
    }

    #[test]
    fn identical_duplicate_override_does_not_warn() {
        let entry = RuleOverride {
            severity: Some("high".into()),
            description: None,
        };
        let mut cfg = Config::default();
        cfg.mitre_overrides
            .insert("XSS_PATTERN".to_string(), entry.clone());
        cfg.rule_overrides.insert("XSS_PATTERN".to_string(), entry);
        let (_, warnings) = cfg.merged_overrides();
        assert!(warnings.is_empty());
    }

    #[test]
    fn redacted_view_hides_api_key() {
        let mut cfg = Config::default();
        cfg.ai.api_key = "sk-verysecret".to_string();
        let value = cfg.redacted();
        assert_eq!(value["ai"]["api_key"], "***REDACTED***");
    }
}
