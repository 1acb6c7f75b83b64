//! Built-in rule catalog.
//!
//! Detect-mode rules cover the classic injection families; allowlist-mode
//! format rules are opt-in via `active_rules` and hit when the input does
//! NOT match the expected shape. Catalog order is evaluation order and is
//! preserved in report output.

use std::sync::LazyLock;

use crate::severity::Severity;

use super::{CompiledRule, Rule, RuleMode};

/// Detect-mode rules evaluated by default.
pub static DEFAULT_RULES: &[Rule] = &[
    Rule {
        id: "SQLI_KEYWORD",
        patterns: &[
            r"\bselect\b",
            r"\bunion\b",
            r"\bdrop\b",
            r"\binsert\b",
            r"\bupdate\b",
            r"\bdelete\b",
            r"\bwhere\b",
            r"\bfrom\b",
            r"\btable\b",
            r"\bor\s+1=1\b",
            r"--",
            r"/\*",
            r"\bexec\b",
            r"\bcast\b",
            r"\bconvert\b",
            r"\bchar\b",
            r"\bconcat\b",
            r"\bsubstr\b",
            r"\bmid\b",
            r"\bbenchmark\b",
            r"\bsleep\b",
            r"\bwaitfor\b",
            r"\bpg_sleep\b",
            r"\bpg_terminate_backend\b",
        ],
        default_severity: Severity::High,
        reason: "Potential SQL keywords/operators.",
        technique_id: Some("T1190"),
        tags: &["injection", "sqli"],
        mode: RuleMode::Detect,
    },
    Rule {
        id: "COMMAND_INJECTION",
        patterns: &[
            r"(?:;|&&|\|\|)\s*[a-zA-Z_./-]+",
            r"`[^`]+`",
            r"\$\([^)]*\)",
            r"(?:^|[\s;|&])(?:bash|sh|zsh|cmd|powershell|pwsh|python|perl|ruby|wget|curl|nc|netcat)\b",
            r"(?:^|[\s;|&])(?:cat|type|echo|printf)\b[^\n\r]*(?:>>?|<)\s*\S+",
            r"\x00",
            r"\x1a",
            r"\x1b",
            r"\x7f",
        ],
        default_severity: Severity::High,
        reason: "Shell command chaining/metacharacters.",
        technique_id: Some("T1059"),
        tags: &["command-execution"],
        mode: RuleMode::Detect,
    },
    Rule {
        id: "XSS_PATTERN",
        patterns: &[
            r"<\s*script",
            r"onerror\s*=",
            r"onload\s*=",
            r"javascript:",
            r"<iframe",
            r"<img",
            r"<svg",
            r"<object",
            r"<embed",
            r"<link",
            r"<body",
            r"<style",
            r"<base",
            r"<form",
            r"document\.cookie",
            r"document\.location",
            r"window\.location",
            r"eval\(",
            r"alert\(",
            r#"src\s*=\s*['"]?javascript:"#,
        ],
        default_severity: Severity::Medium,
        reason: "Script/event handler patterns.",
        technique_id: Some("T1059.007"),
        tags: &["script-injection", "xss"],
        mode: RuleMode::Detect,
    },
    Rule {
        id: "PATH_TRAVERSAL",
        patterns: &[
            r"\.\./",
            r"\.\.\\",
            r"%2e%2e%2f",
            r"%2e%2e%5c",
            r"/etc/passwd",
            r"/windows/win.ini",
            r"\bboot\.ini\b",
        ],
        default_severity: Severity::Medium,
        reason: "Traversal indicators.",
        technique_id: Some("T1083"),
        tags: &["path-traversal"],
        mode: RuleMode::Detect,
    },
];

/// Allowlist-mode format rules, selected explicitly via `active_rules`.
pub static FORMAT_RULES: &[Rule] = &[
    Rule {
        id: "CSRF_TOKEN_FORMAT",
        patterns: &[r"^(?:[a-fA-F0-9]{32}|[a-fA-F0-9\-]{36})$"],
        default_severity: Severity::High,
        reason: "CSRF token must be a valid UUID or hex string.",
        technique_id: None,
        tags: &["token-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "INTEGER_ONLY",
        patterns: &[r"^-?\d+$"],
        default_severity: Severity::High,
        reason: "Input must be a valid integer.",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "FLOAT_ONLY",
        patterns: &[r"^-?\d+(\.\d+)?$"],
        default_severity: Severity::High,
        reason: "Input must be a valid float.",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "EMAIL_FORMAT",
        patterns: &[r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$"],
        default_severity: Severity::Medium,
        reason: "Input must be a valid email address.",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "URL_FORMAT",
        patterns: &[r"^(https?|ftp)://[\w\-]+(\.[\w\-]+)+([/?#][^\s]*)?$"],
        default_severity: Severity::Medium,
        reason: "Input must be a valid URL.",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "DATE_ISO8601",
        patterns: &[r"^\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?)?$"],
        default_severity: Severity::Medium,
        reason: "Input must be a valid ISO 8601 date.",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "SAFE_FILE_PATH",
        // Word-character segments joined by single '.' or '/': rejects
        // leading separators and any ".." component without lookaround.
        patterns: &[r"^[\w\-]+(?:[./][\w\-]+)*$"],
        default_severity: Severity::High,
        reason: "File path must be safe (no traversal, only allowed chars, no leading slash).",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
    Rule {
        id: "SAFE_CHARSET",
        patterns: &[r"^[\x20-\x7E]+$"],
        default_severity: Severity::Medium,
        reason: "Input must only contain safe printable characters.",
        technique_id: None,
        tags: &["format-validation"],
        mode: RuleMode::Allowlist,
    },
];

static CATALOG: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    DEFAULT_RULES
        .iter()
        .chain(FORMAT_RULES.iter())
        .copied()
        .map(CompiledRule::compile)
        .collect()
});

/// The full compiled catalog (detect rules first, then format rules).
pub fn catalog() -> &'static [CompiledRule] {
    &CATALOG
}
