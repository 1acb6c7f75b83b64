//! Text normalization.
//!
//! Pure, stateless transform applied to raw input before rule evaluation:
//! NFKC fold, zero-width character removal, newline normalization,
//! horizontal whitespace collapse, per-line trim, lowercase. Attackers lean
//! on unicode confusables and whitespace padding to slip past keyword
//! patterns; the catalog only ever sees the normalized form.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());

const ZERO_WIDTH: [char; 5] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

/// Normalize raw input text for rule evaluation.
pub fn normalize_text(raw: &str) -> String {
    let folded: String = raw
        .nfkc()
        .filter(|c| !ZERO_WIDTH.contains(c))
        .collect();
    let unified = folded.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WS.replace_all(&unified, " ");
    let trimmed: String = collapsed
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    trimmed.trim().to_lowercase()
}
