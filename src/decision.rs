//! Threshold-based decision engine and escalation.
//!
//! Maps a risk score onto the ordered verdict set `Allow < Warn < Block`.
//! Boundaries are inclusive on the higher-severity side. An external
//! assessor verdict can only raise the decision, never lower it.

use serde::{Deserialize, Serialize};

/// Final verdict for one scan, totally ordered `Allow < Warn < Block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Warn,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Warn => "warn",
            Decision::Block => "block",
        }
    }
}

/// Decision thresholds. Invariant (enforced at config load):
/// `block > warn > 0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub block: f64,
    pub warn: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            block: 1.75,
            warn: 0.55,
        }
    }
}

/// Map a score to its base decision.
///
/// A non-finite score cannot be reasoned about and decides `Block`. If the
/// thresholds somehow arrive inverted despite config validation, the block
/// boundary is taken as the larger of the two so a high score can never
/// land in a lower bucket.
pub fn decide(score: f64, thresholds: &Thresholds) -> Decision {
    if !score.is_finite() {
        return Decision::Block;
    }
    let block_at = thresholds.block.max(thresholds.warn);
    if score >= block_at {
        Decision::Block
    } else if score >= thresholds.warn {
        Decision::Warn
    } else {
        Decision::Allow
    }
}

/// Merge an external assessor verdict into the base decision.
/// Escalation-only: the result is `max(base, verdict)`.
pub fn escalate(base: Decision, verdict: Decision) -> Decision {
    base.max(verdict)
}
