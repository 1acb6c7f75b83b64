//! Hit aggregation.
//!
//! The score is a plain sum of resolved hit weights: associative,
//! commutative, no capping, no rule interaction. Reordering the catalog
//! must never change the number a report carries.

use crate::rules::Hit;

/// Non-finite or negative weights contribute nothing. The severity
/// resolver should never produce one, but a weight must not be able to
/// subtract risk either way.
fn safe_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Sum all hit weights into one risk score, rounded to 4 decimal places.
pub fn score_risk(hits: &[Hit]) -> f64 {
    let total: f64 = hits.iter().map(|h| safe_weight(h.weight)).sum();
    (total * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    fn hit(weight: f64) -> Hit {
        Hit {
            rule_id: "TEST_RULE".to_string(),
            severity: Severity::Medium,
            weight,
            reason: "test".to_string(),
            matched: "x".to_string(),
            technique_id: None,
            tags: vec![],
        }
    }

    #[test]
    fn empty_hits_score_zero() {
        assert_eq!(score_risk(&[]), 0.0);
    }

    #[test]
    fn sums_weights() {
        assert_eq!(score_risk(&[hit(0.55), hit(1.75)]), 2.3);
    }

    #[test]
    fn order_does_not_matter() {
        let forward = vec![hit(0.33), hit(0.55), hit(1.75)];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(score_risk(&forward), score_risk(&reversed));
    }

    #[test]
    fn negative_and_non_finite_weights_contribute_zero() {
        assert_eq!(score_risk(&[hit(-5.0)]), 0.0);
        assert_eq!(score_risk(&[hit(f64::NAN)]), 0.0);
        assert_eq!(score_risk(&[hit(f64::INFINITY), hit(0.55)]), 0.55);
    }

    #[test]
    fn rounds_to_four_decimal_places() {
        assert_eq!(score_risk(&[hit(0.10001), hit(0.10002)]), 0.2);
    }
}
