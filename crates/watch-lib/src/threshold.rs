//! Threshold evaluation
//!
//! Decides whether a reduced value breaches a [`ThresholdRule`] and renders
//! a message that report and alert layers can reuse verbatim.

use crate::models::{Comparator, ThresholdRule, Verdict};

/// Absolute tolerance for `Comparator::Eq`
pub const EQ_TOLERANCE: f64 = 1e-9;

impl Comparator {
    /// Whether `observed <op> threshold` holds
    pub fn check(&self, observed: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => observed > threshold,
            Comparator::Lt => observed < threshold,
            Comparator::Ge => observed >= threshold,
            Comparator::Le => observed <= threshold,
            Comparator::Eq => approx_eq(observed, threshold),
        }
    }
}

/// Equality within [`EQ_TOLERANCE`], plus a few ULPs so that decimal
/// literals like `5.000000001` still compare equal to `5.0`.
fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= EQ_TOLERANCE + 4.0 * f64::EPSILON * scale
}

/// Compare `observed_value` against `rule` and build the verdict
pub fn evaluate(observed_value: f64, rule: &ThresholdRule) -> Verdict {
    let triggered = rule.comparator.check(observed_value, rule.threshold_value);

    let message = if triggered {
        format!(
            "observed {:.2} {} threshold {:.2}",
            observed_value, rule.comparator, rule.threshold_value
        )
    } else {
        format!(
            "observed {:.2} is not {} threshold {:.2}",
            observed_value, rule.comparator, rule.threshold_value
        )
    };

    Verdict {
        triggered,
        observed_value,
        rule: *rule,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(comparator: Comparator, threshold: f64) -> ThresholdRule {
        ThresholdRule::new(comparator, threshold)
    }

    #[test]
    fn test_strict_boundaries() {
        assert!(!evaluate(80.0, &rule(Comparator::Gt, 80.0)).triggered);
        assert!(evaluate(80.01, &rule(Comparator::Gt, 80.0)).triggered);

        assert!(!evaluate(80.0, &rule(Comparator::Lt, 80.0)).triggered);
        assert!(evaluate(79.99, &rule(Comparator::Lt, 80.0)).triggered);
    }

    #[test]
    fn test_inclusive_boundaries() {
        assert!(evaluate(80.0, &rule(Comparator::Ge, 80.0)).triggered);
        assert!(!evaluate(79.99, &rule(Comparator::Ge, 80.0)).triggered);

        assert!(evaluate(80.0, &rule(Comparator::Le, 80.0)).triggered);
        assert!(!evaluate(80.01, &rule(Comparator::Le, 80.0)).triggered);
    }

    #[test]
    fn test_equality_tolerance() {
        assert!(evaluate(5.000000001, &rule(Comparator::Eq, 5.0)).triggered);
        assert!(evaluate(4.999999999, &rule(Comparator::Eq, 5.0)).triggered);
        assert!(evaluate(0.1 + 0.2, &rule(Comparator::Eq, 0.3)).triggered);
        assert!(!evaluate(5.1, &rule(Comparator::Eq, 5.0)).triggered);
        assert!(!evaluate(5.00001, &rule(Comparator::Eq, 5.0)).triggered);
    }

    #[test]
    fn test_message_format() {
        let verdict = evaluate(87.3, &rule(Comparator::Gt, 80.0));
        assert!(verdict.triggered);
        assert_eq!(verdict.message, "observed 87.30 > threshold 80.00");

        let ok = evaluate(12.0, &rule(Comparator::Ge, 80.0));
        assert!(!ok.triggered);
        assert_eq!(ok.message, "observed 12.00 is not >= threshold 80.00");
    }

    #[test]
    fn test_verdict_carries_rule_and_value() {
        let r = rule(Comparator::Le, 3.5);
        let verdict = evaluate(1.25, &r);
        assert_eq!(verdict.rule, r);
        assert_eq!(verdict.observed_value, 1.25);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let r = rule(Comparator::Gt, 80.0);
        let first = evaluate(82.5, &r);
        let second = evaluate(82.5, &r);
        assert_eq!(first, second);
        assert_eq!(
            first.observed_value.to_bits(),
            second.observed_value.to_bits()
        );
    }

    #[test]
    fn test_nan_never_triggers() {
        for c in [
            Comparator::Gt,
            Comparator::Lt,
            Comparator::Ge,
            Comparator::Le,
            Comparator::Eq,
        ] {
            assert!(!evaluate(f64::NAN, &rule(c, 1.0)).triggered);
        }
    }
}
