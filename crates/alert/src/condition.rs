//! Threshold condition evaluation.
//!
//! Pure comparison of a sampled metric value against a rule's threshold.
//! No side effects; the operator enum makes an invalid operator
//! unrepresentable.

use labwatch_core::Operator;

/// Evaluate a threshold condition.
///
/// `equal_to` is exact f64 equality. Metrics that are conceptually
/// equal must be pre-rounded by the collector; nothing is rounded
/// here.
pub fn evaluate(operator: Operator, sample: f64, threshold: f64) -> bool {
    match operator {
        Operator::GreaterThan => sample > threshold,
        Operator::LessThan => sample < threshold,
        Operator::EqualTo => sample == threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_than() {
        assert!(evaluate(Operator::GreaterThan, 95.0, 90.0));
        assert!(!evaluate(Operator::GreaterThan, 90.0, 90.0));
        assert!(!evaluate(Operator::GreaterThan, 50.0, 90.0));
    }

    #[test]
    fn less_than() {
        assert!(evaluate(Operator::LessThan, 5.0, 10.0));
        assert!(!evaluate(Operator::LessThan, 10.0, 10.0));
        assert!(!evaluate(Operator::LessThan, 15.0, 10.0));
    }

    #[test]
    fn equal_to_is_exact() {
        assert!(evaluate(Operator::EqualTo, 42.0, 42.0));
        assert!(!evaluate(Operator::EqualTo, 42.0000001, 42.0));
        // No implicit epsilon: near-equality does not match.
        assert!(!evaluate(Operator::EqualTo, 0.1 + 0.2, 0.3));
    }

    #[test]
    fn negative_thresholds() {
        assert!(evaluate(Operator::LessThan, -5.0, 0.0));
        assert!(evaluate(Operator::GreaterThan, 0.0, -5.0));
    }
}
