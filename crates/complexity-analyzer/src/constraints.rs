use analysis_core::{Constraint, ConstraintOperator, ConstraintType, MetricValues};

use crate::scorer::{MAX_LEVEL, MIN_LEVEL};

/// Checks metric values against a constraint set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintEngine;

impl ConstraintEngine {
    pub fn new() -> Self {
        Self
    }

    /// Returns whether every hard constraint holds, plus one message per
    /// violation (hard violations first). Constraints whose metric is
    /// absent are skipped.
    pub fn evaluate(&self, constraints: &[Constraint], values: &MetricValues) -> (bool, Vec<String>) {
        let mut hard = Vec::new();
        let mut soft = Vec::new();

        for constraint in constraints {
            let Some(value) = values.get(constraint.constraint_type.metric_key()) else {
                continue;
            };
            let operator = constraint.effective_operator();
            if operator.apply(value, constraint.value) {
                continue;
            }

            let message = format!(
                "{} violated: {} = {:.4}, required {} {:.4}",
                constraint.constraint_type,
                constraint.constraint_type.metric_key().as_str(),
                value,
                operator,
                constraint.value
            );
            if constraint.is_hard {
                hard.push(format!("[HARD] {message}"));
            } else {
                soft.push(format!("[SOFT] {message}"));
            }
        }

        let satisfied = hard.is_empty();
        hard.extend(soft);
        (satisfied, hard)
    }

    /// Weighted partial-credit satisfaction in [0, 100].
    pub fn score(&self, constraints: &[Constraint], values: &MetricValues) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for constraint in constraints {
            let Some(value) = values.get(constraint.constraint_type.metric_key()) else {
                continue;
            };
            let weight = if constraint.weight > 0.0 { constraint.weight } else { 1.0 };
            weighted += weight * credit(constraint.effective_operator(), value, constraint.value);
            total_weight += weight;
        }

        if total_weight > 0.0 {
            (weighted / total_weight).clamp(0.0, 100.0)
        } else {
            100.0
        }
    }
}

fn credit(operator: ConstraintOperator, value: f64, target: f64) -> f64 {
    if operator.apply(value, target) {
        return 100.0;
    }
    if target == 0.0 || !value.is_finite() {
        return 0.0;
    }

    let distance = match operator {
        ConstraintOperator::Gt | ConstraintOperator::Ge => (target - value).max(0.0) / target.abs(),
        ConstraintOperator::Lt | ConstraintOperator::Le => (value - target).max(0.0) / target.abs(),
        ConstraintOperator::Eq => (value - target).abs() / target.abs(),
    };
    100.0 * (1.0 - distance.min(1.0))
}

/// Inclusive complexity-level range allowed by the MIN/MAX_COMPLEXITY
/// constraints in the set. Strict operators shrink the bound by one level
/// and `==` pins both ends.
///
/// The pair is inverted (`low > high`) when the constraints leave no level;
/// use [`feasible_complexity_bounds`] to detect that case.
pub fn complexity_bounds(constraints: &[Constraint]) -> (u8, u8) {
    let (low, high) = raw_bounds(constraints);
    let low = low.clamp(i32::from(MIN_LEVEL), i32::from(MAX_LEVEL)) as u8;
    let high = high.clamp(i32::from(MIN_LEVEL), i32::from(MAX_LEVEL)) as u8;
    (low, high)
}

/// Level range allowed by the constraints, or `None` when no level in
/// 1..=10 satisfies all of them.
pub fn feasible_complexity_bounds(constraints: &[Constraint]) -> Option<(u8, u8)> {
    let (low, high) = raw_bounds(constraints);
    let low = low.max(i32::from(MIN_LEVEL));
    let high = high.min(i32::from(MAX_LEVEL));
    (low <= high).then(|| (low as u8, high as u8))
}

fn raw_bounds(constraints: &[Constraint]) -> (i32, i32) {
    let mut low = i32::from(MIN_LEVEL);
    let mut high = i32::from(MAX_LEVEL);

    for c in constraints.iter().filter(|c| {
        matches!(
            c.constraint_type,
            ConstraintType::MinComplexity | ConstraintType::MaxComplexity
        )
    }) {
        if !c.value.is_finite() {
            continue;
        }
        // keeps the +1/-1 below clear of i32 overflow
        let value = c.value.clamp(-1000.0, 1000.0);
        match c.effective_operator() {
            ConstraintOperator::Ge => low = low.max(value.ceil() as i32),
            ConstraintOperator::Gt => low = low.max(value.floor() as i32 + 1),
            ConstraintOperator::Le => high = high.min(value.floor() as i32),
            ConstraintOperator::Lt => high = high.min(value.ceil() as i32 - 1),
            ConstraintOperator::Eq => {
                low = low.max(value.round() as i32);
                high = high.min(value.round() as i32);
            }
        }
    }

    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::MetricKey;

    fn values(sharpe: f64, dd: f64) -> MetricValues {
        MetricValues::new()
            .with(MetricKey::SharpeRatio, sharpe)
            .with(MetricKey::MaxDrawdown, dd)
    }

    #[test]
    fn test_empty_constraints_score_full() {
        let engine = ConstraintEngine::new();
        assert_eq!(engine.score(&[], &values(1.0, -0.1)), 100.0);
        let (ok, violations) = engine.evaluate(&[], &values(1.0, -0.1));
        assert!(ok);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_hard_violation_fails() {
        let engine = ConstraintEngine::new();
        let constraints = vec![Constraint::hard(ConstraintType::MinSharpe, 1.5)
            .with_operator(ConstraintOperator::Ge)];
        let (ok, violations) = engine.evaluate(&constraints, &values(1.2, -0.1));
        assert!(!ok);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("[HARD]"));
        assert!(violations[0].contains("MIN_SHARPE"));
    }

    #[test]
    fn test_soft_violation_still_satisfied() {
        let engine = ConstraintEngine::new();
        let constraints = vec![Constraint::soft(ConstraintType::MaxDrawdown, -0.1)];
        let (ok, violations) = engine.evaluate(&constraints, &values(1.2, -0.2));
        assert!(ok);
        assert!(violations[0].starts_with("[SOFT]"));
    }

    #[test]
    fn test_hard_violations_listed_first() {
        let engine = ConstraintEngine::new();
        let constraints = vec![
            Constraint::soft(ConstraintType::MaxDrawdown, -0.1),
            Constraint::hard(ConstraintType::MinSharpe, 2.0),
        ];
        let (ok, violations) = engine.evaluate(&constraints, &values(1.0, -0.3));
        assert!(!ok);
        assert!(violations[0].starts_with("[HARD]"));
        assert!(violations[1].starts_with("[SOFT]"));
    }

    #[test]
    fn test_missing_metric_is_skipped() {
        let engine = ConstraintEngine::new();
        let constraints = vec![Constraint::hard(ConstraintType::MinWinRate, 0.9)];
        let (ok, _) = engine.evaluate(&constraints, &values(1.0, -0.1));
        assert!(ok);
        assert_eq!(engine.score(&constraints, &values(1.0, -0.1)), 100.0);
    }

    #[test]
    fn test_partial_credit() {
        let engine = ConstraintEngine::new();
        // 1.2 against >= 1.5 is 20% short
        let constraints = vec![Constraint::soft(ConstraintType::MinSharpe, 1.5)];
        let score = engine.score(&constraints, &values(1.2, -0.1));
        assert!((score - 80.0).abs() < 1e-9);

        // one satisfied (weight 3), one at zero credit (weight 1)
        let constraints = vec![
            Constraint::soft(ConstraintType::MinSharpe, 1.0).with_weight(3.0),
            Constraint::soft(ConstraintType::MinSharpe, 0.0).with_operator(ConstraintOperator::Gt),
        ];
        let score = engine.score(&constraints, &values(-1.0, -0.1));
        assert_eq!(score, 0.0);
        let score = engine.score(&constraints, &values(1.0, -0.1));
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_zero_target_gives_no_partial_credit() {
        let engine = ConstraintEngine::new();
        let constraints = vec![
            Constraint::soft(ConstraintType::MinSharpe, 2.0).with_weight(1.0),
            Constraint::soft(ConstraintType::MaxDrawdown, 0.0)
                .with_operator(ConstraintOperator::Eq)
                .with_weight(1.0),
        ];
        // sharpe credit 50, drawdown credit 0
        let score = engine.score(&constraints, &values(1.0, -0.2));
        assert!((score - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_complexity_bounds() {
        assert_eq!(complexity_bounds(&[]), (1, 10));

        let constraints = vec![
            Constraint::hard(ConstraintType::MinComplexity, 3.0),
            Constraint::hard(ConstraintType::MaxComplexity, 7.0),
        ];
        assert_eq!(complexity_bounds(&constraints), (3, 7));

        let strict = vec![
            Constraint::hard(ConstraintType::MinComplexity, 3.0).with_operator(ConstraintOperator::Gt),
            Constraint::hard(ConstraintType::MaxComplexity, 7.0).with_operator(ConstraintOperator::Lt),
        ];
        assert_eq!(complexity_bounds(&strict), (4, 6));

        let pinned = vec![Constraint::soft(ConstraintType::MaxComplexity, 5.0)
            .with_operator(ConstraintOperator::Eq)];
        assert_eq!(complexity_bounds(&pinned), (5, 5));
    }

    #[test]
    fn test_empty_complexity_range() {
        let strict = vec![
            Constraint::hard(ConstraintType::MaxComplexity, 4.0).with_operator(ConstraintOperator::Lt),
            Constraint::hard(ConstraintType::MinComplexity, 3.0).with_operator(ConstraintOperator::Gt),
        ];
        assert_eq!(complexity_bounds(&strict), (4, 3));
        assert_eq!(feasible_complexity_bounds(&strict), None);

        let fractional = vec![
            Constraint::hard(ConstraintType::MaxComplexity, 3.5),
            Constraint::hard(ConstraintType::MinComplexity, 3.2),
        ];
        assert_eq!(feasible_complexity_bounds(&fractional), None);

        let above_top = vec![Constraint::hard(ConstraintType::MinComplexity, 10.0)
            .with_operator(ConstraintOperator::Gt)];
        assert_eq!(feasible_complexity_bounds(&above_top), None);

        assert_eq!(feasible_complexity_bounds(&[]), Some((1, 10)));
    }
}
