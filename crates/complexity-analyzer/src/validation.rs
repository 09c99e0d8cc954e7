use analysis_core::{
    ComplexityError, Constraint, ConstraintOperator, ConstraintType, ReturnSeries, Timeframe,
};
use chrono::Duration;
use tracing::warn;

use crate::constraints::feasible_complexity_bounds;

/// Share of non-finite or non-positive values tolerated in a series
const MAX_INVALID_FRACTION: f64 = 0.05;
/// Share of oversized gaps tolerated in a series
const MAX_GAP_FRACTION: f64 = 0.10;
/// A gap must span at least this many bars to count as oversized
const GAP_BARS: i32 = 10;
/// Hard-constraint count above which a warning is emitted
const MAX_HARD_CONSTRAINTS: usize = 5;

/// Validates constraint definitions before they are used.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl ConstraintValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check one constraint against the allowed value range and operators.
    pub fn validate_constraint(&self, constraint: &Constraint) -> Result<(), ComplexityError> {
        let kind = constraint.constraint_type;

        if !constraint.value.is_finite() {
            return Err(ComplexityError::InvalidParameter(format!(
                "{kind} value must be a finite number"
            )));
        }
        if constraint.weight <= 0.0 || !constraint.weight.is_finite() {
            return Err(ComplexityError::InvalidParameter(format!(
                "{kind} weight must be positive, got {}",
                constraint.weight
            )));
        }

        let (min, max) = value_range(kind);
        if constraint.value < min || constraint.value > max {
            return Err(ComplexityError::InvalidParameter(format!(
                "{kind} value {} is outside [{min}, {max}]",
                constraint.value
            )));
        }

        let operator = constraint.effective_operator();
        if !allowed_operators(kind).contains(&operator) {
            return Err(ComplexityError::InvalidParameter(format!(
                "Operator {operator} is not allowed for {kind}"
            )));
        }

        Ok(())
    }

    /// Check the set as a whole. Returns non-fatal warnings.
    pub fn validate_compatibility(
        &self,
        constraints: &[Constraint],
    ) -> Result<Vec<String>, ComplexityError> {
        let max_complexity = constraints
            .iter()
            .filter(|c| c.constraint_type == ConstraintType::MaxComplexity)
            .map(|c| c.value)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));
        let min_complexity = constraints
            .iter()
            .filter(|c| c.constraint_type == ConstraintType::MinComplexity)
            .map(|c| c.value)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        if let (Some(max), Some(min)) = (max_complexity, min_complexity) {
            if max < min {
                return Err(ComplexityError::ConflictingConstraints(format!(
                    "MAX_COMPLEXITY ({max}) is below MIN_COMPLEXITY ({min})"
                )));
            }
        }

        if feasible_complexity_bounds(constraints).is_none() {
            return Err(ComplexityError::ConflictingConstraints(
                "MIN_COMPLEXITY and MAX_COMPLEXITY leave no complexity level between 1 and 10"
                    .to_string(),
            ));
        }

        for c in constraints.iter().filter(|c| c.is_hard) {
            if let Some(reason) = impossible_reason(c) {
                return Err(ComplexityError::ConstraintImpossible(reason));
            }
        }

        let mut warnings = Vec::new();
        let hard_count = constraints.iter().filter(|c| c.is_hard).count();
        if hard_count > MAX_HARD_CONSTRAINTS {
            let msg = format!(
                "{hard_count} hard constraints may leave no feasible complexity level; consider making some soft"
            );
            warn!("{}", msg);
            warnings.push(msg);
        }

        Ok(warnings)
    }

    /// Per-constraint checks followed by the set-level checks.
    pub fn validate_constraints(
        &self,
        constraints: &[Constraint],
    ) -> Result<Vec<String>, ComplexityError> {
        for constraint in constraints {
            self.validate_constraint(constraint)?;
        }
        self.validate_compatibility(constraints)
    }
}

fn value_range(kind: ConstraintType) -> (f64, f64) {
    match kind {
        ConstraintType::MinSharpe => (-5.0, 10.0),
        ConstraintType::MaxDrawdown => (-1.0, 0.0),
        ConstraintType::MaxVolatility => (0.0, 5.0),
        ConstraintType::MinWinRate => (0.0, 1.0),
        ConstraintType::MinProfitFactor => (0.0, 100.0),
        ConstraintType::MaxComplexity | ConstraintType::MinComplexity => (1.0, 10.0),
        ConstraintType::TargetReturn => (-1.0, 10.0),
        ConstraintType::RiskLimit => (0.0, 100.0),
    }
}

fn allowed_operators(kind: ConstraintType) -> &'static [ConstraintOperator] {
    use ConstraintOperator::*;
    match kind {
        ConstraintType::MinSharpe
        | ConstraintType::MinWinRate
        | ConstraintType::MinProfitFactor
        | ConstraintType::MinComplexity
        | ConstraintType::MaxDrawdown
        | ConstraintType::RiskLimit => &[Gt, Ge],
        ConstraintType::MaxVolatility => &[Lt, Le],
        ConstraintType::MaxComplexity => &[Lt, Le, Eq],
        ConstraintType::TargetReturn => &[Gt, Ge, Eq],
    }
}

fn impossible_reason(c: &Constraint) -> Option<String> {
    let v = c.value;
    let reason = match c.constraint_type {
        ConstraintType::MinSharpe if v >= 3.0 => "a Sharpe ratio of 3.0 or more",
        ConstraintType::MaxDrawdown if v >= -0.01 => "a maximum drawdown under 1%",
        ConstraintType::MinWinRate if v >= 0.95 => "a win rate of 95% or more",
        ConstraintType::TargetReturn if v >= 5.0 => "an annual return of 500% or more",
        ConstraintType::MaxVolatility if v <= 0.01 => "volatility of 1% or less",
        ConstraintType::MinProfitFactor if v >= 10.0 => "a profit factor of 10 or more",
        _ => return None,
    };
    Some(format!(
        "hard {} = {} requires {} which is practically unattainable",
        c.constraint_type, v, reason
    ))
}

/// Check that a return series has enough clean history for `timeframe`.
pub fn validate_return_series(
    series: &ReturnSeries,
    timeframe: Timeframe,
    lookback_days: i64,
) -> Result<(), ComplexityError> {
    if lookback_days < timeframe.min_lookback_days() {
        return Err(ComplexityError::insufficient(
            timeframe.label(),
            format!(
                "lookback of {} days is below the minimum of {} days",
                lookback_days,
                timeframe.min_lookback_days()
            ),
        ));
    }

    if series.len() < timeframe.min_points() {
        return Err(ComplexityError::insufficient(
            timeframe.label(),
            format!(
                "{} data points, at least {} required",
                series.len(),
                timeframe.min_points()
            ),
        ));
    }

    let invalid = series
        .points
        .iter()
        .filter(|p| !p.value.is_finite() || p.value <= 0.0)
        .count();
    if invalid as f64 / series.len() as f64 > MAX_INVALID_FRACTION {
        return Err(ComplexityError::DataQualityIssue(format!(
            "{} of {} values are missing or invalid",
            invalid,
            series.len()
        )));
    }

    if let Some(w) = series
        .points
        .windows(2)
        .find(|w| w[1].timestamp <= w[0].timestamp)
    {
        return Err(ComplexityError::DataQualityIssue(format!(
            "timestamps are not strictly increasing at {}",
            w[1].timestamp
        )));
    }

    let max_gap = (timeframe.to_duration() * GAP_BARS).max(Duration::days(4));
    let intervals = series.len() - 1;
    let large_gaps = series
        .points
        .windows(2)
        .filter(|w| w[1].timestamp - w[0].timestamp > max_gap)
        .count();
    if intervals > 0 && large_gaps as f64 / intervals as f64 > MAX_GAP_FRACTION {
        return Err(ComplexityError::DataQualityIssue(format!(
            "{} of {} intervals contain gaps longer than {} hours",
            large_gaps,
            intervals,
            max_gap.num_hours()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn daily(n: usize) -> ReturnSeries {
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        let values: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        ReturnSeries::from_values(start, Duration::days(1), &values)
    }

    #[test]
    fn test_value_range_rejected() {
        let v = ConstraintValidator::new();
        assert!(v.validate_constraint(&Constraint::hard(ConstraintType::MinWinRate, 0.6)).is_ok());
        let err = v
            .validate_constraint(&Constraint::hard(ConstraintType::MinWinRate, 1.5))
            .unwrap_err();
        assert!(matches!(err, ComplexityError::InvalidParameter(_)));
        assert!(v
            .validate_constraint(&Constraint::soft(ConstraintType::MaxDrawdown, 0.2))
            .is_err());
        assert!(v
            .validate_constraint(&Constraint::soft(ConstraintType::MinSharpe, f64::NAN))
            .is_err());
    }

    #[test]
    fn test_operator_whitelist() {
        let v = ConstraintValidator::new();
        let bad = Constraint::hard(ConstraintType::MinSharpe, 1.0).with_operator(ConstraintOperator::Le);
        assert!(v.validate_constraint(&bad).is_err());
        let ok = Constraint::hard(ConstraintType::MaxComplexity, 4.0)
            .with_operator(ConstraintOperator::Eq);
        assert!(v.validate_constraint(&ok).is_ok());
    }

    #[test]
    fn test_non_positive_weight_rejected() {
        let v = ConstraintValidator::new();
        let c = Constraint::soft(ConstraintType::MinSharpe, 1.0).with_weight(0.0);
        assert!(v.validate_constraint(&c).is_err());
    }

    #[test]
    fn test_conflicting_complexity_bounds() {
        let v = ConstraintValidator::new();
        let constraints = vec![
            Constraint::hard(ConstraintType::MaxComplexity, 3.0),
            Constraint::hard(ConstraintType::MinComplexity, 7.0),
        ];
        let err = v.validate_constraints(&constraints).unwrap_err();
        assert!(matches!(err, ComplexityError::ConflictingConstraints(_)));
    }

    #[test]
    fn test_strict_and_fractional_bounds_conflict() {
        let v = ConstraintValidator::new();
        let strict = vec![
            Constraint::hard(ConstraintType::MaxComplexity, 4.0).with_operator(ConstraintOperator::Lt),
            Constraint::hard(ConstraintType::MinComplexity, 3.0).with_operator(ConstraintOperator::Gt),
        ];
        let err = v.validate_constraints(&strict).unwrap_err();
        assert!(matches!(err, ComplexityError::ConflictingConstraints(_)));

        let fractional = vec![
            Constraint::hard(ConstraintType::MaxComplexity, 3.5).with_operator(ConstraintOperator::Le),
            Constraint::hard(ConstraintType::MinComplexity, 3.2).with_operator(ConstraintOperator::Ge),
        ];
        let err = v.validate_constraints(&fractional).unwrap_err();
        assert!(matches!(err, ComplexityError::ConflictingConstraints(_)));

        // one whole level between the bounds is enough
        let tight = vec![
            Constraint::hard(ConstraintType::MaxComplexity, 4.5),
            Constraint::hard(ConstraintType::MinComplexity, 3.2),
        ];
        assert!(v.validate_constraints(&tight).is_ok());
    }

    #[test]
    fn test_impossible_hard_constraint() {
        let v = ConstraintValidator::new();
        let err = v
            .validate_compatibility(&[Constraint::hard(ConstraintType::MinSharpe, 3.5)])
            .unwrap_err();
        assert!(matches!(err, ComplexityError::ConstraintImpossible(_)));

        // the same threshold is fine as a soft preference
        assert!(v
            .validate_compatibility(&[Constraint::soft(ConstraintType::MinSharpe, 3.5)])
            .is_ok());
    }

    #[test]
    fn test_many_hard_constraints_warn() {
        let v = ConstraintValidator::new();
        let constraints: Vec<Constraint> = (0..6)
            .map(|i| Constraint::hard(ConstraintType::MinSharpe, 0.5 + i as f64 * 0.1))
            .collect();
        let warnings = v.validate_constraints(&constraints).unwrap();
        assert_eq!(warnings.len(), 1);

        let warnings = v.validate_constraints(&constraints[..5]).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_series_too_short() {
        let err = validate_return_series(&daily(10), Timeframe::Day1, 365).unwrap_err();
        assert!(matches!(err, ComplexityError::InsufficientData { .. }));
        assert!(validate_return_series(&daily(30), Timeframe::Day1, 365).is_ok());
    }

    #[test]
    fn test_lookback_too_short() {
        let err = validate_return_series(&daily(100), Timeframe::Day1, 30).unwrap_err();
        assert!(matches!(err, ComplexityError::InsufficientData { .. }));
    }

    #[test]
    fn test_too_many_invalid_values() {
        let mut series = daily(100);
        for p in series.points.iter_mut().take(6) {
            p.value = f64::NAN;
        }
        let err = validate_return_series(&series, Timeframe::Day1, 365).unwrap_err();
        assert!(matches!(err, ComplexityError::DataQualityIssue(_)));

        let mut series = daily(100);
        series.points[3].value = 0.0;
        assert!(validate_return_series(&series, Timeframe::Day1, 365).is_ok());
    }

    #[test]
    fn test_unordered_timestamps() {
        let mut series = daily(40);
        series.points.swap(10, 11);
        let err = validate_return_series(&series, Timeframe::Day1, 365).unwrap_err();
        assert!(matches!(err, ComplexityError::DataQualityIssue(_)));
    }

    #[test]
    fn test_gappy_series() {
        // every third interval skips two weeks
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        let mut ts = start;
        let points = (0..60)
            .map(|i| {
                ts += if i % 3 == 0 { Duration::days(15) } else { Duration::days(1) };
                analysis_core::ReturnPoint { timestamp: ts, value: 100.0 }
            })
            .collect();
        let err = validate_return_series(&ReturnSeries::new(points), Timeframe::Day1, 365)
            .unwrap_err();
        assert!(matches!(err, ComplexityError::DataQualityIssue(_)));
    }
}
