//! Rough complexity estimate used when the full analysis cannot run.

use analysis_core::{ComplexityMetrics, ComplexityScore, ReturnSeries, StrategyParams};

use crate::metrics::MetricsCalculator;
use crate::scorer::{self, level_description};

/// Confidence ceiling for any fallback estimate
pub const FALLBACK_MAX_CONFIDENCE: f64 = 30.0;
/// Confidence when no return data is available at all
const NO_DATA_CONFIDENCE: f64 = 20.0;
const NEUTRAL_COMPONENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackComplexityScorer {
    calculator: MetricsCalculator,
}

impl FallbackComplexityScorer {
    pub fn new(calculator: MetricsCalculator) -> Self {
        Self { calculator }
    }

    /// Estimate a level from the parameter count, using whatever return
    /// data is available for the component scores.
    pub fn score(&self, params: &StrategyParams, returns: Option<&ReturnSeries>) -> ComplexityScore {
        let level = level_from_param_count(params.param_count());
        let metrics = returns
            .filter(|r| r.valid_values().len() >= 2)
            .map(|r| self.calculator.compute(r));

        let (metrics, performance_score, risk_score, efficiency_score, confidence) = match metrics {
            Some(m) => (
                m,
                scorer::performance_score(&m),
                scorer::risk_score(&m),
                scorer::efficiency_score(&m, params),
                scorer::confidence(&m).min(FALLBACK_MAX_CONFIDENCE),
            ),
            None => (
                ComplexityMetrics::neutral(),
                NEUTRAL_COMPONENT,
                NEUTRAL_COMPONENT,
                NEUTRAL_COMPONENT,
                NO_DATA_CONFIDENCE,
            ),
        };

        ComplexityScore {
            level,
            metrics,
            performance_score,
            risk_score,
            efficiency_score,
            overall_score: scorer::overall_score(performance_score, risk_score, efficiency_score),
            recommendation: format!(
                "Fallback estimate: level {} ({}) inferred from {} strategy parameters. \
                 Run a full analysis before relying on this result.",
                level,
                level_description(level),
                params.param_count()
            ),
            confidence,
            benchmark: None,
        }
    }
}

fn level_from_param_count(count: usize) -> u8 {
    match count {
        0..=2 => 2,
        3..=5 => 3,
        6..=8 => 5,
        9..=12 => 7,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn params(n: usize) -> StrategyParams {
        StrategyParams {
            indicators: (0..n).map(|i| format!("ind{i}")).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_level_grows_with_parameters() {
        let fallback = FallbackComplexityScorer::default();
        assert_eq!(fallback.score(&params(1), None).level, 2);
        assert_eq!(fallback.score(&params(4), None).level, 3);
        assert_eq!(fallback.score(&params(7), None).level, 5);
        assert_eq!(fallback.score(&params(10), None).level, 7);
        assert_eq!(fallback.score(&params(20), None).level, 9);
    }

    #[test]
    fn test_no_data_is_neutral_and_low_confidence() {
        let score = FallbackComplexityScorer::default().score(&params(3), None);
        assert_eq!(score.overall_score, 50.0);
        assert_eq!(score.confidence, NO_DATA_CONFIDENCE);
        assert!(score.recommendation.starts_with("Fallback estimate"));
    }

    #[test]
    fn test_confidence_capped_with_data() {
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        let values: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let series = ReturnSeries::from_values(start, Duration::days(1), &values);
        let score = FallbackComplexityScorer::default().score(&params(2), Some(&series));
        assert!(score.confidence <= FALLBACK_MAX_CONFIDENCE);
        assert!(score.metrics.sharpe_ratio > 0.0);
    }
}
