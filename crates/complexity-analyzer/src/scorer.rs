//! Complexity Scoring Rubric
//!
//! Fixed piecewise-linear bands that turn a metrics bundle into component
//! scores, an overall score, a discrete 1-10 complexity level, a
//! recommendation and a confidence value. This is a heuristic rubric, not a
//! statistical model: every breakpoint below is a constant.

use analysis_core::stats::finite_or;
use analysis_core::{ComplexityMetrics, ComplexityScore, StrategyParams};

pub const PERFORMANCE_WEIGHT: f64 = 0.4;
pub const RISK_WEIGHT: f64 = 0.4;
pub const EFFICIENCY_WEIGHT: f64 = 0.2;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 10;

/// Human-readable name of a complexity level
pub fn level_description(level: u8) -> &'static str {
    match level {
        0 | 1 => "Minimal",
        2 => "Very Simple",
        3 => "Simple",
        4 => "Basic",
        5 => "Moderate",
        6 => "Intermediate",
        7 => "Advanced",
        8 => "Sophisticated",
        9 => "Complex",
        _ => "Highly Complex",
    }
}

/// Maps metrics to a complexity grade.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityScorer;

impl ComplexityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, metrics: &ComplexityMetrics, params: &StrategyParams) -> ComplexityScore {
        let performance_score = performance_score(metrics);
        let risk_score = risk_score(metrics);
        let efficiency_score = efficiency_score(metrics, params);
        let overall_score = overall_score(performance_score, risk_score, efficiency_score);
        let level = determine_level(metrics, performance_score, risk_score);

        ComplexityScore {
            level,
            metrics: *metrics,
            performance_score,
            risk_score,
            efficiency_score,
            overall_score,
            recommendation: recommendation(level, overall_score, metrics),
            confidence: confidence(metrics),
            benchmark: None,
        }
    }
}

fn banded(contribution: f64, cap: f64) -> f64 {
    finite_or(contribution, 0.0).clamp(0.0, cap)
}

/// Sharpe 30%, win rate 20%, profit factor 20%, Calmar 15%, Sortino 15%.
pub fn performance_score(m: &ComplexityMetrics) -> f64 {
    let sharpe = if m.sharpe_ratio > 2.0 {
        30.0
    } else if m.sharpe_ratio > 1.5 {
        25.0
    } else if m.sharpe_ratio > 1.0 {
        20.0
    } else if m.sharpe_ratio > 0.5 {
        15.0
    } else {
        m.sharpe_ratio * 30.0
    };

    let win_rate = if m.win_rate > 0.6 {
        20.0
    } else if m.win_rate > 0.55 {
        15.0
    } else if m.win_rate > 0.5 {
        10.0
    } else {
        m.win_rate * 20.0
    };

    let profit_factor = if m.profit_factor > 2.0 {
        20.0
    } else if m.profit_factor > 1.5 {
        15.0
    } else if m.profit_factor > 1.2 {
        10.0
    } else {
        m.profit_factor * 5.0
    };

    let calmar = if m.calmar_ratio > 2.0 {
        15.0
    } else if m.calmar_ratio > 1.0 {
        10.0
    } else if m.calmar_ratio > 0.5 {
        5.0
    } else {
        m.calmar_ratio * 10.0
    };

    let sortino = if m.sortino_ratio > 2.0 {
        15.0
    } else if m.sortino_ratio > 1.5 {
        12.0
    } else if m.sortino_ratio > 1.0 {
        8.0
    } else {
        m.sortino_ratio * 8.0
    };

    let total = banded(sharpe, 30.0)
        + banded(win_rate, 20.0)
        + banded(profit_factor, 20.0)
        + banded(calmar, 15.0)
        + banded(sortino, 15.0);
    total.clamp(0.0, 100.0)
}

/// Drawdown 40%, volatility 30%, recovery time 30%. Smaller risk scores higher.
pub fn risk_score(m: &ComplexityMetrics) -> f64 {
    let retained = 1.0 + m.max_drawdown;
    let drawdown = if retained > 0.95 {
        40.0
    } else if retained > 0.9 {
        30.0
    } else if retained > 0.85 {
        20.0
    } else if retained > 0.8 {
        10.0
    } else {
        retained * 10.0
    };

    let volatility = if m.volatility < 0.1 {
        30.0
    } else if m.volatility < 0.15 {
        25.0
    } else if m.volatility < 0.2 {
        20.0
    } else if m.volatility < 0.3 {
        10.0
    } else {
        (1.0 - m.volatility) * 10.0
    };

    let recovery = if m.recovery_time_days < 10.0 {
        30.0
    } else if m.recovery_time_days < 20.0 {
        25.0
    } else if m.recovery_time_days < 30.0 {
        20.0
    } else if m.recovery_time_days < 60.0 {
        10.0
    } else {
        5.0
    };

    let total = banded(drawdown, 40.0) + banded(volatility, 30.0) + banded(recovery, 30.0);
    total.clamp(0.0, 100.0)
}

/// Rewards doing more with fewer parameters.
pub fn efficiency_score(m: &ComplexityMetrics, params: &StrategyParams) -> f64 {
    let count = params.param_count();
    let bucket = match count {
        0..=5 => 20.0,
        6..=10 => 10.0,
        11..=15 => 0.0,
        _ => -10.0,
    };

    let per_unit = m.sharpe_ratio / (count as f64 / 5.0).max(1.0);
    let bonus = banded(per_unit * 10.0, 30.0);

    finite_or(50.0 + bucket + bonus, 50.0).clamp(0.0, 100.0)
}

pub fn overall_score(performance: f64, risk: f64, efficiency: f64) -> f64 {
    let overall =
        PERFORMANCE_WEIGHT * performance + RISK_WEIGHT * risk + EFFICIENCY_WEIGHT * efficiency;
    finite_or(overall, 0.0).clamp(0.0, 100.0)
}

/// Base level from Sharpe breakpoints, nudged by the risk and performance scores.
pub fn determine_level(m: &ComplexityMetrics, performance_score: f64, risk_score: f64) -> u8 {
    let sharpe = m.sharpe_ratio;
    let base: i32 = if sharpe > 2.5 {
        10
    } else if sharpe > 2.2 {
        9
    } else if sharpe > 1.9 {
        8
    } else if sharpe > 1.6 {
        7
    } else if sharpe > 1.3 {
        6
    } else if sharpe > 1.0 {
        5
    } else if sharpe > 0.8 {
        4
    } else if sharpe > 0.65 {
        3
    } else if sharpe > 0.5 {
        2
    } else {
        1
    };

    let mut level = base;
    // Safer strategies can afford less machinery; risky ones need more.
    if risk_score > 80.0 {
        level -= 1;
    } else if risk_score < 40.0 {
        level += 1;
    }
    if performance_score > 80.0 {
        level += 1;
    } else if performance_score < 40.0 {
        level -= 1;
    }

    level.clamp(i32::from(MIN_LEVEL), i32::from(MAX_LEVEL)) as u8
}

pub fn recommendation(level: u8, overall_score: f64, m: &ComplexityMetrics) -> String {
    let band = if overall_score >= 80.0 {
        format!(
            "Excellent overall score ({:.1}); this complexity is well justified.",
            overall_score
        )
    } else if overall_score >= 60.0 {
        format!(
            "Good overall score ({:.1}); performance supports the added complexity.",
            overall_score
        )
    } else if overall_score >= 40.0 {
        format!(
            "Moderate overall score ({:.1}); consider simplifying rules that add little value.",
            overall_score
        )
    } else {
        format!(
            "Poor overall score ({:.1}); a simpler strategy is likely to perform as well.",
            overall_score
        )
    };

    let mut text = format!("Level {} ({}): {}", level, level_description(level), band);
    if m.sharpe_ratio > 1.5 {
        text.push_str(" Strong risk-adjusted returns support this complexity.");
    }
    if m.max_drawdown < -0.15 {
        text.push_str(" Drawdown exceeds 15%; tighten risk controls.");
    }
    text
}

/// 50 base plus fixed bonuses, capped at 100.
pub fn confidence(m: &ComplexityMetrics) -> f64 {
    let mut confidence = 50.0;

    if m.sharpe_ratio > 2.0 {
        confidence += 20.0;
    } else if m.sharpe_ratio > 1.5 {
        confidence += 15.0;
    } else if m.sharpe_ratio > 1.0 {
        confidence += 10.0;
    }

    if m.max_drawdown > -0.1 {
        confidence += 15.0;
    } else if m.max_drawdown > -0.2 {
        confidence += 10.0;
    }

    if m.win_rate > 0.6 {
        confidence += 10.0;
    } else if m.win_rate > 0.5 {
        confidence += 5.0;
    }

    if m.recovery_time_days < 10.0 {
        confidence += 10.0;
    }

    f64::min(confidence, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(sharpe: f64, dd: f64, vol: f64, win: f64) -> ComplexityMetrics {
        ComplexityMetrics {
            sharpe_ratio: sharpe,
            max_drawdown: dd,
            volatility: vol,
            win_rate: win,
            profit_factor: 1.6,
            calmar_ratio: 1.2,
            sortino_ratio: 1.8,
            recovery_time_days: 15.0,
            annual_return: 0.2,
            total_return: 0.2,
        }
    }

    fn params(n: usize) -> StrategyParams {
        StrategyParams {
            indicators: (0..n).map(|i| format!("ind{i}")).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_performance_bands() {
        // 25 + 15 + 15 + 10 + 12
        let m = metrics(1.8, -0.1, 0.15, 0.58);
        assert!((performance_score(&m) - 77.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_metrics_contribute_nothing() {
        let m = ComplexityMetrics {
            sharpe_ratio: -2.0,
            calmar_ratio: -1.0,
            sortino_ratio: -3.0,
            ..ComplexityMetrics::neutral()
        };
        assert_eq!(performance_score(&m), 0.0);
    }

    #[test]
    fn test_risk_best_band_is_100() {
        let m = ComplexityMetrics {
            max_drawdown: 0.0,
            volatility: 0.05,
            recovery_time_days: 0.0,
            ..ComplexityMetrics::neutral()
        };
        assert_eq!(risk_score(&m), 100.0);
    }

    #[test]
    fn test_risk_worst_bands() {
        let m = ComplexityMetrics {
            max_drawdown: -0.6,
            volatility: 1.4,
            recovery_time_days: 120.0,
            ..ComplexityMetrics::neutral()
        };
        // 0.4 * 10 + 0 + 5
        assert!((risk_score(&m) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_penalizes_parameter_bloat() {
        let m = metrics(1.0, -0.1, 0.15, 0.55);
        let lean = efficiency_score(&m, &params(3));
        let bloated = efficiency_score(&m, &params(20));
        assert!(lean > bloated);
        // 50 + 20 + 1.0 * 10
        assert!((lean - 80.0).abs() < 1e-9);
        // 50 - 10 + (1.0 / 4) * 10
        assert!((bloated - 42.5).abs() < 1e-9);
    }

    #[test]
    fn test_level_adjustments() {
        let m = metrics(1.2, -0.1, 0.15, 0.55);
        assert_eq!(determine_level(&m, 60.0, 60.0), 5);
        assert_eq!(determine_level(&m, 60.0, 90.0), 4);
        assert_eq!(determine_level(&m, 90.0, 30.0), 7);
        let weak = metrics(-1.0, -0.5, 0.5, 0.3);
        assert_eq!(determine_level(&weak, 10.0, 90.0), 1);
        let strong = metrics(3.0, -0.01, 0.05, 0.7);
        assert_eq!(determine_level(&strong, 95.0, 30.0), 10);
    }

    #[test]
    fn test_recommendation_clauses() {
        let m = metrics(1.8, -0.2, 0.15, 0.58);
        let text = recommendation(7, 65.0, &m);
        assert!(text.starts_with("Level 7 (Advanced)"));
        assert!(text.contains("Good overall score"));
        assert!(text.contains("Strong risk-adjusted returns"));
        assert!(text.contains("Drawdown exceeds 15%"));

        let quiet = recommendation(2, 20.0, &metrics(0.4, -0.05, 0.1, 0.5));
        assert!(quiet.contains("Poor overall score"));
        assert!(!quiet.contains("Strong risk-adjusted"));
    }

    #[test]
    fn test_confidence_caps_at_100() {
        let m = ComplexityMetrics {
            sharpe_ratio: 3.0,
            max_drawdown: -0.01,
            win_rate: 0.8,
            recovery_time_days: 1.0,
            ..ComplexityMetrics::neutral()
        };
        assert_eq!(confidence(&m), 100.0);
        assert_eq!(confidence(&ComplexityMetrics { recovery_time_days: 50.0, max_drawdown: -0.5, ..ComplexityMetrics::neutral() }), 50.0);
    }

    #[test]
    fn test_score_bounds_hold_for_extremes() {
        let scorer = ComplexityScorer::new();
        for m in [
            ComplexityMetrics::neutral(),
            metrics(50.0, 0.0, 0.0, 1.0),
            metrics(-50.0, -1.0, 10.0, 0.0),
        ] {
            let s = scorer.score(&m, &params(30));
            assert!((0.0..=100.0).contains(&s.overall_score));
            assert!((0.0..=100.0).contains(&s.performance_score));
            assert!((0.0..=100.0).contains(&s.risk_score));
            assert!((0.0..=100.0).contains(&s.efficiency_score));
            assert!((0.0..=100.0).contains(&s.confidence));
            assert!((MIN_LEVEL..=MAX_LEVEL).contains(&s.level));
        }
    }
}
