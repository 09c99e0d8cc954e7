use analysis_core::stats::finite_or;
use analysis_core::{ComplexityMetrics, ReturnSeries};
use statrs::statistics::Statistics;

/// Finite stand-in for ratios that are unbounded (no losses, no downside).
pub const RATIO_CAP: f64 = 99.99;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Standard deviations below this are treated as "no variance".
const MIN_STD: f64 = 1e-12;

/// Converts a cumulative-value series into risk-adjusted performance metrics.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    risk_free_rate: f64,
    periods_per_year: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            periods_per_year: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl MetricsCalculator {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            ..Self::default()
        }
    }

    pub fn with_periods_per_year(mut self, periods_per_year: f64) -> Self {
        if periods_per_year > 0.0 {
            self.periods_per_year = periods_per_year;
        }
        self
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    pub fn periods_per_year(&self) -> f64 {
        self.periods_per_year
    }

    /// Compute all metrics. Degenerate series produce neutral metrics and
    /// no field is ever NaN or infinite.
    pub fn compute(&self, returns: &ReturnSeries) -> ComplexityMetrics {
        let values = returns.valid_values();
        if values.len() < 2 {
            return ComplexityMetrics::neutral();
        }

        let changes: Vec<f64> = values.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let rf_per_period = self.risk_free_rate / self.periods_per_year;
        let excess: Vec<f64> = changes.iter().map(|r| r - rf_per_period).collect();

        let max_drawdown = max_drawdown(&values);
        let annual_return = changes.as_slice().mean() * self.periods_per_year;
        let calmar_ratio = if max_drawdown.abs() > 0.0 {
            annual_return / max_drawdown.abs()
        } else {
            0.0
        };

        let metrics = ComplexityMetrics {
            sharpe_ratio: self.sharpe(&excess),
            max_drawdown,
            volatility: self.volatility(&changes),
            win_rate: win_rate(&changes),
            profit_factor: profit_factor(&changes),
            calmar_ratio,
            sortino_ratio: self.sortino(&excess),
            recovery_time_days: recovery_time(&values),
            annual_return,
            total_return: values[values.len() - 1] / values[0] - 1.0,
        };

        sanitize(metrics)
    }

    fn sharpe(&self, excess: &[f64]) -> f64 {
        if excess.len() < 2 {
            return 0.0;
        }
        let std = excess.std_dev();
        if std.is_nan() || std <= MIN_STD {
            return 0.0;
        }
        let sharpe = self.periods_per_year.sqrt() * excess.mean() / std;
        sharpe.clamp(-RATIO_CAP, RATIO_CAP)
    }

    /// Downside deviation is the RMS of negative excess returns only.
    fn sortino(&self, excess: &[f64]) -> f64 {
        let mean_excess = excess.mean();
        let negatives: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
        let downside = if negatives.is_empty() {
            0.0
        } else {
            (negatives.iter().map(|r| r * r).sum::<f64>() / negatives.len() as f64).sqrt()
        };

        if downside > MIN_STD {
            (self.periods_per_year.sqrt() * mean_excess / downside).clamp(-RATIO_CAP, RATIO_CAP)
        } else if mean_excess > 0.0 {
            RATIO_CAP
        } else {
            0.0
        }
    }

    fn volatility(&self, changes: &[f64]) -> f64 {
        if changes.len() < 2 {
            return 0.0;
        }
        let std = changes.std_dev();
        if std > MIN_STD {
            std * self.periods_per_year.sqrt()
        } else {
            0.0
        }
    }
}

/// Most negative peak-to-trough decline, as a fraction (<= 0).
pub fn max_drawdown(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut peak = values[0];
    let mut worst = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        worst = worst.min(v / peak - 1.0);
    }
    worst
}

/// Mean number of consecutive periods spent below the running maximum,
/// across all drawdown episodes.
pub fn recovery_time(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut episodes: Vec<usize> = Vec::new();
    let mut current = 0usize;

    for &v in values {
        if v < peak {
            current += 1;
        } else {
            peak = v;
            if current > 0 {
                episodes.push(current);
                current = 0;
            }
        }
    }
    if current > 0 {
        episodes.push(current);
    }

    if episodes.is_empty() {
        0.0
    } else {
        episodes.iter().sum::<usize>() as f64 / episodes.len() as f64
    }
}

fn win_rate(changes: &[f64]) -> f64 {
    if changes.is_empty() {
        return 0.0;
    }
    changes.iter().filter(|r| **r > 0.0).count() as f64 / changes.len() as f64
}

fn profit_factor(changes: &[f64]) -> f64 {
    let gains: f64 = changes.iter().filter(|r| **r > 0.0).sum();
    let losses: f64 = changes.iter().filter(|r| **r < 0.0).sum::<f64>().abs();

    if losses > 0.0 {
        (gains / losses).min(RATIO_CAP)
    } else if gains > 0.0 {
        RATIO_CAP
    } else {
        0.0
    }
}

fn sanitize(m: ComplexityMetrics) -> ComplexityMetrics {
    ComplexityMetrics {
        sharpe_ratio: finite_or(m.sharpe_ratio, 0.0),
        max_drawdown: finite_or(m.max_drawdown, 0.0).min(0.0),
        volatility: finite_or(m.volatility, 0.0).max(0.0),
        win_rate: finite_or(m.win_rate, 0.0).clamp(0.0, 1.0),
        profit_factor: finite_or(m.profit_factor, 0.0).max(0.0),
        calmar_ratio: finite_or(m.calmar_ratio, 0.0),
        sortino_ratio: finite_or(m.sortino_ratio, 0.0),
        recovery_time_days: finite_or(m.recovery_time_days, 0.0).max(0.0),
        annual_return: finite_or(m.annual_return, 0.0),
        total_return: finite_or(m.total_return, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[f64]) -> ReturnSeries {
        let start = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        ReturnSeries::from_values(start, Duration::days(1), values)
    }

    fn assert_all_finite(m: &ComplexityMetrics) {
        for v in [
            m.sharpe_ratio,
            m.max_drawdown,
            m.volatility,
            m.win_rate,
            m.profit_factor,
            m.calmar_ratio,
            m.sortino_ratio,
            m.recovery_time_days,
            m.annual_return,
            m.total_return,
        ] {
            assert!(v.is_finite(), "non-finite metric in {:?}", m);
        }
    }

    #[test]
    fn test_empty_and_single_point_are_neutral() {
        let calc = MetricsCalculator::default();
        assert_eq!(calc.compute(&series(&[])), ComplexityMetrics::neutral());
        assert_eq!(calc.compute(&series(&[100.0])), ComplexityMetrics::neutral());
    }

    #[test]
    fn test_flat_series_has_no_infinities() {
        let calc = MetricsCalculator::default();
        let m = calc.compute(&series(&[100.0; 60]));
        assert_all_finite(&m);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.calmar_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.volatility, 0.0);
        assert_eq!(m.profit_factor, 0.0);
    }

    #[test]
    fn test_constant_growth_rate_is_not_amplified_by_rounding() {
        let values: Vec<f64> = (0..100).map(|i| 100.0 * 1.001_f64.powi(i)).collect();
        let m = MetricsCalculator::default().compute(&series(&values));
        assert_all_finite(&m);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, RATIO_CAP);
        assert_eq!(m.profit_factor, RATIO_CAP);
        assert_eq!(m.win_rate, 1.0);
    }

    #[test]
    fn test_drawdown_and_recovery() {
        // peak 120, trough 90 => -25%; two episodes of 2 and 1 periods
        let values = [100.0, 120.0, 90.0, 100.0, 130.0, 125.0, 140.0];
        assert!((max_drawdown(&values) + 0.25).abs() < 1e-12);
        assert!((recovery_time(&values) - 1.5).abs() < 1e-12);

        let m = MetricsCalculator::default().compute(&series(&values));
        assert!((m.max_drawdown + 0.25).abs() < 1e-12);
        assert!(m.calmar_ratio > 0.0);
        assert!(m.win_rate > 0.5 && m.win_rate < 1.0);
    }

    #[test]
    fn test_unrecovered_drawdown_counts_as_episode() {
        let values = [100.0, 90.0, 80.0, 85.0];
        assert!((recovery_time(&values) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_profit_factor_ratio() {
        // +10%, -5%
        let values = [100.0, 110.0, 104.5];
        let m = MetricsCalculator::default().compute(&series(&values));
        assert!((m.profit_factor - 2.0).abs() < 1e-9);
        assert!((m.win_rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_linear_doubling_has_large_finite_sharpe() {
        let values: Vec<f64> = (0..252).map(|i| 100.0 + 100.0 * i as f64 / 251.0).collect();
        let m = MetricsCalculator::default().compute(&series(&values));
        assert_all_finite(&m);
        assert!(m.sharpe_ratio > 2.5);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.recovery_time_days, 0.0);
        assert!(m.volatility < 0.1);
        assert!((m.total_return - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_points_are_ignored() {
        let clean = MetricsCalculator::default().compute(&series(&[100.0, 101.0, 99.0, 102.0]));
        let dirty = MetricsCalculator::default()
            .compute(&series(&[100.0, f64::NAN, 101.0, 0.0, 99.0, 102.0]));
        assert_eq!(clean, dirty);
    }
}
