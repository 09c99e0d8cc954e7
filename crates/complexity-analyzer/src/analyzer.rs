use std::collections::{BTreeMap, HashMap};

use analysis_core::stats::{beta, finite_or, mean, pearson_correlation};
use analysis_core::{
    BenchmarkComparison, ComplexityError, ComplexityScore, ReturnSeries, RiskPreference,
    StrategyParams,
};
use rayon::prelude::*;
use tracing::debug;

use crate::metrics::MetricsCalculator;
use crate::scorer::{ComplexityScorer, MAX_LEVEL, MIN_LEVEL};

/// Minimum number of aligned returns for a benchmark comparison
const MIN_BENCHMARK_OVERLAP: usize = 3;

/// Entry point for scoring strategy return series.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityAnalyzer {
    calculator: MetricsCalculator,
    scorer: ComplexityScorer,
}

impl ComplexityAnalyzer {
    pub fn new(calculator: MetricsCalculator) -> Self {
        Self {
            calculator,
            scorer: ComplexityScorer::new(),
        }
    }

    pub fn calculator(&self) -> &MetricsCalculator {
        &self.calculator
    }

    pub fn scorer(&self) -> &ComplexityScorer {
        &self.scorer
    }

    /// Score one return series, optionally relative to a benchmark.
    pub fn analyze(
        &self,
        returns: &ReturnSeries,
        params: &StrategyParams,
        benchmark: Option<&ReturnSeries>,
    ) -> Result<ComplexityScore, ComplexityError> {
        let metrics = self.calculator.compute(returns);
        let mut score = self.scorer.score(&metrics, params);

        if let Some(bench) = benchmark {
            score.benchmark = self.compare_to_benchmark(returns, bench);
        }

        if !score.overall_score.is_finite() || !score.confidence.is_finite() {
            return Err(ComplexityError::CalculationError(format!(
                "non-finite score for series of {} points",
                returns.len()
            )));
        }

        debug!(
            "Scored series ({} points): level {} overall {:.1}",
            returns.len(),
            score.level,
            score.overall_score
        );
        Ok(score)
    }

    /// Score several strategy variants keyed by their complexity level.
    pub fn compare(
        &self,
        returns_by_level: &BTreeMap<u8, ReturnSeries>,
        params: &StrategyParams,
    ) -> Result<BTreeMap<u8, ComplexityScore>, ComplexityError> {
        if let Some(level) = returns_by_level
            .keys()
            .find(|l| !(MIN_LEVEL..=MAX_LEVEL).contains(*l))
        {
            return Err(ComplexityError::InvalidParameter(format!(
                "Complexity level {} is outside {}..={}",
                level, MIN_LEVEL, MAX_LEVEL
            )));
        }

        returns_by_level
            .par_iter()
            .map(|(&level, series)| self.analyze(series, params, None).map(|s| (level, s)))
            .collect()
    }

    /// Pick the level whose scores best match the caller's risk appetite.
    /// Ties resolve to the lower level.
    pub fn find_optimal(
        &self,
        returns_by_level: &BTreeMap<u8, ReturnSeries>,
        params: &StrategyParams,
        preference: RiskPreference,
    ) -> Result<(u8, ComplexityScore), ComplexityError> {
        if returns_by_level.is_empty() {
            return Err(ComplexityError::insufficient(
                "all",
                "no strategy variants supplied",
            ));
        }

        let scores = self.compare(returns_by_level, params)?;
        let (risk_w, perf_w, eff_w) = preference.weights();

        let mut best: Option<(u8, f64)> = None;
        for (&level, score) in &scores {
            let weighted = risk_w * score.risk_score
                + perf_w * score.performance_score
                + eff_w * score.efficiency_score;
            match best {
                Some((_, best_value)) if weighted <= best_value => {}
                _ => best = Some((level, weighted)),
            }
        }

        let (level, _) = best.ok_or_else(|| {
            ComplexityError::CalculationError("no level could be ranked".to_string())
        })?;
        let score = scores
            .get(&level)
            .cloned()
            .ok_or_else(|| ComplexityError::CalculationError(format!("missing level {level}")))?;
        Ok((level, score))
    }

    /// Correlation, beta and alpha over timestamps both series share.
    fn compare_to_benchmark(
        &self,
        returns: &ReturnSeries,
        benchmark: &ReturnSeries,
    ) -> Option<BenchmarkComparison> {
        let bench_by_time: HashMap<_, f64> = benchmark
            .points
            .iter()
            .filter(|p| p.value.is_finite() && p.value > 0.0)
            .map(|p| (p.timestamp, p.value))
            .collect();

        let aligned: Vec<(f64, f64)> = returns
            .points
            .iter()
            .filter(|p| p.value.is_finite() && p.value > 0.0)
            .filter_map(|p| bench_by_time.get(&p.timestamp).map(|&b| (p.value, b)))
            .collect();

        let (strategy, bench): (Vec<f64>, Vec<f64>) = aligned
            .windows(2)
            .map(|w| (w[1].0 / w[0].0 - 1.0, w[1].1 / w[0].1 - 1.0))
            .unzip();

        if strategy.len() < MIN_BENCHMARK_OVERLAP {
            return None;
        }

        let periods = self.calculator.periods_per_year();
        let rf = self.calculator.risk_free_rate() / periods;
        let b = beta(&strategy, &bench);
        let mean_s = mean(&strategy);
        let mean_b = mean(&bench);

        Some(BenchmarkComparison {
            correlation: pearson_correlation(&strategy, &bench),
            beta: b,
            alpha: finite_or((mean_s - (rf + b * (mean_b - rf))) * periods, 0.0),
            excess_return: finite_or((mean_s - mean_b) * periods, 0.0),
        })
    }
}
