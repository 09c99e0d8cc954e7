use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analysis_core::{
    ComplexityError, Constraint, MetricValues, ReturnSeries, ReturnsProvider, StrategyParams,
    Timeframe,
};
use complexity_analyzer::{
    validate_return_series, ComplexityAnalyzer, ConstraintEngine, ConstraintValidator,
    FallbackComplexityScorer, MAX_LEVEL, MIN_LEVEL,
};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate_results;
use crate::simulator::{BandedStrategySimulator, StrategySimulator};
use crate::{MultiTimeframeResult, TimeframeResult};

/// Level reported when no better choice can be made
pub const DEFAULT_LEVEL: u8 = 5;
/// Longest lookback accepted, about a century
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Raises the flag when dropped, so blocking work spawned by a future that
/// was abandoned (for example by a timeout) stops at its next check.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Per-level outcome of a sweep
#[derive(Debug)]
struct LevelOutcome {
    level: u8,
    overall: f64,
    constraint_score: f64,
    satisfied: bool,
    violations: Vec<String>,
    metrics: analysis_core::ComplexityMetrics,
}

/// Searches complexity levels 1-10 on several timeframes and combines the
/// per-timeframe optima.
#[derive(Clone)]
pub struct MultiTimeframeOptimizer {
    provider: Arc<dyn ReturnsProvider>,
    simulator: Arc<dyn StrategySimulator>,
    analyzer: ComplexityAnalyzer,
    engine: ConstraintEngine,
    validator: ConstraintValidator,
    fallback: FallbackComplexityScorer,
}

impl MultiTimeframeOptimizer {
    pub fn new(provider: Arc<dyn ReturnsProvider>) -> Self {
        Self {
            provider,
            simulator: Arc::new(BandedStrategySimulator::new()),
            analyzer: ComplexityAnalyzer::default(),
            engine: ConstraintEngine::new(),
            validator: ConstraintValidator::new(),
            fallback: FallbackComplexityScorer::default(),
        }
    }

    pub fn with_simulator(mut self, simulator: Arc<dyn StrategySimulator>) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn with_analyzer(mut self, analyzer: ComplexityAnalyzer) -> Self {
        self.analyzer = analyzer;
        self.fallback = FallbackComplexityScorer::new(*analyzer.calculator());
        self
    }

    /// Run the full optimization. Invalid input fails the whole call. A
    /// series that fails validation is rejected and left out of the
    /// aggregate; fetch or scoring failures on a single timeframe are
    /// replaced by a fallback estimate for that timeframe only.
    pub async fn optimize(
        &self,
        strategy_id: &str,
        timeframes: &[Timeframe],
        lookback_days: i64,
        constraints: &[Constraint],
        weights: Option<&BTreeMap<Timeframe, f64>>,
    ) -> Result<MultiTimeframeResult, ComplexityError> {
        let warnings = self.validator.validate_constraints(constraints)?;

        let timeframes: Vec<Timeframe> = timeframes
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if timeframes.is_empty() {
            return Err(ComplexityError::InvalidParameter(
                "At least one timeframe is required".to_string(),
            ));
        }
        if lookback_days <= 0 || lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ComplexityError::InvalidParameter(format!(
                "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {lookback_days}"
            )));
        }
        if let Some(weights) = weights {
            validate_weights(&timeframes, weights)?;
        }

        info!(
            "Optimizing {} over {} timeframes ({} day lookback, {} constraints)",
            strategy_id,
            timeframes.len(),
            lookback_days,
            constraints.len()
        );

        // Fetch all timeframes concurrently using join_all
        let fetches = timeframes.iter().map(|&timeframe| {
            let provider = Arc::clone(&self.provider);
            async move {
                debug!("Fetching {} returns for {}", timeframe, strategy_id);
                let fetched = provider.fetch_returns(strategy_id, timeframe, lookback_days).await;
                (timeframe, fetched)
            }
        });
        let fetched: Vec<(Timeframe, Result<ReturnSeries, ComplexityError>)> =
            futures::future::join_all(fetches).await;

        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        let optimizer = self.clone();
        let constraints_owned = constraints.to_vec();
        let results = tokio::task::spawn_blocking(move || {
            fetched
                .into_par_iter()
                .map(|(timeframe, series)| {
                    let result = optimizer.evaluate_timeframe(
                        timeframe,
                        series,
                        lookback_days,
                        &constraints_owned,
                        &cancelled,
                    );
                    (timeframe, result)
                })
                .collect::<BTreeMap<Timeframe, TimeframeResult>>()
        })
        .await
        .map_err(|e| ComplexityError::CalculationError(format!("timeframe workers failed: {e}")))?;

        let mut warnings = warnings;
        warnings.extend(results.values().filter(|r| r.rejected).map(|r| {
            format!(
                "{} skipped: {}",
                r.timeframe,
                r.error.as_deref().unwrap_or("series rejected")
            )
        }));

        let result = aggregate_results(strategy_id, results, weights, constraints, warnings);
        info!(
            "Optimized {}: optimal level {} (weighted {:.2}, confidence {:.2})",
            strategy_id, result.optimal_complexity, result.weighted_complexity, result.confidence_score
        );
        Ok(result)
    }

    /// `optimize` bounded by a deadline.
    pub async fn optimize_within(
        &self,
        timeout: Duration,
        strategy_id: &str,
        timeframes: &[Timeframe],
        lookback_days: i64,
        constraints: &[Constraint],
        weights: Option<&BTreeMap<Timeframe, f64>>,
    ) -> Result<MultiTimeframeResult, ComplexityError> {
        tokio::time::timeout(
            timeout,
            self.optimize(strategy_id, timeframes, lookback_days, constraints, weights),
        )
        .await
        .map_err(|_| ComplexityError::OptimizationTimeout {
            seconds: timeout.as_secs(),
        })?
    }

    /// Fallback estimate for a whole strategy, used when optimization cannot
    /// finish in time.
    pub fn fallback_score(&self, returns: Option<&ReturnSeries>) -> analysis_core::ComplexityScore {
        self.fallback
            .score(&self.simulator.params_for_level(DEFAULT_LEVEL), returns)
    }

    fn evaluate_timeframe(
        &self,
        timeframe: Timeframe,
        fetched: Result<ReturnSeries, ComplexityError>,
        lookback_days: i64,
        constraints: &[Constraint],
        cancelled: &AtomicBool,
    ) -> TimeframeResult {
        let series = match fetched {
            Ok(series) => series,
            Err(e) => {
                warn!("Fetching {} returns failed: {}", timeframe, e);
                return self.fallback_result(timeframe, None, constraints, e);
            }
        };

        if let Err(e) = validate_return_series(&series, timeframe, lookback_days) {
            warn!("Rejected {} series: {}", timeframe, e);
            return TimeframeResult::rejected(timeframe, e.to_string());
        }

        match self.sweep_levels(&series, constraints, cancelled) {
            Ok(outcomes) => select_optimum(timeframe, outcomes, !constraints.is_empty()),
            Err(e) => {
                warn!("Scoring {} failed: {}", timeframe, e);
                self.fallback_result(timeframe, Some(&series), constraints, e)
            }
        }
    }

    fn sweep_levels(
        &self,
        series: &ReturnSeries,
        constraints: &[Constraint],
        cancelled: &AtomicBool,
    ) -> Result<Vec<LevelOutcome>, ComplexityError> {
        (MIN_LEVEL..=MAX_LEVEL)
            .into_par_iter()
            .map(|level| {
                if cancelled.load(Ordering::Relaxed) {
                    return Err(ComplexityError::CalculationError(
                        "optimization cancelled".to_string(),
                    ));
                }
                let sim = self.simulator.simulate(series, level);
                let score = self.analyzer.analyze(&sim.equity, &sim.params, None)?;
                let values = MetricValues::from_score(&score, level);
                let (satisfied, violations) = self.engine.evaluate(constraints, &values);
                Ok(LevelOutcome {
                    level,
                    overall: score.overall_score,
                    constraint_score: self.engine.score(constraints, &values),
                    satisfied,
                    violations,
                    metrics: score.metrics,
                })
            })
            .collect()
    }

    fn fallback_result(
        &self,
        timeframe: Timeframe,
        series: Option<&ReturnSeries>,
        constraints: &[Constraint],
        error: ComplexityError,
    ) -> TimeframeResult {
        let params: StrategyParams = self.simulator.params_for_level(DEFAULT_LEVEL);
        let score = self.fallback.score(&params, series);
        let values = MetricValues::from_score(&score, score.level);
        let (satisfied, violations) = self.engine.evaluate(constraints, &values);
        let constraint_satisfaction = self.engine.score(constraints, &values);
        let has_metrics = series.is_some_and(|s| s.valid_values().len() >= 2);

        TimeframeResult {
            timeframe,
            optimal_complexity: score.level,
            optimal_score: score.overall_score,
            all_scores: BTreeMap::from([(score.level, score.overall_score)]),
            level_constraint_scores: BTreeMap::from([(score.level, constraint_satisfaction)]),
            constraint_satisfaction,
            constraints_satisfied: satisfied,
            violations,
            metrics: has_metrics.then_some(score.metrics),
            used_fallback: true,
            rejected: false,
            error: Some(error.to_string()),
        }
    }
}

fn validate_weights(
    timeframes: &[Timeframe],
    weights: &BTreeMap<Timeframe, f64>,
) -> Result<(), ComplexityError> {
    for (tf, w) in weights {
        if !w.is_finite() || *w <= 0.0 {
            return Err(ComplexityError::InvalidParameter(format!(
                "Weight for {tf} must be positive, got {w}"
            )));
        }
    }
    if let Some(tf) = timeframes.iter().find(|tf| !weights.contains_key(tf)) {
        return Err(ComplexityError::InvalidParameter(format!(
            "Missing weight for timeframe {tf}"
        )));
    }
    Ok(())
}

/// Highest overall score among levels meeting every hard constraint. When
/// none do, the best constraint score wins, then the best overall score.
/// Ties go to the lower level.
fn select_optimum(
    timeframe: Timeframe,
    outcomes: Vec<LevelOutcome>,
    constrained: bool,
) -> TimeframeResult {
    let any_satisfied = outcomes.iter().any(|o| o.satisfied);

    let mut best: Option<&LevelOutcome> = None;
    for o in &outcomes {
        if any_satisfied && !o.satisfied {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) if any_satisfied || !constrained => o.overall > b.overall,
            Some(b) => {
                o.constraint_score > b.constraint_score
                    || (o.constraint_score == b.constraint_score && o.overall > b.overall)
            }
        };
        if better {
            best = Some(o);
        }
    }

    let all_scores = outcomes.iter().map(|o| (o.level, o.overall)).collect();
    let level_constraint_scores = outcomes.iter().map(|o| (o.level, o.constraint_score)).collect();

    match best {
        Some(b) => TimeframeResult {
            timeframe,
            optimal_complexity: b.level,
            optimal_score: b.overall,
            all_scores,
            level_constraint_scores,
            constraint_satisfaction: b.constraint_score,
            constraints_satisfied: b.satisfied,
            violations: b.violations.clone(),
            metrics: Some(b.metrics),
            used_fallback: false,
            rejected: false,
            error: None,
        },
        None => TimeframeResult {
            timeframe,
            optimal_complexity: DEFAULT_LEVEL,
            optimal_score: 0.0,
            all_scores,
            level_constraint_scores,
            constraint_satisfaction: 0.0,
            constraints_satisfied: false,
            violations: Vec::new(),
            metrics: None,
            used_fallback: false,
            rejected: false,
            error: None,
        },
    }
}
