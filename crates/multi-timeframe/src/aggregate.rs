use std::collections::BTreeMap;

use analysis_core::stats::{mean, population_std_dev};
use analysis_core::{Constraint, Timeframe};
use chrono::Utc;
use complexity_analyzer::feasible_complexity_bounds;

use crate::optimizer::DEFAULT_LEVEL;
use crate::{MultiTimeframeResult, TimeframeResult};

/// Level spread (std of optimal levels) at which consistency reaches zero
const LEVEL_SPREAD_SCALE: f64 = 3.0;
/// Score spread (std of optimal scores) at which consistency reaches zero
const SCORE_SPREAD_SCALE: f64 = 25.0;
const SHARPE_GAP_SCALE: f64 = 3.0;
const DRAWDOWN_GAP_SCALE: f64 = 0.5;

/// Combine per-timeframe sweeps into one recommendation.
///
/// Rejected timeframes are carried in the output but ignored everywhere
/// else. `weights` defaults to uniform and is normalized over the remaining
/// timeframes. Missing or non-positive weights count as zero; when nothing
/// is left the weights fall back to uniform.
pub fn aggregate_results(
    strategy_id: &str,
    results: BTreeMap<Timeframe, TimeframeResult>,
    weights: Option<&BTreeMap<Timeframe, f64>>,
    constraints: &[Constraint],
    warnings: Vec<String>,
) -> MultiTimeframeResult {
    let scored: Vec<(Timeframe, &TimeframeResult)> = results
        .iter()
        .filter(|(_, r)| !r.rejected)
        .map(|(tf, r)| (*tf, r))
        .collect();

    let weights = normalize_weights(&scored, weights);
    let weight_of = |tf: &Timeframe| weights.get(tf).copied().unwrap_or(0.0);

    let weighted_complexity = if scored.is_empty() {
        f64::from(DEFAULT_LEVEL)
    } else {
        scored
            .iter()
            .map(|(tf, r)| weight_of(tf) * f64::from(r.optimal_complexity))
            .sum()
    };

    let optimal_complexity = match feasible_complexity_bounds(constraints) {
        Some((low, high)) => {
            let mut best: Option<(u8, f64)> = None;
            for level in low..=high {
                let aggregate: f64 = scored
                    .iter()
                    .filter_map(|(tf, r)| {
                        let score = r.all_scores.get(&level)?;
                        let satisfaction =
                            r.level_constraint_scores.get(&level).copied().unwrap_or(100.0);
                        Some(weight_of(tf) * score * satisfaction / 100.0)
                    })
                    .sum();
                if aggregate > 0.0 && best.map_or(true, |(_, b)| aggregate > b) {
                    best = Some((level, aggregate));
                }
            }
            best.map(|(level, _)| level)
                .unwrap_or_else(|| DEFAULT_LEVEL.clamp(low, high))
        }
        None => DEFAULT_LEVEL,
    };

    let timeframe_correlation = correlations(&scored);
    let consistency_score = consistency(&scored);

    let scores: Vec<f64> = scored.iter().map(|(_, r)| r.optimal_score).collect();
    let satisfaction: Vec<f64> = scored.iter().map(|(_, r)| r.constraint_satisfaction).collect();
    let confidence_score = if scored.is_empty() {
        0.0
    } else {
        (0.4 * mean(&scores) / 100.0 + 0.4 * consistency_score + 0.2 * mean(&satisfaction) / 100.0)
            .clamp(0.0, 1.0)
    };

    let success = scored.iter().any(|(_, r)| !r.used_fallback);

    MultiTimeframeResult {
        strategy_id: strategy_id.to_string(),
        timeframe_results: results,
        weights,
        weighted_complexity,
        optimal_complexity,
        consistency_score,
        confidence_score,
        timeframe_correlation,
        warnings,
        success,
        generated_at: Utc::now(),
    }
}

fn normalize_weights(
    scored: &[(Timeframe, &TimeframeResult)],
    weights: Option<&BTreeMap<Timeframe, f64>>,
) -> BTreeMap<Timeframe, f64> {
    let raw: BTreeMap<Timeframe, f64> = scored
        .iter()
        .map(|(tf, _)| {
            let w = match weights {
                Some(w) => w.get(tf).copied().filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0),
                None => 1.0,
            };
            (*tf, w)
        })
        .collect();

    let total: f64 = raw.values().sum();
    if total > 0.0 {
        raw.into_iter().map(|(tf, w)| (tf, w / total)).collect()
    } else if scored.is_empty() {
        BTreeMap::new()
    } else {
        let uniform = 1.0 / scored.len() as f64;
        scored.iter().map(|(tf, _)| (*tf, uniform)).collect()
    }
}

/// Pairwise similarity of risk profiles between successful timeframes.
fn correlations(scored: &[(Timeframe, &TimeframeResult)]) -> BTreeMap<String, f64> {
    let successful: Vec<_> = scored
        .iter()
        .filter(|(_, r)| !r.used_fallback)
        .filter_map(|(tf, r)| r.metrics.map(|m| (*tf, m)))
        .collect();

    let mut out = BTreeMap::new();
    for (i, (tf_a, a)) in successful.iter().enumerate() {
        for (tf_b, b) in &successful[i + 1..] {
            let similarity = 1.0
                - (a.sharpe_ratio - b.sharpe_ratio).abs() / SHARPE_GAP_SCALE
                - (a.max_drawdown - b.max_drawdown).abs() / DRAWDOWN_GAP_SCALE;
            out.insert(format!("{}:{}", tf_a, tf_b), similarity.max(0.0));
        }
    }
    out
}

fn consistency(scored: &[(Timeframe, &TimeframeResult)]) -> f64 {
    match scored.len() {
        0 => 0.0,
        1 => 1.0,
        _ => {
            let levels: Vec<f64> = scored.iter().map(|(_, r)| f64::from(r.optimal_complexity)).collect();
            let scores: Vec<f64> = scored.iter().map(|(_, r)| r.optimal_score).collect();
            let level_part = (1.0 - population_std_dev(&levels) / LEVEL_SPREAD_SCALE).clamp(0.0, 1.0);
            let score_part = (1.0 - population_std_dev(&scores) / SCORE_SPREAD_SCALE).clamp(0.0, 1.0);
            0.6 * level_part + 0.4 * score_part
        }
    }
}
