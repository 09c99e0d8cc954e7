pub mod aggregate;
pub mod optimizer;
pub mod provider;
pub mod simulator;

pub use aggregate::aggregate_results;
pub use optimizer::{MultiTimeframeOptimizer, DEFAULT_LEVEL};
pub use provider::StaticReturnsProvider;
pub use simulator::{BandedStrategySimulator, SimulationOutput, StrategySimulator};

use analysis_core::{ComplexityMetrics, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of the complexity sweep on one timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeResult {
    pub timeframe: Timeframe,
    pub optimal_complexity: u8,
    pub optimal_score: f64,
    /// Overall score per simulated complexity level
    pub all_scores: BTreeMap<u8, f64>,
    /// Constraint satisfaction (0-100) per simulated complexity level
    #[serde(default)]
    pub level_constraint_scores: BTreeMap<u8, f64>,
    /// Constraint satisfaction (0-100) of the chosen level
    pub constraint_satisfaction: f64,
    pub constraints_satisfied: bool,
    #[serde(default)]
    pub violations: Vec<String>,
    pub metrics: Option<ComplexityMetrics>,
    pub used_fallback: bool,
    /// The series failed validation; the timeframe carries only `error` and
    /// takes no part in the aggregate.
    #[serde(default)]
    pub rejected: bool,
    pub error: Option<String>,
}

impl TimeframeResult {
    /// Result for a timeframe whose series was refused before scoring.
    pub fn rejected(timeframe: Timeframe, error: String) -> Self {
        Self {
            timeframe,
            optimal_complexity: 0,
            optimal_score: 0.0,
            all_scores: BTreeMap::new(),
            level_constraint_scores: BTreeMap::new(),
            constraint_satisfaction: 0.0,
            constraints_satisfied: false,
            violations: Vec::new(),
            metrics: None,
            used_fallback: false,
            rejected: true,
            error: Some(error),
        }
    }
}

/// Combined optimization outcome across timeframes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframeResult {
    pub strategy_id: String,
    pub timeframe_results: BTreeMap<Timeframe, TimeframeResult>,
    /// Normalized weights actually applied
    pub weights: BTreeMap<Timeframe, f64>,
    pub weighted_complexity: f64,
    pub optimal_complexity: u8,
    /// 0.0 to 1.0
    pub consistency_score: f64,
    /// 0.0 to 1.0
    pub confidence_score: f64,
    /// Similarity of results between timeframe pairs, keyed "a:b"
    pub timeframe_correlation: BTreeMap<String, f64>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub success: bool,
    pub generated_at: DateTime<Utc>,
}
