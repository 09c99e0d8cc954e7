use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::ComplexityError;

/// One observation of a price-like cumulative value index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered cumulative-value series (an equity curve, not raw returns).
///
/// Expected: timestamps strictly increasing and values > 0. The series is
/// not rejected on construction; `validate_return_series` in the analyzer
/// crate reports violations and the metrics calculator ignores invalid points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnSeries {
    pub points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn new(points: Vec<ReturnPoint>) -> Self {
        Self { points }
    }

    /// Build a series from raw values spaced `step` apart starting at `start`.
    pub fn from_values(start: DateTime<Utc>, step: Duration, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| ReturnPoint {
                timestamp: start + step * i as i32,
                value,
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Values that can take part in return calculations (finite and > 0).
    pub fn valid_values(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| p.value)
            .filter(|v| v.is_finite() && *v > 0.0)
            .collect()
    }

    /// Period-over-period percent changes of the valid values.
    pub fn pct_changes(&self) -> Vec<f64> {
        self.valid_values()
            .windows(2)
            .map(|w| w[1] / w[0] - 1.0)
            .collect()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }
}

/// Sampling granularity a return series is evaluated at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
    #[serde(rename = "1M")]
    Month1,
}

impl Timeframe {
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
            Timeframe::Day1 => 1440,
            Timeframe::Week1 => 10080,
            Timeframe::Month1 => 43200,
        }
    }

    /// Get the duration represented by one bar
    pub fn to_duration(&self) -> Duration {
        Duration::minutes(self.to_minutes())
    }

    /// Wire label
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
            Timeframe::Month1 => "1M",
        }
    }

    /// Minimum number of points a series needs before it is scored.
    pub fn min_points(&self) -> usize {
        match self {
            Timeframe::Minute1 => 390,
            Timeframe::Minute5 => 200,
            Timeframe::Minute15 => 100,
            Timeframe::Minute30 => 100,
            Timeframe::Hour1 => 100,
            Timeframe::Hour4 => 60,
            Timeframe::Day1 => 30,
            Timeframe::Week1 => 26,
            Timeframe::Month1 => 12,
        }
    }

    /// Minimum lookback window, in calendar days.
    pub fn min_lookback_days(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute5 => 3,
            Timeframe::Minute15 => 5,
            Timeframe::Minute30 => 7,
            Timeframe::Hour1 => 14,
            Timeframe::Hour4 => 30,
            Timeframe::Day1 => 60,
            Timeframe::Week1 => 180,
            Timeframe::Month1 => 365,
        }
    }

    /// All available timeframes
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::Minute1,
            Timeframe::Minute5,
            Timeframe::Minute15,
            Timeframe::Minute30,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Day1,
            Timeframe::Week1,
            Timeframe::Month1,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = ComplexityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1M" (month) and "1m" (minute) differ only by case, so match exactly first.
        if let Some(tf) = Timeframe::all().into_iter().find(|tf| tf.label() == s) {
            return Ok(tf);
        }
        match s.to_ascii_lowercase().as_str() {
            "1min" => Ok(Timeframe::Minute1),
            "5min" => Ok(Timeframe::Minute5),
            "15min" => Ok(Timeframe::Minute15),
            "30min" => Ok(Timeframe::Minute30),
            "1hour" | "60m" => Ok(Timeframe::Hour1),
            "4hour" => Ok(Timeframe::Hour4),
            "daily" | "1day" => Ok(Timeframe::Day1),
            "weekly" | "1week" => Ok(Timeframe::Week1),
            "monthly" | "1month" | "1mo" => Ok(Timeframe::Month1),
            _ => Err(ComplexityError::InvalidParameter(format!("Unknown timeframe: {s}"))),
        }
    }
}

/// Strategy definition as far as complexity scoring is concerned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
}

impl StrategyParams {
    /// Proxy for how many knobs the strategy exposes.
    pub fn param_count(&self) -> usize {
        self.indicators.len() + self.rules.len() + self.filters.len()
    }
}

/// Risk-adjusted performance metrics derived from one return series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub sharpe_ratio: f64,
    /// Always <= 0
    pub max_drawdown: f64,
    pub volatility: f64,
    /// 0.0 to 1.0
    pub win_rate: f64,
    pub profit_factor: f64,
    pub calmar_ratio: f64,
    pub sortino_ratio: f64,
    pub recovery_time_days: f64,
    #[serde(default)]
    pub annual_return: f64,
    #[serde(default)]
    pub total_return: f64,
}

impl ComplexityMetrics {
    /// Metrics for a series that carries no signal.
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// How a strategy relates to a benchmark series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub correlation: f64,
    pub beta: f64,
    /// Annualized Jensen-style alpha
    pub alpha: f64,
    /// Strategy annual return minus benchmark annual return
    pub excess_return: f64,
}

/// Complexity grade for a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// 1 to 10
    pub level: u8,
    pub metrics: ComplexityMetrics,
    pub performance_score: f64,
    pub risk_score: f64,
    pub efficiency_score: f64,
    pub overall_score: f64,
    pub recommendation: String,
    /// 0 to 100
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkComparison>,
}

/// Caller appetite used when picking among complexity levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskPreference {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskPreference {
    /// (risk, performance, efficiency) weights
    pub fn weights(&self) -> (f64, f64, f64) {
        match self {
            RiskPreference::Conservative => (0.6, 0.3, 0.1),
            RiskPreference::Balanced => (0.4, 0.4, 0.2),
            RiskPreference::Aggressive => (0.2, 0.6, 0.2),
        }
    }
}

impl FromStr for RiskPreference {
    type Err = ComplexityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskPreference::Conservative),
            "balanced" => Ok(RiskPreference::Balanced),
            "aggressive" => Ok(RiskPreference::Aggressive),
            other => Err(ComplexityError::InvalidParameter(format!(
                "Unknown risk preference: {other}"
            ))),
        }
    }
}

/// Metric a constraint is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    SharpeRatio,
    MaxDrawdown,
    Volatility,
    WinRate,
    ProfitFactor,
    ComplexityLevel,
    AnnualReturn,
    RiskScore,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::SharpeRatio => "sharpe_ratio",
            MetricKey::MaxDrawdown => "max_drawdown",
            MetricKey::Volatility => "volatility",
            MetricKey::WinRate => "win_rate",
            MetricKey::ProfitFactor => "profit_factor",
            MetricKey::ComplexityLevel => "complexity_level",
            MetricKey::AnnualReturn => "annual_return",
            MetricKey::RiskScore => "risk_score",
        }
    }
}

/// Named metric values a constraint set is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricValues(BTreeMap<MetricKey, f64>);

impl MetricValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: MetricKey, value: f64) -> Self {
        self.0.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: MetricKey, value: f64) {
        self.0.insert(key, value);
    }

    pub fn get(&self, key: MetricKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_metrics(metrics: &ComplexityMetrics) -> Self {
        Self::new()
            .with(MetricKey::SharpeRatio, metrics.sharpe_ratio)
            .with(MetricKey::MaxDrawdown, metrics.max_drawdown)
            .with(MetricKey::Volatility, metrics.volatility)
            .with(MetricKey::WinRate, metrics.win_rate)
            .with(MetricKey::ProfitFactor, metrics.profit_factor)
            .with(MetricKey::AnnualReturn, metrics.annual_return)
    }

    /// Full metric set for a strategy variant evaluated at `level`.
    pub fn from_score(score: &ComplexityScore, level: u8) -> Self {
        Self::from_metrics(&score.metrics)
            .with(MetricKey::ComplexityLevel, f64::from(level))
            .with(MetricKey::RiskScore, score.risk_score)
    }
}

/// Kind of limit a constraint expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    MinSharpe,
    MaxDrawdown,
    MaxVolatility,
    MinWinRate,
    MinProfitFactor,
    MaxComplexity,
    MinComplexity,
    TargetReturn,
    RiskLimit,
}

impl ConstraintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintType::MinSharpe => "MIN_SHARPE",
            ConstraintType::MaxDrawdown => "MAX_DRAWDOWN",
            ConstraintType::MaxVolatility => "MAX_VOLATILITY",
            ConstraintType::MinWinRate => "MIN_WIN_RATE",
            ConstraintType::MinProfitFactor => "MIN_PROFIT_FACTOR",
            ConstraintType::MaxComplexity => "MAX_COMPLEXITY",
            ConstraintType::MinComplexity => "MIN_COMPLEXITY",
            ConstraintType::TargetReturn => "TARGET_RETURN",
            ConstraintType::RiskLimit => "RISK_LIMIT",
        }
    }

    /// The single metric this constraint type is checked against.
    pub fn metric_key(&self) -> MetricKey {
        match self {
            ConstraintType::MinSharpe => MetricKey::SharpeRatio,
            ConstraintType::MaxDrawdown => MetricKey::MaxDrawdown,
            ConstraintType::MaxVolatility => MetricKey::Volatility,
            ConstraintType::MinWinRate => MetricKey::WinRate,
            ConstraintType::MinProfitFactor => MetricKey::ProfitFactor,
            ConstraintType::MaxComplexity | ConstraintType::MinComplexity => {
                MetricKey::ComplexityLevel
            }
            ConstraintType::TargetReturn => MetricKey::AnnualReturn,
            ConstraintType::RiskLimit => MetricKey::RiskScore,
        }
    }

    /// Operator used when a constraint does not name one. Drawdowns are
    /// negative, so a maximum drawdown is a lower bound on the value.
    pub fn default_operator(&self) -> ConstraintOperator {
        match self {
            ConstraintType::MaxVolatility | ConstraintType::MaxComplexity => ConstraintOperator::Le,
            ConstraintType::MinSharpe
            | ConstraintType::MaxDrawdown
            | ConstraintType::MinWinRate
            | ConstraintType::MinProfitFactor
            | ConstraintType::MinComplexity
            | ConstraintType::TargetReturn
            | ConstraintType::RiskLimit => ConstraintOperator::Ge,
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintType {
    type Err = ComplexityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MIN_SHARPE" => Ok(ConstraintType::MinSharpe),
            "MAX_DRAWDOWN" => Ok(ConstraintType::MaxDrawdown),
            "MAX_VOLATILITY" => Ok(ConstraintType::MaxVolatility),
            "MIN_WIN_RATE" => Ok(ConstraintType::MinWinRate),
            "MIN_PROFIT_FACTOR" => Ok(ConstraintType::MinProfitFactor),
            "MAX_COMPLEXITY" => Ok(ConstraintType::MaxComplexity),
            "MIN_COMPLEXITY" => Ok(ConstraintType::MinComplexity),
            "TARGET_RETURN" => Ok(ConstraintType::TargetReturn),
            "RISK_LIMIT" => Ok(ConstraintType::RiskLimit),
            other => Err(ComplexityError::InvalidParameter(format!(
                "Unknown constraint type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintOperator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
}

impl ConstraintOperator {
    const EQ_TOLERANCE: f64 = 1e-9;

    pub fn symbol(&self) -> &'static str {
        match self {
            ConstraintOperator::Lt => "<",
            ConstraintOperator::Le => "<=",
            ConstraintOperator::Gt => ">",
            ConstraintOperator::Ge => ">=",
            ConstraintOperator::Eq => "==",
        }
    }

    /// `value {op} threshold`
    pub fn apply(&self, value: f64, threshold: f64) -> bool {
        match self {
            ConstraintOperator::Lt => value < threshold,
            ConstraintOperator::Le => value <= threshold,
            ConstraintOperator::Gt => value > threshold,
            ConstraintOperator::Ge => value >= threshold,
            ConstraintOperator::Eq => (value - threshold).abs() <= Self::EQ_TOLERANCE,
        }
    }
}

impl fmt::Display for ConstraintOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ConstraintOperator {
    type Err = ComplexityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "<" => Ok(ConstraintOperator::Lt),
            "<=" => Ok(ConstraintOperator::Le),
            ">" => Ok(ConstraintOperator::Gt),
            ">=" => Ok(ConstraintOperator::Ge),
            "==" | "=" => Ok(ConstraintOperator::Eq),
            other => Err(ComplexityError::InvalidParameter(format!(
                "Unknown operator: {other}"
            ))),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A caller-defined limit on a strategy metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<ConstraintOperator>,
    pub value: f64,
    #[serde(default, alias = "is_hard_constraint")]
    pub is_hard: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Constraint {
    pub fn hard(constraint_type: ConstraintType, value: f64) -> Self {
        Self {
            constraint_type,
            operator: None,
            value,
            is_hard: true,
            weight: 1.0,
        }
    }

    pub fn soft(constraint_type: ConstraintType, value: f64) -> Self {
        Self {
            is_hard: false,
            ..Self::hard(constraint_type, value)
        }
    }

    pub fn with_operator(mut self, operator: ConstraintOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Explicit operator, or the type's default when none was given.
    pub fn effective_operator(&self) -> ConstraintOperator {
        self.operator
            .unwrap_or_else(|| self.constraint_type.default_operator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pct_changes_skip_invalid_points() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let series = ReturnSeries::from_values(
            start,
            Duration::days(1),
            &[100.0, f64::NAN, 110.0, -5.0, 121.0],
        );
        let changes = series.pct_changes();
        assert_eq!(changes.len(), 2);
        assert!((changes[0] - 0.1).abs() < 1e-12);
        assert!((changes[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_timeframe_labels_round_trip() {
        for tf in Timeframe::all() {
            assert_eq!(tf.label().parse::<Timeframe>().unwrap(), tf);
        }
        assert_eq!("1M".parse::<Timeframe>().unwrap(), Timeframe::Month1);
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::Minute1);
        assert_eq!("daily".parse::<Timeframe>().unwrap(), Timeframe::Day1);
        assert!("2y".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::Minute5.to_duration(), Duration::minutes(5));
        assert_eq!(Timeframe::Hour1.to_duration(), Duration::hours(1));
        assert_eq!(Timeframe::Day1.to_duration(), Duration::days(1));
    }

    #[test]
    fn test_constraint_wire_format() {
        let c: Constraint = serde_json::from_str(
            r#"{"type":"MIN_SHARPE","operator":">=","value":1.5,"is_hard_constraint":true}"#,
        )
        .unwrap();
        assert_eq!(c.constraint_type, ConstraintType::MinSharpe);
        assert_eq!(c.effective_operator(), ConstraintOperator::Ge);
        assert!(c.is_hard);
        assert_eq!(c.weight, 1.0);

        let c: Constraint = serde_json::from_str(r#"{"type":"MAX_COMPLEXITY","value":3}"#).unwrap();
        assert!(!c.is_hard);
        assert_eq!(c.effective_operator(), ConstraintOperator::Le);
    }

    #[test]
    fn test_every_constraint_type_maps_to_metric() {
        let types = [
            ConstraintType::MinSharpe,
            ConstraintType::MaxDrawdown,
            ConstraintType::MaxVolatility,
            ConstraintType::MinWinRate,
            ConstraintType::MinProfitFactor,
            ConstraintType::MaxComplexity,
            ConstraintType::MinComplexity,
            ConstraintType::TargetReturn,
            ConstraintType::RiskLimit,
        ];
        for t in types {
            assert_eq!(t.as_str().parse::<ConstraintType>().unwrap(), t);
            let _ = t.metric_key();
        }
        assert_eq!(ConstraintType::MaxComplexity.metric_key(), MetricKey::ComplexityLevel);
    }

    #[test]
    fn test_operator_apply() {
        assert!(ConstraintOperator::Ge.apply(1.5, 1.5));
        assert!(!ConstraintOperator::Gt.apply(1.5, 1.5));
        assert!(ConstraintOperator::Lt.apply(1.0, 1.5));
        assert!(ConstraintOperator::Eq.apply(0.1 + 0.2, 0.3));
        assert!("=>".parse::<ConstraintOperator>().is_err());
    }

    #[test]
    fn test_metric_values_from_json() {
        let values: MetricValues = serde_json::from_str(r#"{"sharpe_ratio":1.2}"#).unwrap();
        assert_eq!(values.get(MetricKey::SharpeRatio), Some(1.2));
        assert_eq!(values.get(MetricKey::WinRate), None);
    }

    #[test]
    fn test_risk_preference_weights_sum_to_one() {
        for pref in [
            RiskPreference::Conservative,
            RiskPreference::Balanced,
            RiskPreference::Aggressive,
        ] {
            let (r, p, e) = pref.weights();
            assert!((r + p + e - 1.0).abs() < 1e-12);
        }
    }
}
