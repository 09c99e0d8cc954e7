//! Strategy simulation at a given complexity level.
//!
//! A simulator turns an underlying price-like series into the equity curve
//! of a strategy built at one of the ten complexity levels. Decisions at bar
//! `t` only use closes up to and including `t`, and the position is applied
//! to the return from `t` to `t + 1`.

use analysis_core::{ReturnPoint, ReturnSeries, StrategyParams};

const STARTING_EQUITY: f64 = 100.0;

const FAST_SMA: usize = 10;
const SLOW_SMA: usize = 30;
const LONG_SMA: usize = 60;
const ROC_PERIOD: usize = 10;
const VOL_WINDOW: usize = 20;

const MIN_TREND_SPREAD: f64 = 0.001;
const STOP_LOSS: f64 = 0.05;
const STOP_COOLDOWN_BARS: usize = 5;
const TRAILING_STOP: f64 = 0.08;
const VOL_REGIME_MULTIPLIER: f64 = 1.5;
const ZSCORE_EXIT: f64 = 2.0;

/// Equity curve plus the definition of the strategy that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub equity: ReturnSeries,
    pub params: StrategyParams,
}

pub trait StrategySimulator: Send + Sync {
    /// Parameters the strategy exposes at `level`
    fn params_for_level(&self, level: u8) -> StrategyParams;

    fn simulate(&self, prices: &ReturnSeries, level: u8) -> SimulationOutput;
}

/// Trend-following strategy that gains one rule, filter or indicator per
/// level on top of an SMA crossover core.
///
/// | level | adds                                           |
/// |-------|------------------------------------------------|
/// | 1     | SMA(10) > SMA(30) trend entry and exit         |
/// | 2     | minimum trend spread filter                    |
/// | 3     | close above fast SMA confirmation              |
/// | 4     | 10-bar momentum rule                           |
/// | 5     | 5% stop loss with cooldown                     |
/// | 6     | close above SMA(60) long-trend rule            |
/// | 7     | volatility regime filter                       |
/// | 8     | 8% trailing stop                               |
/// | 9     | z-score mean-reversion exit                    |
/// | 10    | momentum acceleration filter                   |
#[derive(Debug, Clone, Copy, Default)]
pub struct BandedStrategySimulator;

impl BandedStrategySimulator {
    pub fn new() -> Self {
        Self
    }
}

impl StrategySimulator for BandedStrategySimulator {
    fn params_for_level(&self, level: u8) -> StrategyParams {
        let mut indicators = vec!["sma_10".to_string(), "sma_30".to_string()];
        let mut rules = vec!["trend_entry".to_string()];
        let mut filters = Vec::new();

        if level >= 2 {
            filters.push("trend_spread".to_string());
        }
        if level >= 3 {
            rules.push("price_confirmation".to_string());
        }
        if level >= 4 {
            indicators.push("roc_10".to_string());
            rules.push("momentum".to_string());
        }
        if level >= 5 {
            rules.push("stop_loss".to_string());
        }
        if level >= 6 {
            indicators.push("sma_60".to_string());
            rules.push("long_trend".to_string());
        }
        if level >= 7 {
            indicators.push("volatility_20".to_string());
            filters.push("volatility_regime".to_string());
        }
        if level >= 8 {
            rules.push("trailing_stop".to_string());
        }
        if level >= 9 {
            indicators.push("zscore_20".to_string());
            rules.push("mean_reversion_exit".to_string());
        }
        if level >= 10 {
            indicators.push("roc_5".to_string());
            filters.push("momentum_acceleration".to_string());
        }

        StrategyParams {
            indicators,
            rules,
            filters,
        }
    }

    fn simulate(&self, prices: &ReturnSeries, level: u8) -> SimulationOutput {
        let points: Vec<ReturnPoint> = prices
            .points
            .iter()
            .filter(|p| p.value.is_finite() && p.value > 0.0)
            .copied()
            .collect();
        let closes: Vec<f64> = points.iter().map(|p| p.value).collect();

        let positions = positions(&closes, level);
        let mut equity = Vec::with_capacity(points.len());
        let mut value = STARTING_EQUITY;
        for (i, point) in points.iter().enumerate() {
            if i > 0 && positions[i - 1] {
                value *= closes[i] / closes[i - 1];
            }
            equity.push(ReturnPoint {
                timestamp: point.timestamp,
                value,
            });
        }

        SimulationOutput {
            equity: ReturnSeries::new(equity),
            params: self.params_for_level(level),
        }
    }
}

/// Long/flat decision per bar.
fn positions(closes: &[f64], level: u8) -> Vec<bool> {
    let warmup = if level >= 6 { LONG_SMA } else { SLOW_SMA };
    let mut held = vec![false; closes.len()];

    let mut in_position = false;
    let mut entry_price = 0.0;
    let mut peak_since_entry = 0.0;
    let mut cooldown = 0usize;
    // running sum of rolling volatility, for the expanding average
    let mut vol_sum = 0.0;
    let mut vol_count = 0usize;

    for t in 0..closes.len() {
        let history = &closes[..=t];
        let close = closes[t];

        let rolling_vol = if history.len() > VOL_WINDOW {
            let v = return_std(&history[history.len() - VOL_WINDOW - 1..]);
            vol_sum += v;
            vol_count += 1;
            Some(v)
        } else {
            None
        };

        if history.len() < warmup {
            continue;
        }

        let fast = sma(history, FAST_SMA);
        let slow = sma(history, SLOW_SMA);
        let trend_up = fast > slow;

        if in_position {
            peak_since_entry = f64::max(peak_since_entry, close);
            let mut exit = !trend_up;
            if level >= 5 && close < entry_price * (1.0 - STOP_LOSS) {
                exit = true;
                cooldown = STOP_COOLDOWN_BARS;
            }
            if level >= 8 && close < peak_since_entry * (1.0 - TRAILING_STOP) {
                exit = true;
            }
            if level >= 9 {
                if let Some(z) = zscore(history, VOL_WINDOW) {
                    exit |= z > ZSCORE_EXIT;
                }
            }
            if exit {
                in_position = false;
            }
        } else if cooldown > 0 {
            cooldown -= 1;
        } else {
            let mut enter = trend_up;
            if level >= 2 {
                enter &= fast / slow - 1.0 > MIN_TREND_SPREAD;
            }
            if level >= 3 {
                enter &= close > fast;
            }
            if level >= 4 {
                enter &= roc(history, ROC_PERIOD).is_some_and(|r| r > 0.0);
            }
            if level >= 6 {
                enter &= close > sma(history, LONG_SMA);
            }
            if level >= 7 {
                enter &= match rolling_vol {
                    Some(v) if vol_count > 0 => {
                        v <= VOL_REGIME_MULTIPLIER * (vol_sum / vol_count as f64)
                    }
                    _ => false,
                };
            }
            if level >= 10 {
                enter &= match (roc(history, 5), roc(history, ROC_PERIOD)) {
                    (Some(short), Some(long)) => short > long / 2.0,
                    _ => false,
                };
            }
            if enter {
                in_position = true;
                entry_price = close;
                peak_since_entry = close;
            }
        }

        held[t] = in_position;
    }

    held
}

fn sma(history: &[f64], period: usize) -> f64 {
    let period = period.min(history.len()).max(1);
    history[history.len() - period..].iter().sum::<f64>() / period as f64
}

fn roc(history: &[f64], period: usize) -> Option<f64> {
    if history.len() <= period {
        return None;
    }
    let past = history[history.len() - 1 - period];
    Some(history[history.len() - 1] / past - 1.0)
}

fn return_std(window: &[f64]) -> f64 {
    let returns: Vec<f64> = window.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    analysis_core::stats::std_dev(&returns)
}

fn zscore(history: &[f64], period: usize) -> Option<f64> {
    if history.len() < period {
        return None;
    }
    let window = &history[history.len() - period..];
    let std = analysis_core::stats::std_dev(window);
    if std > 0.0 {
        Some((history[history.len() - 1] - analysis_core::stats::mean(window)) / std)
    } else {
        None
    }
}
