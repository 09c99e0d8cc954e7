use std::collections::BTreeMap;

use analysis_core::{ComplexityError, ReturnSeries, ReturnsProvider, Timeframe};
use async_trait::async_trait;
use chrono::Duration;

/// Serves fixed, caller-supplied series. The strategy id is ignored and
/// each series is trimmed to the requested lookback window, measured back
/// from its last timestamp.
#[derive(Debug, Clone, Default)]
pub struct StaticReturnsProvider {
    series: BTreeMap<Timeframe, ReturnSeries>,
}

impl StaticReturnsProvider {
    pub fn new(series: BTreeMap<Timeframe, ReturnSeries>) -> Self {
        Self { series }
    }

    pub fn with_series(mut self, timeframe: Timeframe, series: ReturnSeries) -> Self {
        self.series.insert(timeframe, series);
        self
    }

    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.series.keys().copied().collect()
    }
}

#[async_trait]
impl ReturnsProvider for StaticReturnsProvider {
    async fn fetch_returns(
        &self,
        strategy_id: &str,
        timeframe: Timeframe,
        lookback_days: i64,
    ) -> Result<ReturnSeries, ComplexityError> {
        let series = self.series.get(&timeframe).ok_or_else(|| {
            ComplexityError::insufficient(
                timeframe.label(),
                format!("no return series supplied for {strategy_id}"),
            )
        })?;

        let Some(last) = series.last_timestamp() else {
            return Ok(series.clone());
        };
        // a window reaching past the representable range keeps everything
        let Some(cutoff) = Duration::try_days(lookback_days.max(0))
            .and_then(|window| last.checked_sub_signed(window))
        else {
            return Ok(series.clone());
        };
        Ok(ReturnSeries::new(
            series
                .points
                .iter()
                .filter(|p| p.timestamp >= cutoff)
                .copied()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_trims_to_lookback() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let values: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
        let provider = StaticReturnsProvider::default().with_series(
            Timeframe::Day1,
            ReturnSeries::from_values(start, Duration::days(1), &values),
        );

        let trimmed = provider.fetch_returns("s", Timeframe::Day1, 30).await.unwrap();
        assert_eq!(trimmed.len(), 31);
        assert_eq!(trimmed.points.last().unwrap().value, 199.0);
    }

    #[tokio::test]
    async fn test_huge_lookback_keeps_whole_series() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let values: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let provider = StaticReturnsProvider::default().with_series(
            Timeframe::Day1,
            ReturnSeries::from_values(start, Duration::days(1), &values),
        );

        for lookback in [i64::MAX, i64::MAX / 2, 1_000_000_000] {
            let series = provider.fetch_returns("s", Timeframe::Day1, lookback).await.unwrap();
            assert_eq!(series.len(), 50);
        }
    }

    #[tokio::test]
    async fn test_missing_timeframe() {
        let provider = StaticReturnsProvider::default();
        let err = provider.fetch_returns("s", Timeframe::Hour1, 30).await.unwrap_err();
        assert!(matches!(err, ComplexityError::InsufficientData { .. }));
    }
}
