use async_trait::async_trait;

use crate::{ComplexityError, Constraint, ReturnSeries, Timeframe};

/// Source of return series for a strategy at a given sampling granularity.
///
/// Implementations may fail; the optimizer isolates failures per timeframe.
#[async_trait]
pub trait ReturnsProvider: Send + Sync {
    async fn fetch_returns(
        &self,
        strategy_id: &str,
        timeframe: Timeframe,
        lookback_days: i64,
    ) -> Result<ReturnSeries, ComplexityError>;
}

/// Read-only access to persisted constraint definitions.
#[async_trait]
pub trait ConstraintStore: Send + Sync {
    async fn load_constraints(&self, strategy_id: &str) -> Result<Vec<Constraint>, ComplexityError>;
}
